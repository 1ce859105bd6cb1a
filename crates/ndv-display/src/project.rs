//! Projection of N-dimensional data down to what a display shows.
//!
//! # Rules
//!
//! Dimensions are consumed front to back:
//!
//! 1. A sequence axis is replaced by the frame at `sequence_index`.
//! 2. Collections:
//!    - 2 collection dims over 1 datum dim (a spectrum image): the datum
//!      axis is summed over the slice window, giving a 2-D image. Color data
//!      takes the plane at the slice center instead of summing.
//!    - 1 collection dim over 1 datum dim: shown whole, as a 2-D image.
//!    - anything else: each collection axis is replaced by the element at
//!      its `collection_index`, leaving the datum.
//! 3. Complex values become real through a [`ComplexDisplayType`].
//!
//! Indices are clipped into range here as well; projection never fails on
//! an out-of-range index.

use std::fmt;

use ndarray::{ArrayD, ArrayViewD, Axis, LinalgScalar, Slice};
use ndv_core::data::{ArrayValues, DataAndMetadata, DataDescriptor};
use ndv_core::index::SliceIndices;
use num_complex::Complex64;

/// How complex values are reduced to a real scalar for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComplexDisplayType {
    /// `ln(|z| + 1)`.
    #[default]
    LogAbsolute,
    Absolute,
    Phase,
    Real,
    Imaginary,
}

impl ComplexDisplayType {
    pub const ALL: [Self; 5] = [
        Self::LogAbsolute,
        Self::Absolute,
        Self::Phase,
        Self::Real,
        Self::Imaginary,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LogAbsolute => "log-absolute",
            Self::Absolute => "absolute",
            Self::Phase => "phase",
            Self::Real => "real",
            Self::Imaginary => "imaginary",
        }
    }

    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == id)
    }

    #[inline]
    #[must_use]
    pub fn apply(self, z: Complex64) -> f64 {
        match self {
            Self::LogAbsolute => (z.norm() + 1.0).ln(),
            Self::Absolute => z.norm(),
            Self::Phase => z.arg(),
            Self::Real => z.re,
            Self::Imaginary => z.im,
        }
    }
}

impl fmt::Display for ComplexDisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projected data, ready for range finding and color mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayData {
    Scalar(ArrayD<f64>),
    /// Channels (3 or 4) on the last axis.
    Color(ArrayD<u8>),
}

impl DisplayData {
    /// Dimensional shape, without any color channel axis.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Scalar(a) => a.shape(),
            Self::Color(a) => {
                let s = a.shape();
                &s[..s.len().saturating_sub(1)]
            }
        }
    }

    /// Number of displayed elements (pixels, for a 2-D image).
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_color(&self) -> bool {
        matches!(self, Self::Color(_))
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&ArrayD<f64>> {
        match self {
            Self::Scalar(a) => Some(a),
            Self::Color(_) => None,
        }
    }
}

/// Project `data` through `indices`. `None` when there is nothing to show.
#[must_use]
pub fn project(
    data: &DataAndMetadata,
    indices: &SliceIndices,
    complex_display_type: Option<ComplexDisplayType>,
) -> Option<DisplayData> {
    if data.is_empty() {
        return None;
    }
    let descriptor = data.descriptor();
    let projected = match data.values() {
        ArrayValues::Real(a) => DisplayData::Scalar(reduce(a.view(), descriptor, indices, false)),
        ArrayValues::Complex(a) => {
            let display_type = complex_display_type.unwrap_or_default();
            let reduced = reduce(a.view(), descriptor, indices, false);
            DisplayData::Scalar(reduced.mapv(|z| display_type.apply(z)))
        }
        ArrayValues::Rgb(a) | ArrayValues::Rgba(a) => {
            DisplayData::Color(reduce(a.view(), descriptor, indices, true))
        }
    };
    Some(projected)
}

fn reduce<T: LinalgScalar>(
    view: ArrayViewD<'_, T>,
    descriptor: DataDescriptor,
    indices: &SliceIndices,
    color: bool,
) -> ArrayD<T> {
    let mut view = view;
    if descriptor.is_sequence {
        view = pick(view, indices.sequence_index);
    }
    match (
        descriptor.collection_dimension_count,
        descriptor.datum_dimension_count,
    ) {
        (0, _) | (1, 1) => view.to_owned(),
        (2, 1) => {
            let depth = view.len_of(Axis(2));
            if color {
                return pick_axis(view, 2, indices.slice_center).to_owned();
            }
            let width = indices.slice_width.max(1);
            let start = indices
                .slice_center
                .saturating_sub(width / 2)
                .min(depth.saturating_sub(1));
            let end = (start + width).min(depth);
            view.slice_axis(Axis(2), Slice::from(start..end))
                .sum_axis(Axis(2))
        }
        (count, _) => {
            for k in 0..count {
                let index = indices.collection_index.get(k).copied().unwrap_or(0);
                view = pick(view, index);
            }
            view.to_owned()
        }
    }
}

/// Replace the leading axis by the element at `index`, clipped.
fn pick<T>(view: ArrayViewD<'_, T>, index: usize) -> ArrayViewD<'_, T> {
    pick_axis(view, 0, index)
}

fn pick_axis<T>(view: ArrayViewD<'_, T>, axis: usize, index: usize) -> ArrayViewD<'_, T> {
    let len = view.len_of(Axis(axis));
    view.index_axis_move(Axis(axis), index.min(len.saturating_sub(1)))
}
