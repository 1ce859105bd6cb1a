//! N-dimensional array data with a dimensional descriptor.
//!
//! # Layout
//!
//! Dimensions are ordered `[sequence?] [collection..] [datum..]`. The
//! [`DataDescriptor`] says how many of each there are. Color data (`Rgb`,
//! `Rgba`) carries one extra trailing channel axis that is part of the
//! *data shape* but not of the *dimensional shape*.
//!
//! # Invariants
//!
//! 1. `descriptor.rank() == dimensional_shape().len()` for every constructed
//!    value (checked at construction).
//! 2. Color data always has a trailing channel axis of 3 (`Rgb`) or 4 (`Rgba`).

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use web_time::SystemTime;

use crate::error::{DataError, Result};

/// Element type of the raw data, as far as display is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Real,
    Complex,
    Rgb,
    Rgba,
}

impl ElementKind {
    /// Number of trailing channel values per element (0 for scalar kinds).
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            Self::Real | Self::Complex => 0,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    #[must_use]
    pub const fn is_color(self) -> bool {
        matches!(self, Self::Rgb | Self::Rgba)
    }
}

/// Raw element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValues {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
    /// Channels on the last axis (length 3).
    Rgb(ArrayD<u8>),
    /// Channels on the last axis (length 4).
    Rgba(ArrayD<u8>),
}

impl ArrayValues {
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Real(_) => ElementKind::Real,
            Self::Complex(_) => ElementKind::Complex,
            Self::Rgb(_) => ElementKind::Rgb,
            Self::Rgba(_) => ElementKind::Rgba,
        }
    }

    /// Full shape including any channel axis.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Real(a) => a.shape(),
            Self::Complex(a) => a.shape(),
            Self::Rgb(a) | Self::Rgba(a) => a.shape(),
        }
    }

    /// Total number of stored scalars.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Real(a) => a.len(),
            Self::Complex(a) => a.len(),
            Self::Rgb(a) | Self::Rgba(a) => a.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the dimensions of a data array are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataDescriptor {
    pub is_sequence: bool,
    pub collection_dimension_count: usize,
    pub datum_dimension_count: usize,
}

impl DataDescriptor {
    #[must_use]
    pub const fn new(
        is_sequence: bool,
        collection_dimension_count: usize,
        datum_dimension_count: usize,
    ) -> Self {
        Self {
            is_sequence,
            collection_dimension_count,
            datum_dimension_count,
        }
    }

    /// Descriptor assumed for data created without one.
    ///
    /// Three dimensions are read as a 2-D collection of 1-D spectra; anything
    /// else is a single datum.
    #[must_use]
    pub const fn infer(rank: usize) -> Self {
        if rank == 3 {
            Self::new(false, 2, 1)
        } else {
            Self::new(false, 0, rank)
        }
    }

    /// Number of dimensions this descriptor accounts for.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.is_sequence as usize + self.collection_dimension_count + self.datum_dimension_count
    }

    #[must_use]
    pub const fn is_collection(&self) -> bool {
        self.collection_dimension_count > 0
    }
}

/// Raw data plus the metadata the display pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DataAndMetadata {
    values: ArrayValues,
    descriptor: DataDescriptor,
    timestamp: SystemTime,
}

impl DataAndMetadata {
    /// Wrap `values`, checking them against `descriptor`.
    pub fn new(values: ArrayValues, descriptor: DataDescriptor) -> Result<Self> {
        let kind = values.kind();
        let shape = values.shape();
        let channels = kind.channels();
        if kind.is_color() && shape.last().copied() != Some(channels) {
            return Err(DataError::ChannelAxis {
                kind,
                channels,
                shape: shape.to_vec(),
            });
        }
        let actual = shape.len() - usize::from(kind.is_color());
        if descriptor.rank() != actual {
            return Err(DataError::DescriptorMismatch {
                expected: descriptor.rank(),
                actual,
            });
        }
        Ok(Self {
            values,
            descriptor,
            timestamp: SystemTime::now(),
        })
    }

    /// Wrap `values` with an inferred descriptor.
    pub fn from_values(values: ArrayValues) -> Result<Self> {
        let rank = values
            .shape()
            .len()
            .saturating_sub(usize::from(values.kind().is_color()));
        Self::new(values, DataDescriptor::infer(rank))
    }

    /// Real data from a flat row-major buffer.
    pub fn real(shape: &[usize], values: Vec<f64>) -> Result<Self> {
        let len = values.len();
        let array = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| DataError::shape_mismatch(shape, len))?;
        Self::from_values(ArrayValues::Real(array))
    }

    /// Complex data from a flat row-major buffer.
    pub fn complex(shape: &[usize], values: Vec<Complex64>) -> Result<Self> {
        let len = values.len();
        let array = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| DataError::shape_mismatch(shape, len))?;
        Self::from_values(ArrayValues::Complex(array))
    }

    /// RGB data; `shape` excludes the channel axis.
    pub fn rgb(shape: &[usize], values: Vec<[u8; 3]>) -> Result<Self> {
        let len = values.len();
        let mut full = shape.to_vec();
        full.push(3);
        let flat: Vec<u8> = values.into_iter().flatten().collect();
        let array = ArrayD::from_shape_vec(IxDyn(&full), flat)
            .map_err(|_| DataError::shape_mismatch(shape, len))?;
        Self::from_values(ArrayValues::Rgb(array))
    }

    pub fn with_descriptor(self, descriptor: DataDescriptor) -> Result<Self> {
        let timestamp = self.timestamp;
        Self::new(self.values, descriptor).map(|d| d.with_timestamp(timestamp))
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn values(&self) -> &ArrayValues {
        &self.values
    }

    #[must_use]
    pub fn descriptor(&self) -> DataDescriptor {
        self.descriptor
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.values.kind()
    }

    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Shape including any color channel axis.
    #[must_use]
    pub fn data_shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Shape without the color channel axis.
    #[must_use]
    pub fn dimensional_shape(&self) -> &[usize] {
        let shape = self.values.shape();
        if self.kind().is_color() {
            &shape[..shape.len() - 1]
        } else {
            shape
        }
    }

    #[must_use]
    pub fn is_sequence(&self) -> bool {
        self.descriptor.is_sequence
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.descriptor.is_collection()
    }

    #[must_use]
    pub fn collection_dimension_count(&self) -> usize {
        self.descriptor.collection_dimension_count
    }

    #[must_use]
    pub fn datum_dimension_count(&self) -> usize {
        self.descriptor.datum_dimension_count
    }

    /// Length of the sequence axis, or 0 if this is not a sequence.
    #[must_use]
    pub fn max_sequence_index(&self) -> usize {
        if self.is_sequence() {
            self.dimensional_shape().first().copied().unwrap_or(0)
        } else {
            0
        }
    }

    /// No elements at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Shape of what an image/line-plot view of this data would show.
    #[must_use]
    pub fn preview_2d_shape(&self) -> Vec<usize> {
        let shape = self.dimensional_shape();
        let start = usize::from(self.is_sequence());
        let collection = self.collection_dimension_count();
        let datum = self.datum_dimension_count();
        if !self.is_collection() {
            return shape[start..].to_vec();
        }
        match (collection, datum) {
            (1, 1) => shape[start..start + collection + datum].to_vec(),
            (2, 1) => shape[start..start + collection].to_vec(),
            _ => shape[start + collection..start + collection + datum].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_2d_infers_single_datum() {
        let d = DataAndMetadata::real(&[4, 5], vec![0.0; 20]).unwrap();
        assert_eq!(d.kind(), ElementKind::Real);
        assert_eq!(d.descriptor(), DataDescriptor::new(false, 0, 2));
        assert_eq!(d.dimensional_shape(), &[4, 5]);
        assert_eq!(d.preview_2d_shape(), vec![4, 5]);
    }

    #[test]
    fn real_3d_infers_spectrum_image() {
        let d = DataAndMetadata::real(&[2, 3, 10], vec![0.0; 60]).unwrap();
        assert_eq!(d.descriptor(), DataDescriptor::new(false, 2, 1));
        assert_eq!(d.preview_2d_shape(), vec![2, 3]);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let err = DataAndMetadata::real(&[4, 5], vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch { len: 3, .. }));
    }

    #[test]
    fn descriptor_mismatch_is_reported() {
        let d = DataAndMetadata::real(&[4, 5], vec![0.0; 20]).unwrap();
        let err = d
            .with_descriptor(DataDescriptor::new(true, 1, 1))
            .unwrap_err();
        assert_eq!(
            err,
            DataError::DescriptorMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn rgb_excludes_channel_axis_from_dimensions() {
        let d = DataAndMetadata::rgb(&[2, 2], vec![[1, 2, 3]; 4]).unwrap();
        assert_eq!(d.data_shape(), &[2, 2, 3]);
        assert_eq!(d.dimensional_shape(), &[2, 2]);
        assert_eq!(d.descriptor().rank(), 2);
    }

    #[test]
    fn rgba_needs_four_channels() {
        let array = ArrayD::<u8>::zeros(IxDyn(&[2, 2, 3]));
        let err = DataAndMetadata::from_values(ArrayValues::Rgba(array)).unwrap_err();
        assert!(matches!(err, DataError::ChannelAxis { channels: 4, .. }));
    }

    #[test]
    fn sequence_reports_max_index() {
        let d = DataAndMetadata::real(&[7, 4, 4], vec![0.0; 112])
            .unwrap()
            .with_descriptor(DataDescriptor::new(true, 0, 2))
            .unwrap();
        assert_eq!(d.max_sequence_index(), 7);
        assert_eq!(d.preview_2d_shape(), vec![4, 4]);
    }

    #[test]
    fn pick_collection_previews_datum() {
        let d = DataAndMetadata::real(&[3, 4, 5, 6], vec![0.0; 360])
            .unwrap()
            .with_descriptor(DataDescriptor::new(false, 2, 2))
            .unwrap();
        assert_eq!(d.preview_2d_shape(), vec![5, 6]);
    }

    #[test]
    fn timestamp_survives_descriptor_change() {
        let stamp = SystemTime::UNIX_EPOCH;
        let d = DataAndMetadata::real(&[2, 3, 4], vec![0.0; 24])
            .unwrap()
            .with_timestamp(stamp)
            .with_descriptor(DataDescriptor::new(true, 0, 2))
            .unwrap();
        assert_eq!(d.timestamp(), stamp);
    }
}
