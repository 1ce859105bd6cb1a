//! Clamping of sequence, collection, and slice indices into the valid range
//! of a data shape.
//!
//! Every function here silently clips: out-of-range input is never an
//! error. All of them are idempotent, so [`revalidate`] can run on every
//! shape change without drifting.
//!
//! The slice is a window of `slice_width` planes centred on `slice_center`
//! along the last dimension (the "depth").

use crate::data::DataAndMetadata;

/// The index parameters a display uses to pick what to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceIndices {
    pub sequence_index: usize,
    pub collection_index: [usize; 3],
    pub slice_center: usize,
    pub slice_width: usize,
}

impl Default for SliceIndices {
    fn default() -> Self {
        Self {
            sequence_index: 0,
            collection_index: [0; 3],
            slice_center: 0,
            slice_width: 1,
        }
    }
}

fn clamp_to(value: i64, lo: i64, hi: i64) -> usize {
    value.max(lo).min(hi).max(0) as usize
}

fn depth_of(data: &DataAndMetadata) -> Option<i64> {
    data.dimensional_shape().last().map(|&d| d as i64)
}

/// Sequence index in `[0, max_sequence_index - 1]`, or 0 if not a sequence.
#[must_use]
pub fn validate_sequence_index(data: Option<&DataAndMetadata>, value: i64) -> usize {
    match data {
        Some(data) if data.is_sequence() => {
            clamp_to(value, 0, data.max_sequence_index() as i64 - 1)
        }
        _ => 0,
    }
}

/// Each component clamped to its collection dimension; 0 where that
/// dimension does not exist.
#[must_use]
pub fn validate_collection_index(data: Option<&DataAndMetadata>, value: [i64; 3]) -> [usize; 3] {
    let Some(data) = data else {
        return [0; 3];
    };
    let shape = data.dimensional_shape();
    let base = usize::from(data.is_sequence());
    let count = data.collection_dimension_count();
    let mut out = [0usize; 3];
    for (k, slot) in out.iter_mut().enumerate() {
        if k < count {
            let size = shape.get(base + k).copied().unwrap_or(0) as i64;
            *slot = clamp_to(value[k], 0, size - 1);
        }
    }
    out
}

/// Slice center such that a window of `slice_width` fits inside the depth.
///
/// Lower bound is `floor(width / 2)`, upper bound is
/// `min(depth - ceil(width / 2), depth - 1)`.
#[must_use]
pub fn validate_slice_center(
    data: Option<&DataAndMetadata>,
    value: i64,
    slice_width: usize,
) -> usize {
    let Some(depth) = data.and_then(depth_of) else {
        return 0;
    };
    let width = slice_width as i64;
    let lo = width / 2;
    let hi = (depth - (width + 1) / 2).min(depth - 1);
    value.max(lo).min(hi).max(0) as usize
}

/// Slice width in `[1, max(2 * min(center, depth - center), 1)]`.
#[must_use]
pub fn validate_slice_width(
    data: Option<&DataAndMetadata>,
    value: i64,
    slice_center: usize,
) -> usize {
    let Some(depth) = data.and_then(depth_of) else {
        return 1;
    };
    let center = slice_center as i64;
    let hi = (center.min(depth - center) * 2).max(1);
    value.max(1).min(hi) as usize
}

/// Re-clamp every index after the data shape changed.
///
/// The center is validated as if the width were 1, then the width is fitted
/// around the resulting center.
#[must_use]
pub fn revalidate(data: Option<&DataAndMetadata>, indices: SliceIndices) -> SliceIndices {
    let sequence_index = validate_sequence_index(data, indices.sequence_index as i64);
    let collection_index = validate_collection_index(
        data,
        indices.collection_index.map(|i| i as i64),
    );
    let slice_center = validate_slice_center(data, indices.slice_center as i64, 1);
    let slice_width = validate_slice_width(data, indices.slice_width as i64, slice_center);
    SliceIndices {
        sequence_index,
        collection_index,
        slice_center,
        slice_width,
    }
}

/// Fractional `(start, end)` of the slice window along the depth.
///
/// `None` without data; `(0, 0)` for zero depth.
#[must_use]
pub fn slice_interval(data: Option<&DataAndMetadata>, indices: &SliceIndices) -> Option<(f64, f64)> {
    let depth = data.and_then(depth_of)?;
    if depth <= 0 {
        return Some((0.0, 0.0));
    }
    let start = (indices.slice_center as f64 + 1.0 - indices.slice_width as f64 * 0.5) as i64;
    let end = start + indices.slice_width as i64;
    Some((start as f64 / depth as f64, end as f64 / depth as f64))
}

/// Center and width (unvalidated) for a fractional interval along the depth.
#[must_use]
pub fn slice_for_interval(data: Option<&DataAndMetadata>, interval: (f64, f64)) -> Option<(i64, i64)> {
    let depth = data.and_then(depth_of)?;
    if depth <= 0 {
        return None;
    }
    let center = ((interval.0 + interval.1) * 0.5 * depth as f64) as i64;
    let width = ((interval.1 - interval.0) * depth as f64) as i64;
    Some((center, width))
}
