use thiserror::Error;

use crate::data::ElementKind;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("shape {shape:?} does not hold {len} elements")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    #[error("descriptor expects {expected} dimensions but data has {actual}")]
    DescriptorMismatch { expected: usize, actual: usize },

    #[error("{kind:?} data needs a trailing channel axis of {channels}, got shape {shape:?}")]
    ChannelAxis {
        kind: ElementKind,
        channels: usize,
        shape: Vec<usize>,
    },
}

impl DataError {
    #[must_use]
    pub fn shape_mismatch(shape: &[usize], len: usize) -> Self {
        Self::ShapeMismatch {
            shape: shape.to_vec(),
            len,
        }
    }
}
