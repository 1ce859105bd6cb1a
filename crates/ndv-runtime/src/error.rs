use ndv_core::DataError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComputeError>;

/// Why a calculation produced nothing usable.
///
/// These never reach the caller of `recompute_if_necessary`; the processor
/// logs them and leaves the entry dirty.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("calculation failed: {message}")]
    Failed { message: String },

    #[error("invalid data: {0}")]
    Data(#[from] DataError),

    #[error("calculation panicked: {message}")]
    Panicked { message: String },
}

impl ComputeError {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Build from a payload caught by `catch_unwind`.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let caught = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        let err = ComputeError::from_panic(caught.as_ref());
        assert_eq!(err.to_string(), "calculation panicked: boom 7");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert!(matches!(
            ComputeError::from_panic(caught.as_ref()),
            ComputeError::Panicked { .. }
        ));
    }

    #[test]
    fn data_errors_convert() {
        let err: ComputeError = DataError::shape_mismatch(&[2, 2], 3).into();
        assert!(err.to_string().starts_with("invalid data:"));
    }
}
