#![forbid(unsafe_code)]

//! Core: array model, index validation, change events, clocks, and logging.

pub mod clock;
pub mod data;
pub mod error;
pub mod event;
pub mod id;
pub mod index;
pub mod logging;

pub use error::{DataError, Result};
pub use id::SourceId;
