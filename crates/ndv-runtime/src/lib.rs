#![forbid(unsafe_code)]

//! Runtime: dirty-tracking cache, background compute processors, executors,
//! and reference-counted sharing.
//!
//! # Data flow
//!
//! ```text
//! mark_dirty ──► StaleCache (dirty) ──► recompute_if_necessary
//!                                         │ single-flight, throttled
//!                                         ▼
//!                              Dispatcher::submit(job)
//!                                         │
//!                         Calculator::calculate(data)
//!                                         ▼
//!                    StaleCache::set ──► updated.fire(outcome)
//! ```

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod processor;
pub mod registry;

pub use cache::{MemoryStore, PersistentStore, StaleCache};
pub use config::ProcessorConfig;
pub use dispatch::{Dispatcher, InlineDispatcher, Job, WorkerPool};
pub use error::{ComputeError, Result};
pub use processor::{Calculator, ComputeProcessor, DataSource, RecomputeOutcome};
pub use registry::{SharedHandle, SharedRegistry, SharedResource};
