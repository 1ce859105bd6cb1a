#![forbid(unsafe_code)]

//! Display pipeline: staged snapshots, source controllers, and shared
//! artifact processors.
//!
//! # Role
//! `ndv-display` turns raw N-dimensional data into what a viewer shows. A
//! [`SourceController`] owns the data and the display parameters; reading it
//! yields a [`StagedSnapshot`] whose stages (projection, ranges, sample,
//! bitmap) are computed once, on first use. Thumbnails, histograms and
//! statistics are derived off-thread by [`ArtifactSource`]s shared through
//! an [`ArtifactManager`].
//!
//! # How it fits
//! - `ndv-core` supplies the array model, index clamping, and events.
//! - `ndv-runtime` supplies the cache, processors, executors, and registry.
//! - `ndv` re-exports everything behind a prelude.

pub mod artifact;
pub mod color_map;
pub mod config;
pub mod controller;
pub mod image;
pub mod manager;
pub mod project;
pub mod snapshot;
pub mod source;

pub use artifact::{
    Histogram, HistogramCalculator, Statistics, StatisticsCalculator, ThumbnailCalculator,
};
pub use color_map::{ColorMapId, ColorTable};
pub use config::{DisplayConfig, SnapshotConfig};
pub use controller::{Calibration, CalibrationStyle, PropertyName, SourceController};
pub use image::{Rgba, RgbaImage};
pub use manager::{ArtifactManager, HistogramManager, StatisticsManager, ThumbnailManager};
pub use project::{ComplexDisplayType, DisplayData};
pub use snapshot::{
    DisplayLimits, SnapshotParams, Stage, StagedSnapshot, validate_display_limits,
};
pub use source::ArtifactSource;
