#![forbid(unsafe_code)]

//! NdView display engine facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.
//!
//! ```
//! use std::sync::Arc;
//! use ndv::prelude::*;
//!
//! let controller = SourceController::new(SnapshotConfig::default());
//! controller.update_data(Some(DataAndMetadata::real(&[2, 2], vec![0.0, 1.0, 2.0, 3.0])?));
//! assert_eq!(controller.get_snapshot(false).data_range(), Some((0.0, 3.0)));
//!
//! let thumbnails = ThumbnailManager::thumbnails(&DisplayConfig::default());
//! let dispatcher: Arc<dyn Dispatcher> = Arc::new(InlineDispatcher);
//! let thumbnail = thumbnails.source_for(&controller, &dispatcher);
//! assert!(thumbnail.cached().is_some());
//! # Ok::<(), ndv::prelude::core::DataError>(())
//! ```

pub mod prelude {
    pub use ndv_core as core;
    #[cfg(feature = "display")]
    pub use ndv_display as display;
    pub use ndv_runtime as runtime;

    pub use ndv_core::SourceId;
    pub use ndv_core::data::{DataAndMetadata, DataDescriptor};
    pub use ndv_runtime::{Dispatcher, InlineDispatcher, StaleCache, WorkerPool};

    #[cfg(feature = "display")]
    pub use ndv_display::{
        ColorMapId, DisplayConfig, SnapshotConfig, SourceController, StagedSnapshot,
        ThumbnailManager,
    };
}
