//! Shared artifact sources, one per controller.
//!
//! An [`ArtifactManager`] hands out reference-counted [`ArtifactSource`]s
//! so every consumer of the same controller (thumbnail strip, inspector,
//! export) drives one computation.

use std::fmt;
use std::sync::Arc;

use ndv_core::SourceId;
use ndv_core::clock::Clock;
use ndv_runtime::{
    Calculator, ComputeProcessor, Dispatcher, ProcessorConfig, SharedHandle, SharedRegistry,
    StaleCache,
};

use crate::artifact::{
    HISTOGRAM_KEY, Histogram, HistogramCalculator, STATISTICS_KEY, Statistics,
    StatisticsCalculator, THUMBNAIL_KEY, ThumbnailCalculator,
};
use crate::config::DisplayConfig;
use crate::controller::SourceController;
use crate::image::RgbaImage;
use crate::snapshot::StagedSnapshot;
use crate::source::{ArtifactSource, snapshot_source};

/// Hands out one shared [`ArtifactSource`] per controller.
pub struct ArtifactManager<V, C> {
    registry: Arc<SharedRegistry<ArtifactSource<V>>>,
    cache: Arc<StaleCache<V>>,
    key: String,
    calculator: C,
    processor_config: ProcessorConfig,
    clock: Clock,
}

impl<V, C> ArtifactManager<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Calculator<Arc<StagedSnapshot>, V> + Clone + 'static,
{
    pub fn new(key: impl Into<String>, calculator: C, cache: Arc<StaleCache<V>>) -> Self {
        Self {
            registry: SharedRegistry::new(),
            cache,
            key: key.into(),
            calculator,
            processor_config: ProcessorConfig::default(),
            clock: Clock::Real,
        }
    }

    #[must_use]
    pub fn with_processor_config(mut self, config: ProcessorConfig) -> Self {
        self.processor_config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<StaleCache<V>> {
        &self.cache
    }

    /// Acquire the shared source for `controller`, creating it on first use.
    /// A fresh source schedules its first computation right away.
    ///
    /// # Panics
    ///
    /// If the live source for this controller was created with a different
    /// dispatcher.
    pub fn source_for(
        &self,
        controller: &Arc<SourceController>,
        dispatcher: &Arc<dyn Dispatcher>,
    ) -> SharedHandle<ArtifactSource<V>> {
        let handle = self.registry.acquire(controller.id(), dispatcher, || {
            let processor = ComputeProcessor::new(
                controller.id(),
                self.key.clone(),
                Arc::clone(&self.cache),
                snapshot_source(controller),
                self.calculator.clone(),
            )
            .with_config(self.processor_config.clone())
            .with_clock(self.clock.clone());
            ArtifactSource::new(
                controller,
                Arc::clone(&self.cache),
                processor,
                Arc::clone(dispatcher),
            )
        });
        handle.recompute_if_necessary();
        handle
    }

    /// The cached value for `id` without acquiring its source.
    #[must_use]
    pub fn cached_for(&self, id: SourceId) -> Option<V> {
        match self.registry.get(id) {
            Some(source) => source.cached(),
            None => self
                .cache
                .get(id, &self.key)
                .or_else(|| self.calculator.default_value()),
        }
    }

    /// Number of live consumers of `id`.
    #[must_use]
    pub fn ref_count(&self, id: SourceId) -> usize {
        self.registry.ref_count(id)
    }

    /// Number of live shared sources.
    #[must_use]
    pub fn live_sources(&self) -> usize {
        self.registry.len()
    }
}

impl<V, C> fmt::Debug for ArtifactManager<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactManager")
            .field("key", &self.key)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

pub type ThumbnailManager = ArtifactManager<Arc<RgbaImage>, ThumbnailCalculator>;
pub type HistogramManager = ArtifactManager<Arc<Histogram>, HistogramCalculator>;
pub type StatisticsManager = ArtifactManager<Statistics, StatisticsCalculator>;

impl ThumbnailManager {
    #[must_use]
    pub fn thumbnails(config: &DisplayConfig) -> Self {
        let (w, h) = config.thumbnail_size;
        Self::new(
            THUMBNAIL_KEY,
            ThumbnailCalculator::new(w, h),
            Arc::new(StaleCache::in_memory()),
        )
        .with_processor_config(config.processor.clone())
    }
}

impl HistogramManager {
    #[must_use]
    pub fn histograms(config: &DisplayConfig) -> Self {
        Self::new(
            HISTOGRAM_KEY,
            HistogramCalculator::new(config.histogram_bins),
            Arc::new(StaleCache::in_memory()),
        )
        .with_processor_config(config.processor.clone())
    }
}

impl StatisticsManager {
    #[must_use]
    pub fn statistics(config: &DisplayConfig) -> Self {
        Self::new(
            STATISTICS_KEY,
            StatisticsCalculator,
            Arc::new(StaleCache::in_memory()),
        )
        .with_processor_config(config.processor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotConfig;
    use crate::image::Rgba;
    use ndv_core::data::DataAndMetadata;
    use ndv_runtime::InlineDispatcher;
    use std::time::Duration;

    fn config() -> DisplayConfig {
        DisplayConfig::default()
            .with_thumbnail_size(4, 4)
            .with_processor(ProcessorConfig::default().with_min_interval(Duration::ZERO))
    }

    fn inline() -> Arc<dyn Dispatcher> {
        Arc::new(InlineDispatcher)
    }

    #[test]
    fn first_acquire_computes_thumbnail() {
        let manager = ThumbnailManager::thumbnails(&config());
        let controller = SourceController::new(SnapshotConfig::default());
        controller.update_data(Some(DataAndMetadata::real(&[2, 2], vec![0.0, 1.0, 2.0, 3.0]).unwrap()));
        let handle = manager.source_for(&controller, &inline());
        let thumb = handle.cached().unwrap();
        assert_eq!((thumb.width(), thumb.height()), (4, 4));
        assert_eq!(thumb.get(3, 3), Some(Rgba::rgb(255, 255, 255)));
    }

    #[test]
    fn no_data_thumbnail_is_blank_not_missing() {
        let manager = ThumbnailManager::thumbnails(&config());
        let controller = SourceController::new(SnapshotConfig::default());
        let handle = manager.source_for(&controller, &inline());
        let thumb = handle.cached().unwrap();
        assert!(thumb.pixels().iter().all(|p| *p == Rgba::TRANSPARENT));
        assert!(!handle.processor().is_dirty());
    }

    #[test]
    fn consumers_share_one_source() {
        let manager = StatisticsManager::statistics(&config());
        let controller = SourceController::new(SnapshotConfig::default());
        controller.update_data(Some(DataAndMetadata::real(&[1, 2], vec![1.0, 3.0]).unwrap()));
        let d = inline();
        let a = manager.source_for(&controller, &d);
        let b = manager.source_for(&controller, &d);
        assert!(Arc::ptr_eq(a.resource(), b.resource()));
        assert_eq!(manager.ref_count(controller.id()), 2);
        assert_eq!(a.processor().computation_count(), 1);

        drop(a);
        assert_eq!(manager.live_sources(), 1);
        drop(b);
        assert_eq!(manager.live_sources(), 0);
        assert_eq!(controller.display_changed().listener_count(), 0);
    }

    #[test]
    fn cached_for_reads_without_acquiring() {
        let manager = StatisticsManager::statistics(&config());
        let controller = SourceController::new(SnapshotConfig::default());
        controller.update_data(Some(DataAndMetadata::real(&[1, 2], vec![1.0, 3.0]).unwrap()));
        assert_eq!(manager.cached_for(controller.id()), None);
        let handle = manager.source_for(&controller, &inline());
        assert_eq!(manager.cached_for(controller.id()).map(|s| s.mean), Some(2.0));
        assert_eq!(manager.ref_count(controller.id()), 1);
        handle.release();
        // The store still holds the last value after the source is gone.
        assert_eq!(manager.cached_for(controller.id()).map(|s| s.mean), Some(2.0));
    }

    #[test]
    fn histogram_follows_display_changes() {
        let manager = HistogramManager::histograms(&config().with_histogram_bins(4));
        let controller = SourceController::new(SnapshotConfig::default());
        let _handle = manager.source_for(&controller, &inline());
        assert_eq!(manager.cached_for(controller.id()), None);
        controller.update_data(Some(DataAndMetadata::real(&[1, 4], vec![0.0, 1.0, 2.0, 3.0]).unwrap()));
        let h = manager.cached_for(controller.id()).unwrap();
        assert_eq!(h.bins, vec![1.0; 4]);
        controller.set_display_limits(&[Some(0.0), Some(1.0)]);
        let h = manager.cached_for(controller.id()).unwrap();
        assert_eq!(h.range, (0.0, 1.0));
    }

    #[test]
    #[should_panic(expected = "different dispatcher")]
    fn mixing_dispatchers_is_a_programming_error() {
        let manager = StatisticsManager::statistics(&config());
        let controller = SourceController::new(SnapshotConfig::default());
        let _a = manager.source_for(&controller, &inline());
        let _b = manager.source_for(&controller, &inline());
    }
}
