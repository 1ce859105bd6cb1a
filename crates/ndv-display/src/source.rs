//! A controller-driven compute processor for one artifact.

use std::fmt;
use std::sync::{Arc, Weak};

use ndv_core::SourceId;
use ndv_core::event::{Event, Listener};
use ndv_runtime::{
    ComputeProcessor, DataSource, Dispatcher, RecomputeOutcome, SharedResource, StaleCache,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::controller::SourceController;
use crate::snapshot::StagedSnapshot;

/// Processor input: the controller's immediate snapshot.
pub type SnapshotProcessor<V> = ComputeProcessor<Arc<StagedSnapshot>, V>;

/// Keeps one artifact of one controller up to date.
///
/// Every `display_changed` from the controller marks the artifact dirty and
/// schedules a recompute on the source's dispatcher. Results are announced
/// through [`updated`](Self::updated).
pub struct ArtifactSource<V> {
    id: SourceId,
    controller: Weak<SourceController>,
    cache: Arc<StaleCache<V>>,
    processor: Arc<SnapshotProcessor<V>>,
    dispatcher: Arc<dyn Dispatcher>,
    updated: Arc<Event<RecomputeOutcome>>,
    listeners: Mutex<Vec<Listener>>,
}

impl<V: Clone + Send + Sync + 'static> ArtifactSource<V> {
    /// Wire `processor` to `controller`. The processor must read from
    /// `controller` and store into `cache`.
    pub fn new(
        controller: &Arc<SourceController>,
        cache: Arc<StaleCache<V>>,
        processor: SnapshotProcessor<V>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let processor = Arc::new(processor);
        let updated = Arc::new(Event::new());

        let on_display_changed = {
            let processor = Arc::downgrade(&processor);
            let dispatcher = Arc::clone(&dispatcher);
            controller.display_changed().listen(move |_| {
                if let Some(processor) = processor.upgrade() {
                    processor.mark_dirty();
                    processor.recompute_if_necessary(Some(dispatcher.as_ref()));
                }
            })
        };
        let relay = {
            let updated = Arc::downgrade(&updated);
            processor.updated().listen(move |outcome| {
                if let Some(updated) = updated.upgrade() {
                    updated.fire(outcome);
                }
            })
        };

        Self {
            id: controller.id(),
            controller: Arc::downgrade(controller),
            cache,
            processor,
            dispatcher,
            updated,
            listeners: Mutex::new(vec![on_display_changed, relay]),
        }
    }

    #[must_use]
    pub fn id(&self) -> SourceId {
        self.id
    }

    #[must_use]
    pub fn controller(&self) -> Option<Arc<SourceController>> {
        self.controller.upgrade()
    }

    #[must_use]
    pub fn processor(&self) -> &Arc<SnapshotProcessor<V>> {
        &self.processor
    }

    /// Fires whenever a recompute published a new value.
    #[must_use]
    pub fn updated(&self) -> &Event<RecomputeOutcome> {
        &self.updated
    }

    /// Last published value, or the default. Never computes.
    #[must_use]
    pub fn cached(&self) -> Option<V> {
        self.processor.get_cached()
    }

    /// Schedule a recompute on this source's dispatcher if dirty.
    pub fn recompute_if_necessary(&self) -> bool {
        self.processor
            .recompute_if_necessary(Some(self.dispatcher.as_ref()))
    }

    /// Compute synchronously if dirty.
    pub fn recompute_data(&self) -> RecomputeOutcome {
        self.processor.recompute_data()
    }

    pub fn mark_dirty(&self) {
        self.processor.mark_dirty();
    }
}

impl<V: Clone + Send + Sync + 'static> SharedResource for ArtifactSource<V> {
    fn teardown(&self) {
        debug!(source = %self.id, key = self.processor.key(), "artifact source closed");
        self.listeners.lock().clear();
        self.cache.evict_owner(self.id);
    }
}

impl<V> fmt::Debug for ArtifactSource<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSource")
            .field("id", &self.id)
            .field("listeners", &self.listeners.lock().len())
            .finish_non_exhaustive()
    }
}

/// The controller as a processor input.
#[must_use]
pub fn snapshot_source(
    controller: &Arc<SourceController>,
) -> Weak<dyn DataSource<Arc<StagedSnapshot>>> {
    let weak: Weak<SourceController> = Arc::downgrade(controller);
    weak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{STATISTICS_KEY, Statistics, StatisticsCalculator};
    use crate::config::SnapshotConfig;
    use ndv_core::data::DataAndMetadata;
    use ndv_runtime::{InlineDispatcher, ProcessorConfig};
    use std::time::Duration;

    fn source_for(controller: &Arc<SourceController>) -> ArtifactSource<Statistics> {
        let cache = Arc::new(StaleCache::in_memory());
        let processor = ComputeProcessor::new(
            controller.id(),
            STATISTICS_KEY,
            Arc::clone(&cache),
            snapshot_source(controller),
            StatisticsCalculator,
        )
        .with_config(ProcessorConfig::default().with_min_interval(Duration::ZERO));
        ArtifactSource::new(controller, cache, processor, Arc::new(InlineDispatcher))
    }

    #[test]
    fn display_change_recomputes() {
        let controller = SourceController::new(SnapshotConfig::default());
        let source = source_for(&controller);
        assert_eq!(source.cached(), None);
        controller.update_data(Some(DataAndMetadata::real(&[1, 2], vec![2.0, 4.0]).unwrap()));
        assert_eq!(source.cached().map(|s| s.mean), Some(3.0));
        controller.update_data(Some(DataAndMetadata::real(&[1, 2], vec![6.0, 8.0]).unwrap()));
        assert_eq!(source.cached().map(|s| s.mean), Some(7.0));
    }

    #[test]
    fn updates_are_relayed() {
        let controller = SourceController::new(SnapshotConfig::default());
        let source = source_for(&controller);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _l = {
            let seen = Arc::clone(&seen);
            source.updated().listen(move |o| seen.lock().push(*o))
        };
        controller.update_data(Some(DataAndMetadata::real(&[1, 1], vec![1.0]).unwrap()));
        assert_eq!(*seen.lock(), vec![RecomputeOutcome::Computed]);
    }

    #[test]
    fn teardown_detaches_from_controller() {
        let controller = SourceController::new(SnapshotConfig::default());
        let source = source_for(&controller);
        assert_eq!(controller.display_changed().listener_count(), 1);
        source.teardown();
        assert_eq!(controller.display_changed().listener_count(), 0);
        controller.update_data(Some(DataAndMetadata::real(&[1, 1], vec![1.0]).unwrap()));
        assert_eq!(source.processor().computation_count(), 0);
    }

    #[test]
    fn snapshot_source_follows_the_controller() {
        let controller = SourceController::new(SnapshotConfig::default());
        let weak = snapshot_source(&controller);
        let input = weak.upgrade().unwrap();
        assert!(input.current_data().is_none());
        controller.update_data(Some(DataAndMetadata::real(&[1, 2], vec![1.0, 5.0]).unwrap()));
        let snapshot = input.current_data().unwrap();
        assert_eq!(snapshot.data_range(), Some((1.0, 5.0)));
        drop(input);
        drop(controller);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn dropped_controller_is_source_gone() {
        let controller = SourceController::new(SnapshotConfig::default());
        let source = source_for(&controller);
        drop(controller);
        assert!(source.controller().is_none());
        assert_eq!(source.recompute_data(), RecomputeOutcome::SourceGone);
    }
}
