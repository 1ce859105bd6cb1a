//! Per-source display state and snapshot slots.
//!
//! A [`SourceController`] holds the authoritative data for one source, the
//! display parameters applied to it, and two snapshot slots:
//!
//! - `current`: built on demand from the present parameters, dropped as soon
//!   as any of them changes.
//! - `last_good`: the newest snapshot that has been finalized. Swapped
//!   atomically; readers see either the old or the new one.
//!
//! # Notification order
//!
//! When a parameter that affects the snapshot changes, `current` is dropped
//! first, then `property_changed`, `display_changed`,
//! `display_data_will_change` and `snapshot_available` fire, in that order.
//! A listener reading the snapshot from any of these callbacks therefore
//! gets one built from the new parameters. No lock is held while firing.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use ndv_core::SourceId;
use ndv_core::data::DataAndMetadata;
use ndv_core::event::Event;
use ndv_core::index::{self, SliceIndices};
use ndv_runtime::DataSource;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::color_map::{ColorMapId, ColorTable};
use crate::config::{DisplayConfig, SnapshotConfig};
use crate::project::{ComplexDisplayType, DisplayData};
use crate::snapshot::{DisplayLimits, SnapshotParams, StagedSnapshot, validate_display_limits};

// ─── Tracked properties ──────────────────────────────────────────────────────

/// Names carried by [`SourceController::property_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyName {
    SequenceIndex,
    CollectionIndex,
    SliceCenter,
    SliceWidth,
    SliceInterval,
    DisplayLimits,
    ComplexDisplayType,
    ColorMap,
    CalibrationStyle,
}

impl PropertyName {
    /// True if a change invalidates the current snapshot.
    #[must_use]
    pub const fn affects_snapshot(self) -> bool {
        !matches!(self, Self::CalibrationStyle | Self::SliceInterval)
    }
}

/// Offset and scale mapping a pixel index to a displayed coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub offset: f64,
    pub scale: f64,
}

/// How axes are labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CalibrationStyle {
    /// The data's own calibrations.
    #[default]
    Calibrated,
    PixelsTopLeft,
    PixelsCenter,
    RelativeTopLeft,
    RelativeCenter,
}

impl CalibrationStyle {
    pub const ALL: [Self; 5] = [
        Self::Calibrated,
        Self::PixelsTopLeft,
        Self::PixelsCenter,
        Self::RelativeTopLeft,
        Self::RelativeCenter,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calibrated => "calibrated",
            Self::PixelsTopLeft => "pixels-top-left",
            Self::PixelsCenter => "pixels-center",
            Self::RelativeTopLeft => "relative-top-left",
            Self::RelativeCenter => "relative-center",
        }
    }

    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == id)
    }

    /// Per-dimension calibrations for `shape`; `None` means "use the data's".
    #[must_use]
    pub fn calibrations(self, shape: &[usize]) -> Option<Vec<Calibration>> {
        let calibration = |size: usize| {
            let size = size.max(1) as f64;
            match self {
                Self::PixelsTopLeft | Self::Calibrated => Calibration {
                    offset: 0.0,
                    scale: 1.0,
                },
                Self::PixelsCenter => Calibration {
                    offset: -size / 2.0,
                    scale: 1.0,
                },
                Self::RelativeTopLeft => Calibration {
                    offset: 0.0,
                    scale: 1.0 / size,
                },
                Self::RelativeCenter => Calibration {
                    offset: -1.0,
                    scale: 2.0 / size,
                },
            }
        };
        match self {
            Self::Calibrated => None,
            _ => Some(shape.iter().map(|&s| calibration(s)).collect()),
        }
    }
}

impl fmt::Display for CalibrationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Controller ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct ControllerState {
    data: Option<Arc<DataAndMetadata>>,
    indices: SliceIndices,
    display_limits: Option<DisplayLimits>,
    complex_display_type: Option<ComplexDisplayType>,
    color_map: Option<ColorMapId>,
    calibration_style: CalibrationStyle,
}

/// Owns one source's data, display parameters and snapshot slots.
pub struct SourceController {
    id: SourceId,
    config: SnapshotConfig,
    state: RwLock<ControllerState>,
    current: Mutex<Option<Arc<StagedSnapshot>>>,
    last_good: Arc<ArcSwapOption<StagedSnapshot>>,
    generation: AtomicU64,
    is_master: AtomicBool,
    property_changed: Event<PropertyName>,
    display_changed: Event<()>,
    display_data_will_change: Event<()>,
    snapshot_available: Event<()>,
}

impl SourceController {
    #[must_use]
    pub fn new(config: SnapshotConfig) -> Arc<Self> {
        Self::with_id(SourceId::new(), config)
    }

    /// A controller whose snapshots use `config.snapshot`.
    #[must_use]
    pub fn from_display_config(config: &DisplayConfig) -> Arc<Self> {
        Self::new(config.snapshot.clone())
    }

    /// A controller for an existing source identity.
    #[must_use]
    pub fn with_id(id: SourceId, config: SnapshotConfig) -> Arc<Self> {
        Arc::new(Self {
            id,
            config,
            state: RwLock::new(ControllerState::default()),
            current: Mutex::new(None),
            last_good: Arc::new(ArcSwapOption::empty()),
            generation: AtomicU64::new(0),
            is_master: AtomicBool::new(true),
            property_changed: Event::new(),
            display_changed: Event::new(),
            display_data_will_change: Event::new(),
            snapshot_available: Event::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> SourceId {
        self.id
    }

    // ── Events ──

    #[must_use]
    pub fn property_changed(&self) -> &Event<PropertyName> {
        &self.property_changed
    }

    /// Anything visible changed.
    #[must_use]
    pub fn display_changed(&self) -> &Event<()> {
        &self.display_changed
    }

    #[must_use]
    pub fn display_data_will_change(&self) -> &Event<()> {
        &self.display_data_will_change
    }

    /// A new snapshot can be built; consumers should re-read.
    #[must_use]
    pub fn snapshot_available(&self) -> &Event<()> {
        &self.snapshot_available
    }

    // ── Data ──

    #[must_use]
    pub fn data(&self) -> Option<Arc<DataAndMetadata>> {
        self.state.read().data.clone()
    }

    /// Replace the source data. Indices are re-clamped when the dimensional
    /// shape or layout changed.
    pub fn update_data(&self, data: Option<DataAndMetadata>) {
        let data = data.map(Arc::new);
        let changed = {
            let mut state = self.state.write();
            let layout = |d: &Option<Arc<DataAndMetadata>>| {
                d.as_ref()
                    .map(|d| (d.dimensional_shape().to_vec(), d.descriptor()))
            };
            let reshaped = layout(&state.data) != layout(&data);
            state.data = data;
            if reshaped {
                let before = state.indices;
                state.indices = index::revalidate(state.data.as_deref(), before);
                index_changes(&before, &state.indices)
            } else {
                Vec::new()
            }
        };
        debug!(source = %self.id, reindexed = changed.len(), "data updated");
        self.discard_current();
        for name in changed {
            self.property_changed.fire(&name);
        }
        self.snapshot_available.fire(&());
        self.display_changed.fire(&());
    }

    /// Shape of the 2-D (or 1-D) view of the data.
    #[must_use]
    pub fn preview_2d_shape(&self) -> Option<Vec<usize>> {
        self.state.read().data.as_ref().map(|d| d.preview_2d_shape())
    }

    // ── Snapshots ──

    /// The snapshot to display.
    ///
    /// With `immediate` set, a master controller that already has a finalized
    /// snapshot returns it without building anything. Otherwise the current
    /// snapshot is returned, built first if needed.
    #[must_use]
    pub fn get_snapshot(&self, immediate: bool) -> Arc<StagedSnapshot> {
        if immediate
            && self.is_master()
            && let Some(last_good) = self.last_good.load_full()
        {
            return last_good;
        }
        self.current_snapshot()
    }

    /// The most recently finalized snapshot.
    #[must_use]
    pub fn last_good(&self) -> Option<Arc<StagedSnapshot>> {
        self.last_good.load_full()
    }

    fn current_snapshot(&self) -> Arc<StagedSnapshot> {
        let mut current = self.current.lock();
        if let Some(snapshot) = current.as_ref() {
            return Arc::clone(snapshot);
        }
        let params = {
            let state = self.state.read();
            SnapshotParams {
                data: state.data.clone(),
                indices: state.indices,
                display_limits: state.display_limits,
                complex_display_type: state.complex_display_type,
                color_map: state.color_map,
            }
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = StagedSnapshot::new(params, self.config.clone()).with_generation(generation);
        let slot = Arc::clone(&self.last_good);
        let source = self.id;
        snapshot.set_on_finalize(move |finished| {
            slot.rcu(|previous| match previous {
                Some(p) if p.generation() >= finished.generation() => Some(Arc::clone(p)),
                _ => Some(Arc::clone(finished)),
            });
            trace!(source = %source, generation = finished.generation(), "snapshot finalized");
        });
        let snapshot = Arc::new(snapshot);
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }

    fn discard_current(&self) {
        self.current.lock().take();
    }

    // ── Master status ──

    /// A consumer that needs authoritative freshness is attached.
    pub fn increment_display_ref_count(&self) {
        self.is_master.store(true, Ordering::Release);
    }

    pub fn decrement_display_ref_count(&self) {
        self.is_master.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_master(&self) -> bool {
        self.is_master.load(Ordering::Acquire)
    }

    // ── Indices ──

    #[must_use]
    pub fn indices(&self) -> SliceIndices {
        self.state.read().indices
    }

    pub fn set_sequence_index(&self, value: i64) {
        self.mutate(|state| {
            let v = index::validate_sequence_index(state.data.as_deref(), value);
            let changed = v != state.indices.sequence_index;
            state.indices.sequence_index = v;
            if changed { vec![PropertyName::SequenceIndex] } else { Vec::new() }
        });
    }

    pub fn set_collection_index(&self, value: [i64; 3]) {
        self.mutate(|state| {
            let v = index::validate_collection_index(state.data.as_deref(), value);
            let changed = v != state.indices.collection_index;
            state.indices.collection_index = v;
            if changed { vec![PropertyName::CollectionIndex] } else { Vec::new() }
        });
    }

    pub fn set_slice_center(&self, value: i64) {
        self.mutate(|state| {
            let before = state.indices;
            state.indices.slice_center =
                index::validate_slice_center(state.data.as_deref(), value, before.slice_width);
            index_changes(&before, &state.indices)
        });
    }

    pub fn set_slice_width(&self, value: i64) {
        self.mutate(|state| {
            let before = state.indices;
            state.indices.slice_width =
                index::validate_slice_width(state.data.as_deref(), value, before.slice_center);
            index_changes(&before, &state.indices)
        });
    }

    /// Fractional `(start, end)` of the slice window along the last axis.
    #[must_use]
    pub fn slice_interval(&self) -> Option<(f64, f64)> {
        let state = self.state.read();
        index::slice_interval(state.data.as_deref(), &state.indices)
    }

    /// Move the slice window to cover `interval` (fractions of the depth).
    pub fn set_slice_interval(&self, interval: (f64, f64)) {
        self.mutate(|state| {
            let data = state.data.as_deref();
            let Some((center, width)) = index::slice_for_interval(data, interval) else {
                return Vec::new();
            };
            let before = state.indices;
            let center = index::validate_slice_center(data, center, before.slice_width);
            let width = index::validate_slice_width(data, width, center);
            state.indices.slice_center = center;
            state.indices.slice_width = width;
            index_changes(&before, &state.indices)
        });
    }

    // ── Display parameters ──

    #[must_use]
    pub fn display_limits(&self) -> Option<DisplayLimits> {
        self.state.read().display_limits
    }

    /// Set explicit limits from up to two values; see
    /// [`validate_display_limits`].
    pub fn set_display_limits(&self, values: &[Option<f64>]) {
        let limits = validate_display_limits(values);
        self.mutate(|state| {
            let changed = state.display_limits != limits;
            state.display_limits = limits;
            if changed { vec![PropertyName::DisplayLimits] } else { Vec::new() }
        });
    }

    pub fn reset_display_limits(&self) {
        self.set_display_limits(&[]);
    }

    /// Set the limits to the NaN-ignoring extent of what is displayed now.
    pub fn auto_display_limits(&self) {
        let snapshot = self.get_snapshot(true);
        let Some(projected) = snapshot.projected() else {
            return;
        };
        let DisplayData::Scalar(values) = projected.as_ref() else {
            return;
        };
        let (lo, hi) = values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if lo <= hi {
            self.set_display_limits(&[Some(lo), Some(hi)]);
        }
    }

    #[must_use]
    pub fn complex_display_type(&self) -> Option<ComplexDisplayType> {
        self.state.read().complex_display_type
    }

    pub fn set_complex_display_type(&self, value: Option<ComplexDisplayType>) {
        self.mutate(|state| {
            let changed = state.complex_display_type != value;
            state.complex_display_type = value;
            if changed { vec![PropertyName::ComplexDisplayType] } else { Vec::new() }
        });
    }

    #[must_use]
    pub fn color_map(&self) -> Option<ColorMapId> {
        self.state.read().color_map
    }

    pub fn set_color_map(&self, value: Option<ColorMapId>) {
        self.mutate(|state| {
            let changed = state.color_map != value;
            state.color_map = value;
            if changed { vec![PropertyName::ColorMap] } else { Vec::new() }
        });
    }

    /// Select a color map by id; unknown ids clear the selection.
    pub fn set_color_map_id(&self, id: &str) {
        self.set_color_map(ColorMapId::parse(id));
    }

    /// The effective table: none without displayable data, else the selected
    /// map or grayscale.
    #[must_use]
    pub fn color_map_table(&self) -> Option<&'static ColorTable> {
        let state = self.state.read();
        let data = state.data.as_ref()?;
        if data.preview_2d_shape().is_empty() {
            return None;
        }
        Some(state.color_map.unwrap_or_default().table())
    }

    #[must_use]
    pub fn calibration_style(&self) -> CalibrationStyle {
        self.state.read().calibration_style
    }

    pub fn set_calibration_style(&self, value: CalibrationStyle) {
        self.mutate(|state| {
            let changed = state.calibration_style != value;
            state.calibration_style = value;
            if changed { vec![PropertyName::CalibrationStyle] } else { Vec::new() }
        });
    }

    /// Calibrations for the preview axes under the current style.
    #[must_use]
    pub fn displayed_calibrations(&self) -> Option<Vec<Calibration>> {
        let shape = self.preview_2d_shape()?;
        self.calibration_style().calibrations(&shape)
    }

    // ── Change plumbing ──

    /// Apply `f` under the state lock, then announce whatever it reports as
    /// changed.
    fn mutate(&self, f: impl FnOnce(&mut ControllerState) -> Vec<PropertyName>) {
        let changed = f(&mut self.state.write());
        if changed.is_empty() {
            return;
        }
        let affects = changed.iter().any(|n| n.affects_snapshot());
        if affects {
            self.discard_current();
        }
        for name in &changed {
            trace!(source = %self.id, property = ?name, "property changed");
            self.property_changed.fire(name);
        }
        self.display_changed.fire(&());
        if affects {
            self.display_data_will_change.fire(&());
            self.snapshot_available.fire(&());
        }
    }
}

/// Which index properties differ between `before` and `after`.
fn index_changes(before: &SliceIndices, after: &SliceIndices) -> Vec<PropertyName> {
    let mut names = Vec::new();
    if before.sequence_index != after.sequence_index {
        names.push(PropertyName::SequenceIndex);
    }
    if before.collection_index != after.collection_index {
        names.push(PropertyName::CollectionIndex);
    }
    if before.slice_center != after.slice_center {
        names.push(PropertyName::SliceCenter);
    }
    if before.slice_width != after.slice_width {
        names.push(PropertyName::SliceWidth);
    }
    if before.slice_center != after.slice_center || before.slice_width != after.slice_width {
        names.push(PropertyName::SliceInterval);
    }
    names
}

impl DataSource<Arc<StagedSnapshot>> for SourceController {
    fn current_data(&self) -> Option<Arc<StagedSnapshot>> {
        self.state.read().data.as_ref()?;
        Some(self.get_snapshot(true))
    }
}

impl fmt::Debug for SourceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceController")
            .field("id", &self.id)
            .field("indices", &self.indices())
            .field("is_master", &self.is_master())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndv_core::data::DataDescriptor;

    fn image(w: usize, h: usize) -> DataAndMetadata {
        DataAndMetadata::real(&[h, w], (0..w * h).map(|i| i as f64).collect()).unwrap()
    }

    fn spectrum_image(depth: usize) -> DataAndMetadata {
        DataAndMetadata::real(&[2, 2, depth], vec![1.0; 4 * depth]).unwrap()
    }

    fn record(c: &SourceController) -> (Arc<Mutex<Vec<String>>>, Vec<ndv_core::event::Listener>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Vec::new();
        let l = Arc::clone(&log);
        listeners.push(c.property_changed().listen(move |n| l.lock().push(format!("{n:?}"))));
        let l = Arc::clone(&log);
        listeners.push(c.display_changed().listen(move |_| l.lock().push("display".into())));
        let l = Arc::clone(&log);
        listeners.push(c.display_data_will_change().listen(move |_| l.lock().push("will".into())));
        let l = Arc::clone(&log);
        listeners.push(c.snapshot_available().listen(move |_| l.lock().push("available".into())));
        (log, listeners)
    }

    #[test]
    fn current_is_reused_until_a_parameter_changes() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(4, 4)));
        let a = c.get_snapshot(false);
        let b = c.get_snapshot(false);
        assert!(Arc::ptr_eq(&a, &b));
        c.set_color_map(Some(ColorMapId::Hot));
        let d = c.get_snapshot(false);
        assert!(!Arc::ptr_eq(&a, &d));
        assert_eq!(d.params().color_map, Some(ColorMapId::Hot));
    }

    #[test]
    fn immediate_read_returns_last_good_for_master() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(2, 2)));
        let first = c.get_snapshot(false);
        first.finalize();
        c.set_color_map(Some(ColorMapId::Ice));
        assert!(Arc::ptr_eq(&c.get_snapshot(true), &first));
        assert!(!Arc::ptr_eq(&c.get_snapshot(false), &first));
    }

    #[test]
    fn non_master_always_builds_current() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(2, 2)));
        let first = c.get_snapshot(false);
        first.finalize();
        c.set_color_map(Some(ColorMapId::Ice));
        c.decrement_display_ref_count();
        assert!(!c.is_master());
        assert!(!Arc::ptr_eq(&c.get_snapshot(true), &first));
        c.increment_display_ref_count();
        assert!(Arc::ptr_eq(&c.get_snapshot(true), &first));
    }

    #[test]
    fn immediate_without_last_good_builds_current() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(2, 2)));
        let s = c.get_snapshot(true);
        assert!(!s.is_finalized());
        assert!(Arc::ptr_eq(&s, &c.get_snapshot(false)));
    }

    #[test]
    fn late_finalize_of_older_snapshot_is_ignored() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(2, 2)));
        let old = c.get_snapshot(false);
        c.set_color_map(Some(ColorMapId::Hot));
        let new = c.get_snapshot(false);
        new.finalize();
        old.finalize();
        assert!(Arc::ptr_eq(&c.last_good().unwrap(), &new));
    }

    #[test]
    fn snapshot_param_change_discards_before_notifying() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(2, 2)));
        let before = c.get_snapshot(false);
        let seen = Arc::new(Mutex::new(None));
        let _l = {
            let seen = Arc::clone(&seen);
            let weak = Arc::downgrade(&c);
            c.display_data_will_change().listen(move |_| {
                if let Some(c) = weak.upgrade() {
                    *seen.lock() = Some(c.get_snapshot(false));
                }
            })
        };
        c.set_display_limits(&[Some(0.0), Some(1.0)]);
        let seen = seen.lock().clone().unwrap();
        assert!(!Arc::ptr_eq(&seen, &before));
        assert_eq!(seen.params().display_limits, Some(DisplayLimits::new(0.0, 1.0)));
    }

    #[test]
    fn notification_order_for_snapshot_parameter() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(2, 2)));
        let (log, _listeners) = record(&c);
        c.set_color_map(Some(ColorMapId::Thermal));
        assert_eq!(*log.lock(), vec!["ColorMap", "display", "will", "available"]);
    }

    #[test]
    fn calibration_style_does_not_touch_snapshot() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(2, 2)));
        let before = c.get_snapshot(false);
        let (log, _listeners) = record(&c);
        c.set_calibration_style(CalibrationStyle::RelativeCenter);
        assert_eq!(*log.lock(), vec!["CalibrationStyle", "display"]);
        assert!(Arc::ptr_eq(&before, &c.get_snapshot(false)));
    }

    #[test]
    fn unchanged_value_is_silent() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(image(2, 2)));
        let (log, _listeners) = record(&c);
        c.set_sequence_index(5);
        c.set_color_map(None);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn slice_setters_clamp_and_announce_interval() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(spectrum_image(10)));
        c.set_slice_center(5);
        c.set_slice_width(4);
        assert_eq!(c.indices().slice_width, 4);
        let (log, _listeners) = record(&c);
        c.set_slice_center(0);
        assert_eq!(c.indices().slice_center, 2);
        c.set_slice_center(20);
        assert_eq!(c.indices().slice_center, 8);
        let log = log.lock();
        assert!(log.iter().any(|e| e == "SliceInterval"));
        assert!(log.iter().any(|e| e == "SliceCenter"));
    }

    #[test]
    fn slice_interval_round_trip() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(spectrum_image(100)));
        c.set_slice_interval((0.25, 0.75));
        let indices = c.indices();
        assert_eq!((indices.slice_center, indices.slice_width), (50, 50));
        assert_eq!(c.slice_interval(), Some((0.26, 0.76)));
    }

    #[test]
    fn update_data_revalidates_on_shape_change() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(spectrum_image(20)));
        c.set_slice_center(15);
        assert_eq!(c.indices().slice_center, 15);
        let (log, _listeners) = record(&c);
        c.update_data(Some(spectrum_image(10)));
        assert_eq!(c.indices().slice_center, 9);
        let log = log.lock();
        assert_eq!(log.first().map(String::as_str), Some("SliceCenter"));
        assert!(log.ends_with(&["available".to_owned(), "display".to_owned()]));
    }

    #[test]
    fn same_shape_update_keeps_indices() {
        let c = SourceController::new(SnapshotConfig::default());
        let seq = |v: f64| {
            DataAndMetadata::real(&[3, 2, 2], vec![v; 12])
                .unwrap()
                .with_descriptor(DataDescriptor::new(true, 0, 2))
                .unwrap()
        };
        c.update_data(Some(seq(0.0)));
        c.set_sequence_index(2);
        let (log, _listeners) = record(&c);
        c.update_data(Some(seq(1.0)));
        assert_eq!(c.indices().sequence_index, 2);
        assert_eq!(*log.lock(), vec!["available", "display"]);
    }

    #[test]
    fn auto_limits_ignore_nan() {
        let c = SourceController::new(SnapshotConfig::default());
        c.update_data(Some(
            DataAndMetadata::real(&[1, 4], vec![f64::NAN, -2.0, 3.0, f64::NAN]).unwrap(),
        ));
        c.auto_display_limits();
        assert_eq!(c.display_limits(), Some(DisplayLimits::new(-2.0, 3.0)));
        c.reset_display_limits();
        assert_eq!(c.display_limits(), None);
    }

    #[test]
    fn color_map_table_needs_data() {
        let c = SourceController::new(SnapshotConfig::default());
        assert!(c.color_map_table().is_none());
        c.update_data(Some(image(2, 2)));
        assert_eq!(c.color_map_table(), Some(ColorMapId::Grayscale.table()));
        c.set_color_map_id("hot");
        assert_eq!(c.color_map_table(), Some(ColorMapId::Hot.table()));
        c.set_color_map_id("no-such-map");
        assert_eq!(c.color_map(), None);
    }

    #[test]
    fn display_config_sets_snapshot_tuning() {
        let config = DisplayConfig::default()
            .with_snapshot(SnapshotConfig::default().with_sample_size(10).with_sample_seed(4));
        let c = SourceController::from_display_config(&config);
        let values = (0..16).map(|i| num_complex::Complex64::new(f64::from(i), 1.0)).collect();
        c.update_data(Some(DataAndMetadata::complex(&[4, 4], values).unwrap()));
        assert_eq!(c.get_snapshot(false).sample().map(|s| s.len()), Some(10));
    }

    #[test]
    fn calibration_styles() {
        assert_eq!(CalibrationStyle::Calibrated.calibrations(&[4]), None);
        let rel = CalibrationStyle::RelativeCenter.calibrations(&[4]).unwrap();
        assert_eq!(rel[0], Calibration { offset: -1.0, scale: 0.5 });
        let px = CalibrationStyle::PixelsCenter.calibrations(&[5]).unwrap();
        assert_eq!(px[0], Calibration { offset: -2.5, scale: 1.0 });
        let px = CalibrationStyle::PixelsCenter.calibrations(&[4]).unwrap();
        assert_eq!(px[0], Calibration { offset: -2.0, scale: 1.0 });
        for s in CalibrationStyle::ALL {
            assert_eq!(CalibrationStyle::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn data_source_requires_data() {
        let c = SourceController::new(SnapshotConfig::default());
        assert!(c.current_data().is_none());
        c.update_data(Some(image(2, 2)));
        assert!(c.current_data().is_some());
    }
}
