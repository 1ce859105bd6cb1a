//! Immutable display parameters with lazily computed, memoized stages.
//!
//! A [`StagedSnapshot`] freezes everything that determines what a display
//! shows and derives the expensive values on first read:
//!
//! ```text
//! projected ──► data_range ──┐
//!     │                      ├──► display_range ──► bitmap
//!     └──────► sample ───────┘
//! ```
//!
//! # Invariants
//!
//! 1. Each stage is evaluated at most once per snapshot, even when several
//!    threads race to read it; all readers observe the same value.
//! 2. A stage reads only earlier stages of the same snapshot.
//! 3. Parameters never change after construction. New parameters mean a new
//!    snapshot.
//! 4. The finalize hook runs at most once.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use ndv_core::data::{DataAndMetadata, ElementKind};
use ndv_core::index::SliceIndices;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{RngExt, SeedableRng};
use tracing::trace;
use web_time::SystemTime;

use crate::color_map::{self, ColorMapId};
use crate::config::SnapshotConfig;
use crate::image::{Rgba, RgbaImage};
use crate::project::{ComplexDisplayType, DisplayData, project};

// ─── Display limits ──────────────────────────────────────────────────────────

/// Explicit display range override. A missing bound falls back to the data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayLimits {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl DisplayLimits {
    #[must_use]
    pub const fn new(low: f64, high: f64) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }
}

/// Normalise user-supplied limits.
///
/// - no values, or only missing ones: no limits
/// - one value: a lower bound only
/// - two values: ordered low to high; a single missing one is kept missing
#[must_use]
pub fn validate_display_limits(values: &[Option<f64>]) -> Option<DisplayLimits> {
    match values {
        [] | [None] | [None, None, ..] => None,
        [Some(low)] => Some(DisplayLimits {
            low: Some(*low),
            high: None,
        }),
        [Some(a), Some(b), ..] => Some(DisplayLimits::new(a.min(*b), a.max(*b))),
        [low, high, ..] => Some(DisplayLimits {
            low: *low,
            high: *high,
        }),
    }
}

// ─── Parameters ──────────────────────────────────────────────────────────────

/// The frozen inputs of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotParams {
    pub data: Option<Arc<DataAndMetadata>>,
    pub indices: SliceIndices,
    pub display_limits: Option<DisplayLimits>,
    pub complex_display_type: Option<ComplexDisplayType>,
    pub color_map: Option<ColorMapId>,
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Stage identifiers, for evaluation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Projected,
    DataRange,
    Sample,
    DisplayRange,
    Bitmap,
}

impl Stage {
    pub const ALL: [Self; 5] = [
        Self::Projected,
        Self::DataRange,
        Self::Sample,
        Self::DisplayRange,
        Self::Bitmap,
    ];
}

type FinalizeHook = Box<dyn FnOnce(&Arc<StagedSnapshot>) + Send>;

/// One set of display parameters and the values derived from them.
pub struct StagedSnapshot {
    params: SnapshotParams,
    config: SnapshotConfig,
    generation: u64,
    projected: OnceLock<Option<Arc<DisplayData>>>,
    data_range: OnceLock<Option<(f64, f64)>>,
    sample: OnceLock<Option<Arc<[f64]>>>,
    display_range: OnceLock<Option<(f64, f64)>>,
    bitmap: OnceLock<Option<Arc<RgbaImage>>>,
    evaluations: [AtomicU32; 5],
    on_finalize: Mutex<Option<FinalizeHook>>,
    finalized: AtomicBool,
}

impl StagedSnapshot {
    #[must_use]
    pub fn new(params: SnapshotParams, config: SnapshotConfig) -> Self {
        Self {
            params,
            config,
            generation: 0,
            projected: OnceLock::new(),
            data_range: OnceLock::new(),
            sample: OnceLock::new(),
            display_range: OnceLock::new(),
            bitmap: OnceLock::new(),
            evaluations: Default::default(),
            on_finalize: Mutex::new(None),
            finalized: AtomicBool::new(false),
        }
    }

    /// Tag this snapshot with its owner's build counter.
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn params(&self) -> &SnapshotParams {
        &self.params
    }

    #[must_use]
    pub fn data(&self) -> Option<&Arc<DataAndMetadata>> {
        self.params.data.as_ref()
    }

    /// Timestamp of the data this snapshot was built from.
    #[must_use]
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.params.data.as_ref().map(|d| d.timestamp())
    }

    /// How many times `stage` has been evaluated (0 or 1).
    #[must_use]
    pub fn stage_evaluations(&self, stage: Stage) -> u32 {
        self.evaluations[stage as usize].load(Ordering::Acquire)
    }

    fn count(&self, stage: Stage) {
        self.evaluations[stage as usize].fetch_add(1, Ordering::AcqRel);
        trace!(stage = ?stage, "snapshot stage evaluated");
    }

    /// The data reduced to what is displayed.
    #[must_use]
    pub fn projected(&self) -> Option<Arc<DisplayData>> {
        self.projected
            .get_or_init(|| {
                self.count(Stage::Projected);
                let data = self.params.data.as_ref()?;
                project(data, &self.params.indices, self.params.complex_display_type).map(Arc::new)
            })
            .clone()
    }

    /// `(min, max)` of the projected data. Color data is always `(0, 255)`;
    /// any non-finite bound collapses the range to `(0, 0)`.
    #[must_use]
    pub fn data_range(&self) -> Option<(f64, f64)> {
        *self.data_range.get_or_init(|| {
            let projected = self.projected()?;
            self.count(Stage::DataRange);
            match projected.as_ref() {
                DisplayData::Color(_) => Some((0.0, 255.0)),
                DisplayData::Scalar(a) if a.is_empty() => None,
                DisplayData::Scalar(a) => {
                    let mut lo = f64::INFINITY;
                    let mut hi = f64::NEG_INFINITY;
                    for &v in a {
                        if v.is_nan() {
                            return Some((0.0, 0.0));
                        }
                        lo = lo.min(v);
                        hi = hi.max(v);
                    }
                    if lo.is_finite() && hi.is_finite() {
                        Some((lo, hi))
                    } else {
                        Some((0.0, 0.0))
                    }
                }
            }
        })
    }

    /// Sorted random sample of the projected values; complex data only.
    #[must_use]
    pub fn sample(&self) -> Option<Arc<[f64]>> {
        self.sample
            .get_or_init(|| {
                let data = self.params.data.as_ref()?;
                if data.kind() != ElementKind::Complex {
                    return None;
                }
                let projected = self.projected()?;
                self.count(Stage::Sample);
                let values = projected.as_scalar()?;
                if values.is_empty() || self.config.sample_size == 0 {
                    return None;
                }
                let flat: Vec<f64> = values.iter().copied().collect();
                let seed = self
                    .config
                    .sample_seed
                    .unwrap_or_else(|| rand::rng().random::<u64>());
                let mut rng = SmallRng::seed_from_u64(seed);
                let mut sample: Vec<f64> = (0..self.config.sample_size)
                    .map(|_| flat[rng.random_range(0..flat.len())])
                    .collect();
                sample.sort_by(f64::total_cmp);
                Some(sample.into())
            })
            .clone()
    }

    /// The value range mapped onto the color table.
    ///
    /// Explicit limits win (missing bounds filled from the data range). For
    /// complex data with no explicit display type, the lower bound comes from
    /// the sample at `low_percentile`. Otherwise the data range.
    #[must_use]
    pub fn display_range(&self) -> Option<(f64, f64)> {
        *self.display_range.get_or_init(|| {
            let data_range = self.data_range();
            self.count(Stage::DisplayRange);
            if let Some(limits) = self.params.display_limits {
                let low = limits.low.or(data_range.map(|r| r.0))?;
                let high = limits.high.or(data_range.map(|r| r.1))?;
                return Some((low, high));
            }
            let range = data_range?;
            let is_complex = self
                .params
                .data
                .as_ref()
                .is_some_and(|d| d.kind() == ElementKind::Complex);
            if is_complex
                && self.params.complex_display_type.is_none()
                && let Some(sample) = self.sample()
            {
                let rank = (sample.len() as f64 * self.config.low_percentile) as usize;
                let low = sample[rank.min(sample.len() - 1)];
                return Some((low, range.1));
            }
            Some(range)
        })
    }

    /// The color-mapped image. Only 2-D projections produce one.
    #[must_use]
    pub fn bitmap(&self) -> Option<Arc<RgbaImage>> {
        self.bitmap
            .get_or_init(|| {
                let projected = self.projected()?;
                self.data_range()?;
                self.count(Stage::Bitmap);
                match projected.as_ref() {
                    DisplayData::Scalar(a) if a.ndim() == 2 => {
                        let range = self.display_range()?;
                        let table = self.params.color_map.unwrap_or_default().table();
                        let (h, w) = (a.shape()[0], a.shape()[1]);
                        let pixels = a.iter().map(|&v| color_map::apply(table, range, v)).collect();
                        RgbaImage::from_pixels(w, h, pixels).map(Arc::new)
                    }
                    DisplayData::Color(a) if a.ndim() == 3 => {
                        let shape = a.shape();
                        let (h, w, channels) = (shape[0], shape[1], shape[2]);
                        let flat: Vec<u8> = a.iter().copied().collect();
                        let pixels = flat
                            .chunks_exact(channels)
                            .map(|c| Rgba::rgba(c[0], c[1], c[2], c.get(3).copied().unwrap_or(255)))
                            .collect();
                        RgbaImage::from_pixels(w, h, pixels).map(Arc::new)
                    }
                    _ => None,
                }
            })
            .clone()
    }

    /// Register the hook run by [`finalize`](Self::finalize). Replaces any
    /// earlier hook; ignored once finalized.
    pub fn set_on_finalize(&self, hook: impl FnOnce(&Arc<StagedSnapshot>) + Send + 'static) {
        if !self.is_finalized() {
            *self.on_finalize.lock() = Some(Box::new(hook));
        }
    }

    /// Mark this snapshot complete and run the finalize hook. Idempotent.
    pub fn finalize(self: &Arc<Self>) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        let hook = self.on_finalize.lock().take();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}

impl fmt::Debug for StagedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedSnapshot")
            .field("indices", &self.params.indices)
            .field("display_limits", &self.params.display_limits)
            .field("color_map", &self.params.color_map)
            .field("finalized", &self.is_finalized())
            .finish_non_exhaustive()
    }
}
