//! Calculators for the artifacts derived from a display snapshot.

use std::sync::Arc;

use ndarray::{ArrayD, Axis};
use ndv_runtime::{Calculator, Result};

use crate::image::RgbaImage;
use crate::project::DisplayData;
use crate::snapshot::StagedSnapshot;

/// Cache key of the thumbnail artifact.
pub const THUMBNAIL_KEY: &str = "thumbnail_data";
/// Cache key of the histogram artifact.
pub const HISTOGRAM_KEY: &str = "histogram_data";
/// Cache key of the statistics artifact.
pub const STATISTICS_KEY: &str = "statistics_data";

/// Scalar view of projected data. Color becomes Rec. 601 luma.
fn scalar_values(projected: &DisplayData) -> ArrayD<f64> {
    match projected {
        DisplayData::Scalar(a) => a.clone(),
        DisplayData::Color(a) => {
            let last = Axis(a.ndim() - 1);
            a.map_axis(last, |px| {
                0.299 * f64::from(px[0]) + 0.587 * f64::from(px[1]) + 0.114 * f64::from(px[2])
            })
        }
    }
}

// ─── Thumbnail ───────────────────────────────────────────────────────────────

/// The snapshot bitmap fitted into a fixed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailCalculator {
    pub width: usize,
    pub height: usize,
}

impl ThumbnailCalculator {
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl Calculator<Arc<StagedSnapshot>, Arc<RgbaImage>> for ThumbnailCalculator {
    fn calculate(&self, snapshot: &Arc<StagedSnapshot>) -> Result<Option<Arc<RgbaImage>>> {
        Ok(snapshot
            .bitmap()
            .map(|bitmap| Arc::new(bitmap.fit_into(self.width, self.height))))
    }

    /// A blank frame, so a thumbnail is never missing.
    fn default_value(&self) -> Option<Arc<RgbaImage>> {
        Some(Arc::new(RgbaImage::new(self.width, self.height)))
    }
}

// ─── Histogram ───────────────────────────────────────────────────────────────

/// Equal-width bins over a value range, scaled so the tallest is 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub bins: Vec<f64>,
    pub range: (f64, f64),
}

impl Histogram {
    /// Bin `values` over `range`. Values outside the range, and NaN, are
    /// ignored. A degenerate range is widened to `lo +- 0.5`.
    #[must_use]
    pub fn compute(values: impl IntoIterator<Item = f64>, bins: usize, range: (f64, f64)) -> Self {
        let bins = bins.max(1);
        let (lo, hi) = if range.1 > range.0 {
            range
        } else {
            (range.0 - 0.5, range.0 + 0.5)
        };
        let mut counts = vec![0.0f64; bins];
        let span = hi - lo;
        for v in values {
            if !(lo..=hi).contains(&v) {
                continue;
            }
            let i = (((v - lo) / span) * bins as f64) as usize;
            counts[i.min(bins - 1)] += 1.0;
        }
        let max = counts.iter().copied().fold(0.0, f64::max);
        if max > 0.0 {
            for c in &mut counts {
                *c /= max;
            }
        }
        Self {
            bins: counts,
            range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramCalculator {
    pub bins: usize,
}

impl HistogramCalculator {
    #[must_use]
    pub const fn new(bins: usize) -> Self {
        Self { bins }
    }
}

impl Calculator<Arc<StagedSnapshot>, Arc<Histogram>> for HistogramCalculator {
    fn calculate(&self, snapshot: &Arc<StagedSnapshot>) -> Result<Option<Arc<Histogram>>> {
        let (Some(projected), Some(range)) = (snapshot.projected(), snapshot.display_range()) else {
            return Ok(None);
        };
        let values = scalar_values(&projected);
        Ok(Some(Arc::new(Histogram::compute(
            values.iter().copied(),
            self.bins,
            range,
        ))))
    }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Summary statistics of the displayed values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub rms: f64,
    pub sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatisticsCalculator;

impl Calculator<Arc<StagedSnapshot>, Statistics> for StatisticsCalculator {
    fn calculate(&self, snapshot: &Arc<StagedSnapshot>) -> Result<Option<Statistics>> {
        let (Some(projected), Some((min, max))) = (snapshot.projected(), snapshot.data_range()) else {
            return Ok(None);
        };
        let values = scalar_values(&projected);
        let count = values.len();
        if count == 0 {
            return Ok(None);
        }
        let n = count as f64;
        let mean = values.sum() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let rms = (values.iter().map(|v| v * v).sum::<f64>() / n).sqrt();
        Ok(Some(Statistics {
            count,
            mean,
            std: variance.sqrt(),
            min,
            max,
            rms,
            sum: mean * n,
        }))
    }
}
