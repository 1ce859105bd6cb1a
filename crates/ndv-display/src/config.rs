//! Display-level configuration.

use std::env;

use ndv_runtime::ProcessorConfig;

/// Tuning for [`StagedSnapshot`](crate::snapshot::StagedSnapshot) stages.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConfig {
    /// Elements drawn (with replacement) for the complex-data sample.
    /// Default: 200.
    pub sample_size: usize,
    /// Fractional rank in the sorted sample used as the lower display bound
    /// for complex data. Default: 0.05.
    pub low_percentile: f64,
    /// Fixed sampling seed; `None` draws a fresh seed per snapshot.
    /// Default: `None`.
    pub sample_seed: Option<u64>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            sample_size: 200,
            low_percentile: 0.05,
            sample_seed: None,
        }
    }
}

impl SnapshotConfig {
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    #[must_use]
    pub fn with_low_percentile(mut self, low_percentile: f64) -> Self {
        self.low_percentile = low_percentile.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }
}

/// Everything a display pipeline needs to know up front.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub processor: ProcessorConfig,
    pub snapshot: SnapshotConfig,
    /// Thumbnail frame `(width, height)`. Default: 72x72.
    pub thumbnail_size: (usize, usize),
    /// Histogram bin count. Default: 320.
    pub histogram_bins: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            processor: ProcessorConfig::default(),
            snapshot: SnapshotConfig::default(),
            thumbnail_size: (72, 72),
            histogram_bins: 320,
        }
    }
}

impl DisplayConfig {
    #[must_use]
    pub fn with_processor(mut self, processor: ProcessorConfig) -> Self {
        self.processor = processor;
        self
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }

    #[must_use]
    pub fn with_thumbnail_size(mut self, width: usize, height: usize) -> Self {
        self.thumbnail_size = (width, height);
        self
    }

    #[must_use]
    pub fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = bins.max(1);
        self
    }

    /// Defaults overridden by `NDV_MIN_INTERVAL_MS`, `NDV_THUMBNAIL_SIZE`
    /// (`WxH` or a single `N`) and `NDV_HISTOGRAM_BINS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            processor: ProcessorConfig::from_lookup(&lookup),
            ..Self::default()
        };
        if let Some(val) = lookup("NDV_THUMBNAIL_SIZE")
            && let Some(size) = parse_size(&val)
        {
            config.thumbnail_size = size;
        }
        if let Some(val) = lookup("NDV_HISTOGRAM_BINS")
            && let Ok(bins) = val.trim().parse::<usize>()
            && bins > 0
        {
            config.histogram_bins = bins;
        }
        config
    }
}

fn parse_size(val: &str) -> Option<(usize, usize)> {
    let val = val.trim();
    let (w, h) = match val.split_once(['x', 'X']) {
        Some((w, h)) => (w.trim().parse().ok()?, h.trim().parse().ok()?),
        None => {
            let n = val.parse().ok()?;
            (n, n)
        }
    };
    (w > 0 && h > 0).then_some((w, h))
}
