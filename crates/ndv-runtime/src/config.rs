//! Processor configuration.

use std::env;

use web_time::Duration;

/// Default minimum spacing between two completed computations.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for a [`ComputeProcessor`](crate::processor::ComputeProcessor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Minimum time from one completion to the start of the next computation.
    /// Default: 500ms.
    pub min_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl ProcessorConfig {
    #[must_use]
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Defaults overridden by `NDV_MIN_INTERVAL_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for `NDV_*` keys.
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(val) = lookup("NDV_MIN_INTERVAL_MS")
            && let Ok(ms) = val.trim().parse::<u64>()
        {
            config.min_interval = Duration::from_millis(ms);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_half_a_second() {
        assert_eq!(ProcessorConfig::default().min_interval, Duration::from_millis(500));
    }

    #[test]
    fn lookup_overrides_interval() {
        let config = ProcessorConfig::from_lookup(|key| {
            (key == "NDV_MIN_INTERVAL_MS").then(|| "25".to_string())
        });
        assert_eq!(config.min_interval, Duration::from_millis(25));
    }

    #[test]
    fn garbage_is_ignored() {
        let config = ProcessorConfig::from_lookup(|_| Some("soon".to_string()));
        assert_eq!(config, ProcessorConfig::default());
    }

    #[test]
    fn builder_sets_interval() {
        let config = ProcessorConfig::default().with_min_interval(Duration::ZERO);
        assert!(config.min_interval.is_zero());
    }
}
