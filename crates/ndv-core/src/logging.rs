//! Subscriber setup for binaries and integration tests.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the host. `RUST_LOG` controls the filter, defaulting to `info`.

use tracing_subscriber::EnvFilter;

/// Output format for [`init`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line.
    #[cfg(feature = "tracing-json")]
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global subscriber. Returns `false` if one was already set.
pub fn init(format: LogFormat) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_names(true);
    match format {
        LogFormat::Text => builder.try_init().is_ok(),
        #[cfg(feature = "tracing-json")]
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
