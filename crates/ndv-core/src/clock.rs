//! Time source for throttling.
//!
//! Processors read time through [`Clock`] so tests can drive the throttle
//! window deterministically with a [`LabClock`] instead of sleeping.
//!
//! # Example
//!
//! ```
//! use ndv_core::clock::{Clock, LabClock};
//! use web_time::Duration;
//!
//! let lab = LabClock::new();
//! let clock = Clock::lab(&lab);
//! let t0 = clock.now();
//! clock.sleep(Duration::from_millis(500));
//! assert_eq!(clock.now() - t0, Duration::from_millis(500));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use web_time::{Duration, Instant};

// ─── LabClock ────────────────────────────────────────────────────────────────

/// Time that only moves when told to.
///
/// A throttled processor waiting out its minimum interval on a lab clock
/// returns at once and pushes this clock forward by the wait. Every clone
/// reads the same time, so a test holding one clone observes the waits of a
/// processor holding another.
#[derive(Debug, Clone)]
pub struct LabClock {
    start: Instant,
    advanced_ns: Arc<AtomicU64>,
}

impl LabClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            advanced_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward by `delta`, saturating at `u64::MAX` nanoseconds.
    pub fn advance(&self, delta: Duration) {
        let ns = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .advanced_ns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                Some(t.saturating_add(ns))
            });
    }

    /// Sum of every `advance` so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.advanced_ns.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Wall clock or lab clock.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    Real,
    Lab(LabClock),
}

impl Clock {
    #[must_use]
    pub fn lab(clock: &LabClock) -> Self {
        Self::Lab(clock.clone())
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        match self {
            Self::Real => Instant::now(),
            Self::Lab(lab) => lab.now(),
        }
    }

    /// Block for `duration`. A lab clock advances instead of blocking.
    pub fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        match self {
            Self::Real => std::thread::sleep(duration),
            Self::Lab(lab) => lab.advance(duration),
        }
    }

    #[must_use]
    pub const fn is_lab(&self) -> bool {
        matches!(self, Self::Lab(_))
    }
}
