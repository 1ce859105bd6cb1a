//! Throttled, single-flight background computation of one cached artifact.
//!
//! A [`ComputeProcessor`] owns one `(owner, key)` entry of a [`StaleCache`]
//! and turns "dirty" into "fresh" off the calling thread.
//!
//! # State machine
//!
//! ```text
//! CLEAN --mark_dirty--> DIRTY --recompute_if_necessary--> RUNNING
//! RUNNING --value or default--> CLEAN
//! RUNNING --no value, no default--> DIRTY (entry evicted)
//! RUNNING --error or panic--> DIRTY (previous value kept)
//! DIRTY/RUNNING --recompute_if_necessary while RUNNING--> unchanged
//! ```
//!
//! # Invariants
//!
//! 1. At most one dispatched job per processor is queued or running.
//! 2. A job never starts its calculation earlier than `min_interval` after
//!    the previous completion.
//! 3. `mark_dirty` during a running calculation leaves the entry dirty once
//!    that calculation publishes, so the next trigger recomputes.
//! 4. Calculation failures and panics are logged and never propagate.
//! 5. The `updated` event fires with no processor lock held.
//! 6. The processor never keeps its data source alive.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ndv_core::SourceId;
use ndv_core::clock::Clock;
use ndv_core::event::Event;
use parking_lot::Mutex;
use tracing::{debug, error, trace};
use web_time::{Duration, Instant};

use crate::cache::StaleCache;
use crate::config::ProcessorConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ComputeError, Result};

// ─── Contracts ───────────────────────────────────────────────────────────────

/// Supplies the latest input for a computation.
///
/// Processors hold this weakly: when the owner goes away, recomputation
/// reports [`RecomputeOutcome::SourceGone`] instead of keeping it alive.
pub trait DataSource<D>: Send + Sync {
    /// The most recent input, or `None` if there is nothing to compute from.
    fn current_data(&self) -> Option<D>;
}

/// Derives a cached value from input data.
pub trait Calculator<D, V>: Send + Sync {
    /// `Ok(None)` means "no result" and falls back to [`default_value`].
    ///
    /// [`default_value`]: Calculator::default_value
    fn calculate(&self, data: &D) -> Result<Option<V>>;

    /// Placeholder stored when there is no result. `None` evicts the entry.
    fn default_value(&self) -> Option<V> {
        None
    }
}

/// What a call to [`ComputeProcessor::recompute_data`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecomputeOutcome {
    /// Entry was not dirty; nothing ran.
    Fresh,
    /// A new value was stored.
    Computed,
    /// No result; the default value was stored.
    Defaulted,
    /// No result and no default; the entry was removed.
    Evicted,
    /// The calculation failed; the entry stays dirty.
    Failed,
    /// The data source no longer exists.
    SourceGone,
}

impl RecomputeOutcome {
    /// True if the cache entry changed.
    #[must_use]
    pub const fn published(self) -> bool {
        matches!(self, Self::Computed | Self::Defaulted | Self::Evicted)
    }
}

// ─── Processor ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Flight {
    in_flight: bool,
    last_completed_at: Option<Instant>,
}

/// Computes one cached artifact for one owner.
pub struct ComputeProcessor<D, V> {
    owner: SourceId,
    key: String,
    cache: Arc<StaleCache<V>>,
    source: Weak<dyn DataSource<D>>,
    calculator: Box<dyn Calculator<D, V>>,
    config: ProcessorConfig,
    clock: Clock,
    flight: Mutex<Flight>,
    recompute_lock: Mutex<()>,
    dirty_generation: AtomicU64,
    computations: AtomicU64,
    updated: Event<RecomputeOutcome>,
}

impl<D: 'static, V: Clone + Send + 'static> ComputeProcessor<D, V> {
    pub fn new(
        owner: SourceId,
        key: impl Into<String>,
        cache: Arc<StaleCache<V>>,
        source: Weak<dyn DataSource<D>>,
        calculator: impl Calculator<D, V> + 'static,
    ) -> Self {
        Self {
            owner,
            key: key.into(),
            cache,
            source,
            calculator: Box::new(calculator),
            config: ProcessorConfig::default(),
            clock: Clock::Real,
            flight: Mutex::new(Flight::default()),
            recompute_lock: Mutex::new(()),
            dirty_generation: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            updated: Event::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn owner(&self) -> SourceId {
        self.owner
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Fires after every recompute that changed the cache entry.
    #[must_use]
    pub fn updated(&self) -> &Event<RecomputeOutcome> {
        &self.updated
    }

    /// True while a dispatched job is queued or running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.flight.lock().in_flight
    }

    /// Number of times the calculator has been invoked.
    #[must_use]
    pub fn computation_count(&self) -> u64 {
        self.computations.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.cache.is_dirty(self.owner, &self.key)
    }

    /// Flag the cached value as out of date.
    pub fn mark_dirty(&self) {
        self.dirty_generation.fetch_add(1, Ordering::AcqRel);
        self.cache.mark_dirty(self.owner, &self.key);
    }

    /// Schedule a recompute on `dispatcher` if the entry is dirty and no job
    /// is already queued or running. Returns `true` if a job was submitted.
    ///
    /// Without a dispatcher this does nothing.
    pub fn recompute_if_necessary(self: &Arc<Self>, dispatcher: Option<&dyn Dispatcher>) -> bool {
        if !self.is_dirty() {
            return false;
        }
        let Some(dispatcher) = dispatcher else {
            trace!(owner = %self.owner, key = %self.key, "no dispatcher; recompute skipped");
            return false;
        };
        {
            let mut flight = self.flight.lock();
            if flight.in_flight {
                trace!(owner = %self.owner, key = %self.key, "recompute already in flight");
                return false;
            }
            flight.in_flight = true;
        }
        let ticket = FlightTicket(Arc::clone(self));
        dispatcher.submit(
            Box::new(move || {
                let processor = &ticket.0;
                let wait = processor.throttle_wait();
                if !wait.is_zero() {
                    trace!(
                        owner = %processor.owner,
                        key = %processor.key,
                        waited_ms = wait.as_millis() as u64,
                        "throttling recompute"
                    );
                    processor.clock.sleep(wait);
                }
                processor.recompute_data();
            }),
            &self.key,
        );
        true
    }

    /// Time left before the next calculation may start.
    fn throttle_wait(&self) -> Duration {
        let last = self.flight.lock().last_completed_at;
        match last {
            Some(at) => (at + self.config.min_interval).saturating_duration_since(self.clock.now()),
            None => Duration::ZERO,
        }
    }

    /// Compute synchronously if dirty. May block for a long time; never call
    /// from an interactive thread.
    pub fn recompute_data(&self) -> RecomputeOutcome {
        let guard = self.recompute_lock.lock();
        if !self.is_dirty() {
            return RecomputeOutcome::Fresh;
        }
        let Some(source) = self.source.upgrade() else {
            debug!(owner = %self.owner, key = %self.key, "data source gone");
            return RecomputeOutcome::SourceGone;
        };
        let generation = self.dirty_generation.load(Ordering::Acquire);
        let data = source.current_data();
        drop(source);

        let outcome = match data {
            Some(data) => {
                self.computations.fetch_add(1, Ordering::AcqRel);
                let result = catch_unwind(AssertUnwindSafe(|| self.calculator.calculate(&data)))
                    .unwrap_or_else(|payload| Err(ComputeError::from_panic(payload.as_ref())));
                match result {
                    Ok(Some(value)) => {
                        self.publish(value);
                        RecomputeOutcome::Computed
                    }
                    Ok(None) => self.apply_default(),
                    Err(err) => {
                        error!(
                            owner = %self.owner,
                            key = %self.key,
                            error = %err,
                            backtrace = %Backtrace::capture(),
                            "calculation failed; entry left dirty"
                        );
                        RecomputeOutcome::Failed
                    }
                }
            }
            None => self.apply_default(),
        };

        if outcome.published() && self.dirty_generation.load(Ordering::Acquire) != generation {
            // Marked dirty while computing: keep the result but recompute next time.
            self.cache.mark_dirty(self.owner, &self.key);
        }
        drop(guard);

        debug!(owner = %self.owner, key = %self.key, outcome = ?outcome, "recompute finished");
        if outcome.published() {
            self.updated.fire(&outcome);
        }
        outcome
    }

    fn publish(&self, value: V) {
        self.cache.set(self.owner, &self.key, value);
        self.flight.lock().last_completed_at = Some(self.clock.now());
    }

    fn apply_default(&self) -> RecomputeOutcome {
        match self.calculator.default_value() {
            Some(value) => {
                self.publish(value);
                RecomputeOutcome::Defaulted
            }
            None => {
                self.cache.remove(self.owner, &self.key);
                self.flight.lock().last_completed_at = None;
                RecomputeOutcome::Evicted
            }
        }
    }

    /// Last stored value, or the default. Never blocks on computation.
    #[must_use]
    pub fn get_cached(&self) -> Option<V> {
        self.cache
            .get(self.owner, &self.key)
            .or_else(|| self.calculator.default_value())
    }

    /// Compute synchronously if needed, then return the freshest value.
    #[must_use]
    pub fn get_data(&self) -> Option<V> {
        self.recompute_data();
        self.get_cached()
    }
}

impl<D, V> fmt::Debug for ComputeProcessor<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeProcessor")
            .field("owner", &self.owner)
            .field("key", &self.key)
            .field("config", &self.config)
            .field("flight", &*self.flight.lock())
            .finish_non_exhaustive()
    }
}

/// Clears `in_flight` when the dispatched job finishes, panics, or is
/// dropped without running.
struct FlightTicket<D, V>(Arc<ComputeProcessor<D, V>>);

impl<D, V> Drop for FlightTicket<D, V> {
    fn drop(&mut self) {
        self.0.flight.lock().in_flight = false;
    }
}
