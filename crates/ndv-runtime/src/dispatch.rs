//! Executors for background computations.
//!
//! [`Dispatcher`] is the seam between processors and thread infrastructure.
//! [`WorkerPool`] is a fixed set of named threads draining one shared
//! channel; [`InlineDispatcher`] runs work on the submitting thread.
//!
//! # Shutdown
//!
//! Dropping or calling [`WorkerPool::shutdown`] closes the channel and joins
//! every worker after the queue drains. Jobs submitted afterwards are
//! dropped with a warning.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs asynchronously.
///
/// `tag` names the job for diagnostics; implementations may also use it to
/// coalesce work.
pub trait Dispatcher: Send + Sync {
    fn submit(&self, job: Job, tag: &str);
}

// ─── InlineDispatcher ────────────────────────────────────────────────────────

/// Runs each job immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn submit(&self, job: Job, tag: &str) {
        trace!(tag, "inline dispatch");
        job();
    }
}

// ─── WorkerPool ──────────────────────────────────────────────────────────────

enum Msg {
    Run { job: Job, tag: String },
}

/// Fixed-size pool of named worker threads.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Msg>>>,
    handles: Vec<JoinHandle<()>>,
    submitted: AtomicUsize,
    completed: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one).
    pub fn new(threads: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let (tx, rx) = mpsc::channel::<Msg>();
        let rx = Arc::new(Mutex::new(rx));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let rx = Arc::clone(&rx);
            let completed = Arc::clone(&completed);
            let handle = thread::Builder::new()
                .name(format!("ndv-worker-{index}"))
                .spawn(move || worker_loop(&rx, &completed))?;
            handles.push(handle);
        }
        debug!(threads, "worker pool started");
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            handles,
            submitted: AtomicUsize::new(0),
            completed,
        })
    }

    /// One worker per available core.
    pub fn with_available_parallelism() -> io::Result<Self> {
        let threads = thread::available_parallelism().map_or(1, |n| n.get());
        Self::new(threads)
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }

    /// Jobs accepted but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.submitted
            .load(Ordering::Acquire)
            .saturating_sub(self.completed.load(Ordering::Acquire))
    }

    /// Close the queue and join every worker once it drains.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender ends each worker's recv loop.
        drop(self.sender.lock().take());
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

impl Dispatcher for WorkerPool {
    fn submit(&self, job: Job, tag: &str) {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            warn!(tag, "job submitted after shutdown; dropped");
            return;
        };
        self.submitted.fetch_add(1, Ordering::AcqRel);
        if tx
            .send(Msg::Run {
                job,
                tag: tag.to_owned(),
            })
            .is_err()
        {
            self.completed.fetch_add(1, Ordering::AcqRel);
            warn!(tag, "worker pool channel closed; job dropped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.handles.len())
            .field("pending", &self.pending())
            .finish()
    }
}

fn worker_loop(rx: &Mutex<mpsc::Receiver<Msg>>, completed: &AtomicUsize) {
    loop {
        // Hold the receiver lock only while waiting for the next message.
        let msg = rx.lock().recv();
        match msg {
            Ok(Msg::Run { job, tag }) => {
                trace!(tag = %tag, "job start");
                if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
                    warn!(tag = %tag, "job panicked");
                }
                completed.fetch_add(1, Ordering::AcqRel);
            }
            Err(_) => break,
        }
    }
}
