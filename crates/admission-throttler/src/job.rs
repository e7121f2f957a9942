//! A single queued unit of work and its terminal outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::priority::Priority;

/// How a job finished, handed back to the enqueuer through a oneshot
/// channel. There is no refund for cancelled or dropped work: once a job
/// leaves the queue it does not re-enter, regardless of how it ends.
#[derive(Debug)]
pub enum Outcome<R, E> {
    Success(R),
    Failed(E),
    /// Evicted by a `DropOldest` policy, or rejected outright by
    /// `DropNewest`/`DropLowestPriority` before it ever queued.
    Dropped,
    /// Still queued, or running, past its deadline when a worker observed it.
    TimedOut,
    /// The caller invoked [`CancelHandle::cancel`] before a worker picked
    /// the job up.
    Cancelled,
    /// The handler future panicked; the panic was caught and did not bring
    /// down the worker.
    Panicked,
}

/// Lets a caller cancel a still-queued job. Has no effect once a worker has
/// started running the job.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

pub(crate) struct Job<T, R, E> {
    pub payload: T,
    pub priority: Priority,
    pub enqueued_at: Instant,
    pub deadline: Instant,
    pub cancelled: Arc<AtomicBool>,
    pub result_tx: oneshot::Sender<Outcome<R, E>>,
}

impl<T, R, E> Job<T, R, E> {
    pub fn new(payload: T, priority: Priority, timeout: Duration) -> (Self, oneshot::Receiver<Outcome<R, E>>, CancelHandle) {
        let (tx, rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let job = Job {
            payload,
            priority,
            enqueued_at: Instant::now(),
            deadline: Instant::now() + timeout,
            cancelled: Arc::clone(&cancelled),
            result_tx: tx,
        };
        (job, rx, CancelHandle { flag: cancelled })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn wait_time(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    pub fn complete(self, outcome: Outcome<R, E>) {
        let _ = self.result_tx.send(outcome);
    }
}
