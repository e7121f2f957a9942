//! The throttler stage: four priority lanes drained by a fixed
//! worker pool in strict priority order, grounded on
//! `tower_resilience_bulkhead::service::Bulkhead`'s permit-acquisition loop
//! generalized from one semaphore to priority-keyed bounded queues.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use admission_core::{AdmissionError, ErrorKind, EventListener, EventListeners};

use crate::config::{DropPolicy, ThrottlerConfig};
use crate::events::ThrottlerEvent;
use crate::job::{CancelHandle, Job, Outcome};
use crate::priority::Priority;
use crate::queue::Lanes;

type HandlerFn<T, R, E> =
    Arc<dyn Fn(T) -> Pin<Box<dyn Future<Output = Result<R, E>> + Send>> + Send + Sync>;

pub struct ThrottlerBuilder<T, R, E> {
    config: ThrottlerConfig,
    event_listeners: EventListeners<ThrottlerEvent>,
    _marker: std::marker::PhantomData<fn() -> (T, R, E)>,
}

impl<T, R, E> ThrottlerBuilder<T, R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    pub fn new(config: ThrottlerConfig) -> Self {
        Self {
            config,
            event_listeners: EventListeners::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<ThrottlerEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Builds the throttler and spawns its worker pool. `handler` runs on a
    /// worker task for every admitted job.
    pub fn build<H, Fut>(self, handler: H) -> Arc<Throttler<T, R, E>>
    where
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let handler: HandlerFn<T, R, E> = Arc::new(move |payload| Box::pin(handler(payload)));
        let config = self.config;
        let lanes = Arc::new(Lanes::new(config.queue_capacity));
        let running = Arc::new(AtomicBool::new(true));
        let event_listeners = Arc::new(self.event_listeners);

        let mut workers = Vec::with_capacity(config.worker_count);
        for _ in 0..config.worker_count {
            workers.push(spawn_worker(
                Arc::clone(&lanes),
                Arc::clone(&running),
                Arc::clone(&handler),
                Arc::clone(&event_listeners),
                config.empty_poll_backoff,
            ));
        }

        Arc::new(Throttler {
            config,
            lanes,
            running,
            event_listeners,
            workers: std::sync::Mutex::new(workers),
        })
    }
}

pub struct Throttler<T, R, E> {
    config: ThrottlerConfig,
    lanes: Arc<Lanes<T, R, E>>,
    running: Arc<AtomicBool>,
    event_listeners: Arc<EventListeners<ThrottlerEvent>>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<T, R, E> Throttler<T, R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    pub fn builder(config: ThrottlerConfig) -> ThrottlerBuilder<T, R, E> {
        ThrottlerBuilder::new(config)
    }

    /// Queues `payload` at `priority`. Returns a receiver for the terminal
    /// [`Outcome`] and a handle that can cancel the job while it's still
    /// queued. Rejects with `queue_full` when the lane is at capacity and
    /// the drop policy is `DropNewest`/`DropLowestPriority`.
    pub fn enqueue(
        &self,
        payload: T,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<(tokio::sync::oneshot::Receiver<Outcome<R, E>>, CancelHandle), AdmissionError<E>> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);

        if self.lanes.is_full(priority) {
            match self.config.drop_policy {
                DropPolicy::DropNewest | DropPolicy::DropLowestPriority => {
                    self.emit(ThrottlerEvent::Dropped {
                        priority,
                        timestamp: Instant::now(),
                    });
                    return Err(AdmissionError::rejected_with_retry(
                        ErrorKind::QueueFull,
                        format!("'{}' priority queue is full", priority.as_str()),
                        Duration::from_millis(250),
                    ));
                }
                DropPolicy::DropOldest => {
                    if let Some(evicted) = self.lanes.evict_oldest(priority) {
                        self.emit(ThrottlerEvent::Dropped {
                            priority,
                            timestamp: Instant::now(),
                        });
                        evicted.complete(Outcome::Dropped);
                    }
                }
            }
        }

        let (job, rx, cancel) = Job::new(payload, priority, timeout);
        self.lanes.push(job);
        self.emit(ThrottlerEvent::Enqueued {
            priority,
            queue_depth: self.lanes.depth(priority),
            timestamp: Instant::now(),
        });
        Ok((rx, cancel))
    }

    pub fn queue_depth(&self, priority: Priority) -> usize {
        self.lanes.depth(priority)
    }

    pub fn total_queue_depth(&self) -> usize {
        self.lanes.total_depth()
    }

    /// Stops accepting new work for the worker pool's purposes and waits
    /// for every already-queued job to finish (or the wait to be interrupted
    /// by dropping the future).
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.lanes.notify.notify_waiters();
        let handles = std::mem::take(&mut *self.workers.lock().expect("worker list mutex poisoned"));
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn emit(&self, event: ThrottlerEvent) {
        if !self.event_listeners.is_empty() {
            self.event_listeners.emit(&event);
        }
    }
}

fn spawn_worker<T, R, E>(
    lanes: Arc<Lanes<T, R, E>>,
    running: Arc<AtomicBool>,
    handler: HandlerFn<T, R, E>,
    listeners: Arc<EventListeners<ThrottlerEvent>>,
    empty_poll_backoff: Duration,
) -> JoinHandle<()>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match lanes.pop_highest() {
                Some(job) => process_job(job, Arc::clone(&handler), &listeners).await,
                None => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    let _ = tokio::time::timeout(empty_poll_backoff, lanes.notify.notified()).await;
                }
            }
        }
    })
}

async fn process_job<T, R, E>(job: Job<T, R, E>, handler: HandlerFn<T, R, E>, listeners: &EventListeners<ThrottlerEvent>)
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    let priority = job.priority;

    if job.is_cancelled() {
        job.complete(Outcome::Cancelled);
        emit(listeners, ThrottlerEvent::Cancelled { priority, timestamp: Instant::now() });
        return;
    }
    if job.is_expired(Instant::now()) {
        job.complete(Outcome::TimedOut);
        emit(listeners, ThrottlerEvent::TimedOut { priority, timestamp: Instant::now() });
        return;
    }

    let wait_time = job.wait_time();
    emit(listeners, ThrottlerEvent::Dequeued { priority, wait_time, timestamp: Instant::now() });

    let remaining = job.deadline.saturating_duration_since(Instant::now());
    let payload = job.payload;
    let result_tx = job.result_tx;

    let join = tokio::spawn(async move { handler(payload).await });

    let outcome = match tokio::time::timeout(remaining, join).await {
        Ok(Ok(Ok(value))) => Outcome::Success(value),
        Ok(Ok(Err(err))) => Outcome::Failed(err),
        Ok(Err(join_err)) if join_err.is_panic() => Outcome::Panicked,
        Ok(Err(_aborted)) => Outcome::Cancelled,
        Err(_elapsed) => Outcome::TimedOut,
    };

    if matches!(outcome, Outcome::Panicked) {
        emit(listeners, ThrottlerEvent::WorkerPanicked { priority, timestamp: Instant::now() });
    }
    let _ = result_tx.send(outcome);
}

fn emit(listeners: &EventListeners<ThrottlerEvent>, event: ThrottlerEvent) {
    if !listeners.is_empty() {
        listeners.emit(&event);
    }
}
