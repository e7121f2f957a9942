//! The circuit state machine, grounded on
//! `tower_resilience_circuitbreaker::circuit::Circuit`: a mutex-guarded
//! authoritative state plus an atomic mirror so a caller can read the
//! current state synchronously without awaiting the lock.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use admission_core::{AdmissionError, ErrorKind, EventListener, EventListeners};

use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;

/// closed -> open -> half-open -> {closed | open}, monotonic through the
/// cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

struct Inner {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    trip_count: u32,
    opened_at: Option<Instant>,
    half_open_inflight: usize,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            trip_count: 0,
            opened_at: None,
            half_open_inflight: 0,
        }
    }
}

/// Per-downstream-service circuit breaker.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    state_atomic: Arc<AtomicU8>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new()),
            state_atomic: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            event_listeners: EventListeners::new(),
        }
    }

    pub fn on_event<L>(&mut self, listener: L)
    where
        L: EventListener<CircuitBreakerEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Reads the current state without awaiting the lock.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Wraps a downstream call: checks admission, runs `f` under the
    /// configured request timeout, and records the outcome. A timeout is
    /// recorded as a failure and surfaced with `kind = request_timeout`.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, AdmissionError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.try_acquire().await {
            return Err(AdmissionError::rejected(
                ErrorKind::CircuitOpen,
                format!("circuit for '{}' is open", self.config.name),
            ));
        }

        match tokio::time::timeout(self.config.request_timeout, f()).await {
            Ok(Ok(value)) => {
                self.record_success().await;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure().await;
                Err(AdmissionError::Application(err))
            }
            Err(_elapsed) => {
                self.record_failure().await;
                Err(AdmissionError::rejected(
                    ErrorKind::RequestTimeout,
                    format!("call to '{}' timed out", self.config.name),
                ))
            }
        }
    }

    async fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                self.emit(CircuitBreakerEvent::CallPermitted {
                    service: self.config.name.clone(),
                    state: inner.state,
                    timestamp: Instant::now(),
                });
                true
            }
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.config.compute_backoff(inner.trip_count) {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_inflight = 1;
                    self.emit(CircuitBreakerEvent::CallPermitted {
                        service: self.config.name.clone(),
                        state: inner.state,
                        timestamp: Instant::now(),
                    });
                    true
                } else {
                    self.emit(CircuitBreakerEvent::CallRejected {
                        service: self.config.name.clone(),
                        timestamp: Instant::now(),
                    });
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_inflight < self.config.half_open_probe_cap {
                    inner.half_open_inflight += 1;
                    self.emit(CircuitBreakerEvent::CallPermitted {
                        service: self.config.name.clone(),
                        state: inner.state,
                        timestamp: Instant::now(),
                    });
                    true
                } else {
                    self.emit(CircuitBreakerEvent::CallRejected {
                        service: self.config.name.clone(),
                        timestamp: Instant::now(),
                    });
                    false
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;
        self.state_atomic.store(to as u8, Ordering::Release);

        match to {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.trip_count = 0;
                inner.opened_at = None;
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                inner.trip_count += 1;
                inner.success_count = 0;
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                inner.failure_count = 0;
            }
        }

        self.emit(CircuitBreakerEvent::StateTransition {
            service: self.config.name.clone(),
            from,
            to,
            timestamp: Instant::now(),
        });
    }

    fn emit(&self, event: CircuitBreakerEvent) {
        if !self.event_listeners.is_empty() {
            self.event_listeners.emit(&event);
        }
    }
}
