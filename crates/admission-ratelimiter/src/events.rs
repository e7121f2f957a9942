//! Rate-limiter events, emitted through the same `EventListeners` machinery
//! every other stage uses, mirroring `RateLimiterEvent` +
//! `on_permit_acquired`/`on_permit_rejected` builder hooks.

use std::time::{Duration, Instant};

use admission_core::AdmissionEvent;

#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    Admitted {
        key: String,
        remaining: u64,
        timestamp: Instant,
    },
    Denied {
        key: String,
        retry_after: Duration,
        timestamp: Instant,
    },
    BackendError {
        backend: String,
        key: String,
        timestamp: Instant,
    },
}

impl RateLimiterEvent {
    fn ts(&self) -> Instant {
        match self {
            RateLimiterEvent::Admitted { timestamp, .. }
            | RateLimiterEvent::Denied { timestamp, .. }
            | RateLimiterEvent::BackendError { timestamp, .. } => *timestamp,
        }
    }
}

impl AdmissionEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::Admitted { .. } => "admitted",
            RateLimiterEvent::Denied { .. } => "denied",
            RateLimiterEvent::BackendError { .. } => "backend_error",
        }
    }

    fn timestamp(&self) -> Instant {
        self.ts()
    }

    fn stage_name(&self) -> &str {
        "rate_limiter"
    }
}
