//! Throttler events, mirroring
//! `BulkheadEvent::CallPermitted`/`CallRejected`, extended with queue-depth
//! and drop bookkeeping the bulkhead has no notion of.

use std::time::Instant;

use admission_core::AdmissionEvent;

use crate::priority::Priority;

#[derive(Debug, Clone)]
pub enum ThrottlerEvent {
    Enqueued {
        priority: Priority,
        queue_depth: usize,
        timestamp: Instant,
    },
    Dequeued {
        priority: Priority,
        wait_time: std::time::Duration,
        timestamp: Instant,
    },
    Dropped {
        priority: Priority,
        timestamp: Instant,
    },
    TimedOut {
        priority: Priority,
        timestamp: Instant,
    },
    Cancelled {
        priority: Priority,
        timestamp: Instant,
    },
    WorkerPanicked {
        priority: Priority,
        timestamp: Instant,
    },
}

impl ThrottlerEvent {
    fn ts(&self) -> Instant {
        match self {
            ThrottlerEvent::Enqueued { timestamp, .. }
            | ThrottlerEvent::Dequeued { timestamp, .. }
            | ThrottlerEvent::Dropped { timestamp, .. }
            | ThrottlerEvent::TimedOut { timestamp, .. }
            | ThrottlerEvent::Cancelled { timestamp, .. }
            | ThrottlerEvent::WorkerPanicked { timestamp, .. } => *timestamp,
        }
    }

    fn priority(&self) -> Priority {
        match self {
            ThrottlerEvent::Enqueued { priority, .. }
            | ThrottlerEvent::Dequeued { priority, .. }
            | ThrottlerEvent::Dropped { priority, .. }
            | ThrottlerEvent::TimedOut { priority, .. }
            | ThrottlerEvent::Cancelled { priority, .. }
            | ThrottlerEvent::WorkerPanicked { priority, .. } => *priority,
        }
    }
}

impl AdmissionEvent for ThrottlerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ThrottlerEvent::Enqueued { .. } => "enqueued",
            ThrottlerEvent::Dequeued { .. } => "dequeued",
            ThrottlerEvent::Dropped { .. } => "dropped",
            ThrottlerEvent::TimedOut { .. } => "timed_out",
            ThrottlerEvent::Cancelled { .. } => "cancelled",
            ThrottlerEvent::WorkerPanicked { .. } => "worker_panicked",
        }
    }

    fn timestamp(&self) -> Instant {
        self.ts()
    }

    fn stage_name(&self) -> &str {
        self.priority().as_str()
    }
}
