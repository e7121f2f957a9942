//! Circuit breaker events, mirroring
//! `CircuitBreakerEvent::StateTransition`/`CallPermitted`/`CallRejected`.

use std::time::Instant;

use admission_core::AdmissionEvent;

use crate::circuit::CircuitState;

#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    StateTransition {
        service: String,
        from: CircuitState,
        to: CircuitState,
        timestamp: Instant,
    },
    CallPermitted {
        service: String,
        state: CircuitState,
        timestamp: Instant,
    },
    CallRejected {
        service: String,
        timestamp: Instant,
    },
}

impl CircuitBreakerEvent {
    fn ts(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. } => *timestamp,
        }
    }

    fn service(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { service, .. }
            | CircuitBreakerEvent::CallPermitted { service, .. }
            | CircuitBreakerEvent::CallRejected { service, .. } => service,
        }
    }
}

impl AdmissionEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        self.ts()
    }

    fn stage_name(&self) -> &str {
        self.service()
    }
}
