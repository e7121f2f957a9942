//! Shared primitives for the admission pipeline: a unified error type, an
//! event system every stage plugs into, and a passive metrics bus.
//!
//! Mirrors the role `tower_resilience_core` plays for the `tower-resilience`
//! pattern crates — a small dependency-free crate the stage crates all
//! depend on so they don't repeat the same boilerplate.

pub mod error;
pub mod events;
pub mod metrics;

pub use error::{AdmissionError, ErrorKind, RateLimitInfo};
pub use events::{AdmissionEvent, EventListener, EventListeners, FnListener};
pub use metrics::{MetricsBus, MetricsSnapshot};
