//! Per-service circuit breaker with adaptive backoff: a
//! closed/open/half-open state machine with a count-based failure window,
//! a lock-free atomic state mirror, and configurable backoff strategies.

pub mod circuit;
pub mod config;
pub mod events;

pub use circuit::{CircuitBreaker, CircuitState};
pub use config::{BackoffStrategy, CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
