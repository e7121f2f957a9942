//! Distributed-capable sliding-window rate limiting with an in-process
//! fallback: endpoint configuration, scope-based key
//! derivation, window accounting, and pluggable backends.

pub mod backend;
pub mod endpoint;
pub mod events;
pub mod key;
pub mod limiter;
pub mod window;

pub use backend::{BackendError, Decision, InMemoryBackend, NoopBackend, RateLimitBackend};
pub use endpoint::{EndpointLimit, EndpointLimitBuilder, Scope};
pub use events::RateLimiterEvent;
pub use key::{derive_key, KeyInput};
pub use limiter::{RateLimiter, RateLimiterConfigBuilder};
pub use window::WindowStore;
