//! Pluggable rate-limit backends: distributed-capable primary with an
//! in-process fallback.
//!
//! [`RateLimitBackend`] generalizes a single in-process
//! `SharedRateLimiter` into a trait object so a real distributed backend
//! (Redis, a sidecar) can stand in as the primary, with [`InMemoryBackend`]
//! always available as the fallback.

use std::time::Duration;

use async_trait::async_trait;

use crate::window::{WindowDecision, WindowStore};

/// A decision returned by a backend: allow/deny plus the bookkeeping
/// fields the response stage needs.
#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

impl From<WindowDecision> for Decision {
    fn from(d: WindowDecision) -> Self {
        Self {
            allowed: d.allowed,
            limit: d.limit,
            remaining: d.remaining,
            reset_after: d.reset_after,
        }
    }
}

/// A backend capable of making a rate-limit admission decision for a key.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    async fn check(&self, key: &str, limit: u64, window: Duration, burst_limit: u64) -> Result<Decision, BackendError>;

    fn name(&self) -> &str;
}

/// The error a backend reports when it cannot make a decision (e.g. a
/// distributed backend that is unreachable). Never returned by
/// [`InMemoryBackend`] — it is used as the fallback precisely because it
/// cannot itself fail this way.
#[derive(Debug, Clone, thiserror::Error)]
#[error("rate-limit backend '{backend}' is unavailable: {reason}")]
pub struct BackendError {
    pub backend: String,
    pub reason: String,
}

/// The default, always-available backend: an in-process sliding-window
/// store. Used both as the fallback behind a distributed primary and, by
/// itself, as the sole backend when no distributed primary is configured.
pub struct InMemoryBackend {
    store: WindowStore,
    name: String,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            store: WindowStore::new(),
            name: "in_memory".to_string(),
        }
    }

    pub fn reap_idle(&self) {
        self.store.reap_idle();
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitBackend for InMemoryBackend {
    async fn check(&self, key: &str, limit: u64, window: Duration, burst_limit: u64) -> Result<Decision, BackendError> {
        Ok(self.store.try_admit(key, limit, window, burst_limit).into())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A backend that always fails, used in tests to exercise the
/// primary-fails-falls-back-to-in-process path.
pub struct NoopBackend;

#[async_trait]
impl RateLimitBackend for NoopBackend {
    async fn check(&self, _key: &str, _limit: u64, _window: Duration, _burst_limit: u64) -> Result<Decision, BackendError> {
        Err(BackendError {
            backend: "noop".to_string(),
            reason: "always unavailable".to_string(),
        })
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_backend_admits_within_capacity() {
        let backend = InMemoryBackend::new();
        let decision = backend.check("k", 5, Duration::from_secs(1), 0).await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn noop_backend_always_errors() {
        let backend = NoopBackend;
        let result = backend.check("k", 5, Duration::from_secs(1), 0).await;
        assert!(result.is_err());
    }
}
