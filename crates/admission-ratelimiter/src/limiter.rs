//! Rate limiter orchestration: endpoint-limit lookup, scope
//! bypass rules, primary-backend-with-fallback, and the admission decision.

use std::sync::Arc;
use std::time::Instant;

use admission_core::{AdmissionError, EventListener, EventListeners, RateLimitInfo};

use crate::backend::{InMemoryBackend, RateLimitBackend};
use crate::endpoint::EndpointLimit;
use crate::events::RateLimiterEvent;
use crate::key::{derive_key, identifier_for, KeyInput};

#[cfg(feature = "metrics")]
use admission_core::MetricsBus;

pub struct RateLimiterConfigBuilder {
    primary: Option<Arc<dyn RateLimitBackend>>,
    event_listeners: EventListeners<RateLimiterEvent>,
    #[cfg(feature = "metrics")]
    metrics: Option<MetricsBus>,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self {
            primary: None,
            event_listeners: EventListeners::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }
}

impl RateLimiterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the primary backend. If unset, the in-process fallback also
    /// serves as the sole backend.
    pub fn primary_backend(mut self, backend: Arc<dyn RateLimitBackend>) -> Self {
        self.primary = Some(backend);
        self
    }

    pub fn on_denied<F>(mut self, f: F) -> Self
    where
        F: Fn(&RateLimiterEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(admission_core::FnListener::new(move |event: &RateLimiterEvent| {
            if matches!(event, RateLimiterEvent::Denied { .. }) {
                f(event);
            }
        }));
        self
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(mut self, metrics: MetricsBus) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> RateLimiter {
        RateLimiter {
            primary: self.primary,
            fallback: InMemoryBackend::new(),
            event_listeners: self.event_listeners,
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        }
    }
}

/// The rate limiter stage: derives a key per the configured [`EndpointLimit`]
/// scope, consults the primary backend, and falls back to the in-process
/// backend on primary failure.
pub struct RateLimiter {
    primary: Option<Arc<dyn RateLimitBackend>>,
    fallback: InMemoryBackend,
    event_listeners: EventListeners<RateLimiterEvent>,
    #[cfg(feature = "metrics")]
    metrics: Option<MetricsBus>,
}

impl RateLimiter {
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    pub fn on_event<L>(&mut self, listener: L)
    where
        L: EventListener<RateLimiterEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    pub fn reap_idle(&self) {
        self.fallback.reap_idle();
    }

    /// Runs the full admission check for one request against `limit`.
    /// Returns `Ok(remaining)` on admission or
    /// `Err(AdmissionError::rejected(RateLimitExceeded,..))` on denial.
    pub async fn admit<E>(&self, limit: &EndpointLimit, key_input: &KeyInput<'_>) -> Result<u64, AdmissionError<E>> {
        let identifier = identifier_for(limit.scope, key_input);
        if limit.is_exempt(&identifier) {
            return Ok(limit.max_requests);
        }

        let key = derive_key(&limit.endpoint_pattern, limit.scope, key_input);

        let decision = match &self.primary {
            Some(primary) => match primary.check(&key, limit.max_requests, limit.window, limit.burst_limit).await {
                Ok(decision) => decision,
                Err(_err) => {
                    self.emit(RateLimiterEvent::BackendError {
                        backend: primary.name().to_string(),
                        key: key.clone(),
                        timestamp: Instant::now(),
                    });
                    #[cfg(feature = "metrics")]
                    if let Some(metrics) = &self.metrics {
                        metrics.incr(&format!("admission_ratelimit_backend_errors_total{{backend=\"{}\"}}", primary.name()), 1);
                    }
                    self.fallback
                        .check(&key, limit.max_requests, limit.window, limit.burst_limit)
                        .await
                        .expect("in-memory backend never errors")
                }
            },
            None => self
                .fallback
                .check(&key, limit.max_requests, limit.window, limit.burst_limit)
                .await
                .expect("in-memory backend never errors"),
        };

        if decision.allowed {
            self.emit(RateLimiterEvent::Admitted {
                key,
                remaining: decision.remaining,
                timestamp: Instant::now(),
            });
            Ok(decision.remaining)
        } else {
            self.emit(RateLimiterEvent::Denied {
                key,
                retry_after: decision.reset_after,
                timestamp: Instant::now(),
            });
            Err(AdmissionError::rate_limited(
                "rate limit exceeded",
                decision.reset_after,
                RateLimitInfo {
                    limit: decision.limit,
                    remaining: decision.remaining,
                    window: limit.window,
                },
            ))
        }
    }

    fn emit(&self, event: RateLimiterEvent) {
        if !self.event_listeners.is_empty() {
            self.event_listeners.emit(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NoopBackend;
    use crate::endpoint::{EndpointLimit, Scope};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key_input<'a>() -> KeyInput<'a> {
        KeyInput {
            remote_addr: Some("1.2.3.4"),
            user_id: None,
            session_id: None,
            client_id: None,
            custom_identifier: None,
        }
    }

    #[tokio::test]
    async fn admits_within_capacity_and_denies_beyond_it() {
        let limiter = RateLimiter::builder().build();
        let limit = EndpointLimit::builder("/api/v1/x")
            .max_requests(2)
            .window(Duration::from_secs(1))
            .burst_limit(0)
            .scope(Scope::PerIp)
            .build();

        assert!(limiter.admit::<Infallible>(&limit, &key_input()).await.is_ok());
        assert!(limiter.admit::<Infallible>(&limit, &key_input()).await.is_ok());
        let err = limiter.admit::<Infallible>(&limit, &key_input()).await.unwrap_err();
        assert!(err.is_rate_limited());
        match err {
            admission_core::AdmissionError::Rejected { rate_limit, .. } => {
                let info = rate_limit.expect("a rate-limited rejection carries its limit/remaining/window");
                assert_eq!(info.limit, 2);
                assert_eq!(info.window, Duration::from_secs(1));
            }
            _ => panic!("expected a rejection"),
        }
    }

    #[tokio::test]
    async fn falls_back_to_in_process_when_primary_errors() {
        let limiter = RateLimiter::builder().primary_backend(Arc::new(NoopBackend)).build();
        let limit = EndpointLimit::builder("/api/v1/x")
            .max_requests(1)
            .window(Duration::from_secs(1))
            .burst_limit(0)
            .build();

        assert!(limiter.admit::<Infallible>(&limit, &key_input()).await.is_ok());
        let err = limiter.admit::<Infallible>(&limit, &key_input()).await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn exempt_identifiers_bypass_the_window() {
        let limiter = RateLimiter::builder().build();
        let limit = EndpointLimit::builder("/api/v1/x")
            .max_requests(1)
            .scope(Scope::PerIp)
            .exempt("1.2.3.4")
            .build();

        for _ in 0..5 {
            assert!(limiter.admit::<Infallible>(&limit, &key_input()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn denial_invokes_the_on_denied_listener() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let mut limiter = RateLimiter::builder().build();
        limiter.on_event(admission_core::FnListener::new(move |event: &RateLimiterEvent| {
            if matches!(event, RateLimiterEvent::Denied { .. }) {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let limit = EndpointLimit::builder("/api/v1/x").max_requests(1).build();
        let _ = limiter.admit::<Infallible>(&limit, &key_input()).await;
        let _ = limiter.admit::<Infallible>(&limit, &key_input()).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
