//! Admission chain assembly (Sanitizer -> RateLimiter -> CircuitBreaker ->
//! Throttler -> handler), grounded on how the top-level `tower-resilience`
//! crate composes its pattern crates, adapted here into one struct rather
//! than a stack of generic `tower::Layer`s since the four stages have four
//! different call shapes (a validation check, a window check, a guarded
//! call, a queued job).

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};

use admission_circuitbreaker::CircuitBreaker;
use admission_context::{
    negotiate_version, request_id::resolve_request_id, RequestDescriptor, Rejection, VersionConfig,
    VersionOutcome,
};
use admission_core::{AdmissionError, ErrorKind, MetricsBus};
use admission_ratelimiter::{EndpointLimit, KeyInput, RateLimiter};
use admission_sanitizer::{Sanitizer, SanitizerInput};
use admission_throttler::{Outcome, Priority, Throttler};

use crate::config::GateConfig;
use crate::error::DownstreamError;

/// A unit of deferred work the throttler runs: the downstream call already
/// wrapped by its circuit breaker, reduced to "produce a `Response`".
pub type GateJob = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Priority is derived from the descriptor, not declared by the caller
/// (health/metrics still pass through the throttler, at `critical`
/// so monitoring never starves behind application traffic).
fn derive_priority(descriptor: &RequestDescriptor) -> Priority {
    if descriptor.internal {
        Priority::Critical
    } else {
        Priority::Normal
    }
}

fn breaker_service_name(descriptor: &RequestDescriptor) -> &str {
    if descriptor.internal {
        "internal"
    } else {
        "default"
    }
}

/// The assembled admission chain, shared (via `Arc`) across every connection.
pub struct AdmissionPipeline {
    sanitizer: Sanitizer,
    rate_limiter: RateLimiter,
    endpoint_limits: Vec<EndpointLimit>,
    breakers: HashMap<String, Arc<CircuitBreaker>>,
    throttler: Arc<Throttler<GateJob, Response, Infallible>>,
    version: VersionConfig,
    metrics: MetricsBus,
    rate_limit_janitor_interval: std::time::Duration,
}

impl AdmissionPipeline {
    pub fn new(config: GateConfig, metrics: MetricsBus) -> Self {
        let sanitizer = Sanitizer::new(config.sanitizer);
        let rate_limiter = RateLimiter::builder().build();

        let mut breakers = HashMap::new();
        for entry in config.service_breakers {
            breakers.insert(entry.name.clone(), Arc::new(CircuitBreaker::new(entry.config)));
        }
        breakers
            .entry("internal".to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(admission_circuitbreaker::CircuitBreakerConfig::builder("internal").build())));

        let throttler = Throttler::<GateJob, Response, Infallible>::builder(config.throttler)
            .build(|job: GateJob| async move { Ok::<_, Infallible>(job.await) });

        Self {
            sanitizer,
            rate_limiter,
            endpoint_limits: config.endpoint_limits,
            breakers,
            throttler,
            version: config.version,
            metrics,
            rate_limit_janitor_interval: config.rate_limit_janitor_interval,
        }
    }

    pub fn metrics(&self) -> &MetricsBus {
        &self.metrics
    }

    /// Runs forever, sweeping idle process-local rate-limit windows at the
    /// configured interval. Spawned once, from `main`, alongside the server.
    pub async fn run_rate_limit_janitor(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.rate_limit_janitor_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.rate_limiter.reap_idle();
        }
    }

    fn endpoint_limit(&self, endpoint_pattern: &str) -> Option<&EndpointLimit> {
        self.endpoint_limits
            .iter()
            .find(|limit| limit.endpoint_pattern == endpoint_pattern)
    }

    fn breaker_for(&self, descriptor: &RequestDescriptor) -> Arc<CircuitBreaker> {
        let name = breaker_service_name(descriptor);
        self.breakers
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.breakers.get("default").expect("a default breaker always exists").clone())
    }

    /// Runs the full chain for one request. `handler` is invoked at most
    /// once, from inside the throttler's worker pool, guarded by the
    /// matching service's circuit breaker.
    pub async fn admit<H, Fut>(
        &self,
        method: Method,
        raw_path: &str,
        headers: &HeaderMap,
        body: &[u8],
        handler: H,
    ) -> Response
    where
        H: FnOnce(Vec<u8>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Response, DownstreamError>> + Send + 'static,
    {
        let request_id = resolve_request_id(headers);
        let mut descriptor = RequestDescriptor::derive(method.clone(), raw_path, headers, request_id.clone());

        self.metrics.incr("admission_requests_total", 1);

        let header_names: Vec<&str> = headers.keys().map(|name| name.as_str()).collect();
        let content_type = headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let declared_len = headers
            .get(axum::http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .or(Some(body.len()));

        let sanitizer_input = SanitizerInput {
            method_is_get: method == Method::GET,
            declared_content_length: declared_len,
            content_type,
            header_names,
            path: &descriptor.endpoint_pattern,
            query_pairs: raw_path
                .split_once('?')
                .map(|(_, q)| parse_query_pairs(q))
                .unwrap_or_default(),
            body,
            request_id: &request_id,
            endpoint_pattern: &descriptor.endpoint_pattern,
        };

        let sanitized_body = match self.sanitizer.sanitize::<DownstreamError>(&sanitizer_input) {
            Ok(outcome) => {
                for threat in &outcome.threats {
                    self.metrics
                        .incr(&format!("admission_threats_total{{kind=\"{}\"}}", threat.kind.as_str()), 1);
                }
                descriptor.threats = outcome.threats;
                outcome.sanitized_body
            }
            Err(err) => {
                self.metrics.incr("admission_rejected_total{stage=\"sanitizer\"}", 1);
                return self.render_rejection(err, &request_id);
            }
        };

        match negotiate_version(&self.version, &descriptor.endpoint_pattern, headers) {
            VersionOutcome::Mismatch { declared, supported } => {
                self.metrics.incr("admission_rejected_total{stage=\"version\"}", 1);
                let err: AdmissionError<DownstreamError> = AdmissionError::rejected(
                    ErrorKind::VersionMismatch,
                    format!("client version '{declared}' is not in {supported:?}"),
                );
                return self.render_rejection(err, &request_id);
            }
            VersionOutcome::NotApplicable | VersionOutcome::Supported { .. } => {}
        }

        if let Some(limit) = self.endpoint_limit(&descriptor.endpoint_pattern) {
            if !limit.is_skipped(&descriptor.endpoint_pattern, method.as_str()) {
                let key_input = KeyInput {
                    remote_addr: descriptor.remote_addr.as_deref(),
                    user_id: descriptor.user_id.as_deref(),
                    session_id: descriptor.session_id.as_deref(),
                    client_id: descriptor.client_id.as_deref(),
                    custom_identifier: None,
                };
                if let Err(err) = self.rate_limiter.admit::<DownstreamError>(limit, &key_input).await {
                    self.metrics.incr("admission_rejected_total{stage=\"rate_limiter\"}", 1);
                    return self.render_rejection(err, &request_id);
                }
            }
        }

        let priority = derive_priority(&descriptor);
        let breaker = self.breaker_for(&descriptor);
        let request_id_for_job = request_id.clone();

        let job: GateJob = Box::pin(async move {
            match breaker.call(move || handler(sanitized_body)).await {
                Ok(response) => response,
                Err(err) => render_application_aware_rejection(err, &request_id_for_job),
            }
        });

        match self.throttler.enqueue(job, priority, None) {
            Ok((rx, _cancel)) => match rx.await {
                Ok(Outcome::Success(response)) => response,
                Ok(Outcome::Failed(_infallible)) => unreachable!("the throttler's handler never fails"),
                Ok(Outcome::Dropped) => {
                    self.metrics.incr("admission_rejected_total{stage=\"throttler\"}", 1);
                    self.render_rejection(
                        AdmissionError::<DownstreamError>::rejected(ErrorKind::QueueFull, "request dropped from the priority queue"),
                        &request_id,
                    )
                }
                Ok(Outcome::TimedOut) => self.render_rejection(
                    AdmissionError::<DownstreamError>::rejected(ErrorKind::RequestTimeout, "request timed out while queued"),
                    &request_id,
                ),
                Ok(Outcome::Cancelled) => self.render_rejection(
                    AdmissionError::<DownstreamError>::rejected(ErrorKind::RequestCancelled, "request was cancelled"),
                    &request_id,
                ),
                Ok(Outcome::Panicked) => self.render_rejection(
                    AdmissionError::<DownstreamError>::rejected(ErrorKind::Internal, "the request handler panicked"),
                    &request_id,
                ),
                Err(_recv_dropped) => self.render_rejection(
                    AdmissionError::<DownstreamError>::rejected(ErrorKind::Internal, "the worker pool dropped the result channel"),
                    &request_id,
                ),
            },
            Err(err) => {
                self.metrics.incr("admission_rejected_total{stage=\"throttler\"}", 1);
                self.render_rejection(err, &request_id)
            }
        }
    }

    fn render_rejection<E>(&self, err: AdmissionError<E>, request_id: &str) -> Response {
        Rejection::from_admission_error(&err, request_id)
            .map(IntoResponse::into_response)
            .unwrap_or_else(|| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

fn render_application_aware_rejection(err: AdmissionError<DownstreamError>, request_id: &str) -> Response {
    match Rejection::from_admission_error(&err, request_id) {
        Some(rejection) => rejection.into_response(),
        None => match err {
            AdmissionError::Application(downstream) => downstream.into_response(),
            AdmissionError::Rejected { .. } => unreachable!("Rejected always maps to Some(rejection)"),
        },
    }
}

fn parse_query_pairs(query: &str) -> Vec<(&str, &str)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect()
}
