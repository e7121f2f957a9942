//! Response envelope shaping.
//!
//! Every rejection the pipeline produces renders to the same stable
//! `{error, message, details?, request_id}` envelope, plus whatever headers
//! the rejecting stage calls for (`Retry-After`, `X-RateLimit-*`). The shape
//! mirrors the rejection-to-response pattern other admission-control code in
//! this pack uses — one rejection type, one `IntoResponse` impl.

use std::time::Duration;

use admission_core::{AdmissionError, ErrorKind, RateLimitInfo};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Extended, error-kind-specific fields folded into the envelope's
/// `details` object.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// The stable wire-level rejection envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    pub request_id: String,
}

/// A fully-resolved rejection, ready to become an HTTP response: the stable
/// envelope plus any headers the rejecting stage wants to attach.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub status: StatusCode,
    pub envelope: ErrorEnvelope,
    pub retry_after: Option<Duration>,
    pub rate_limit_headers: Option<RateLimitHeaders>,
}

/// `X-RateLimit-*` headers emitted alongside a 429.
#[derive(Debug, Clone)]
pub struct RateLimitHeaders {
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_ms: u64,
    pub window_secs: u64,
}

impl Rejection {
    pub fn new(status: StatusCode, request_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            envelope: ErrorEnvelope {
                error: kind.as_code(),
                message: message.into(),
                details: None,
                request_id: request_id.into(),
            },
            retry_after: None,
            rate_limit_headers: None,
        }
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.envelope.details = Some(details);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_rate_limit_headers(mut self, headers: RateLimitHeaders) -> Self {
        self.rate_limit_headers = Some(headers);
        self
    }

    /// Builds a [`Rejection`] from an [`AdmissionError`]'s stage-level
    /// rejection variant, mapping the appropriate status code per.
    /// Returns `None` for `AdmissionError::Application` — that variant is
    /// the downstream handler's concern, not ours.
    pub fn from_admission_error<E>(err: &AdmissionError<E>, request_id: impl Into<String>) -> Option<Self> {
        let AdmissionError::Rejected {
            kind,
            message,
            retry_after,
            status_override,
            rate_limit,
        } = err
        else {
            return None;
        };

        let status = status_override
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or_else(|| status_for(*kind));
        let mut rejection = Self::new(status, request_id, *kind, message.clone());
        if let Some(retry_after) = retry_after {
            rejection = rejection.with_retry_after(*retry_after);
        }
        if let Some(info) = rate_limit {
            let reset_at_ms = retry_after
                .map(|wait| reset_at_ms_from_now(wait))
                .unwrap_or(0);
            rejection = rejection
                .with_details(ErrorDetails {
                    limit: Some(info.limit),
                    remaining: Some(info.remaining),
                    reset_at_ms: Some(reset_at_ms),
                    ..Default::default()
                })
                .with_rate_limit_headers(RateLimitHeaders {
                    limit: info.limit,
                    remaining: info.remaining,
                    reset_at_ms,
                    window_secs: info.window.as_secs(),
                });
        }
        Some(rejection)
    }
}

fn reset_at_ms_from_now(wait: Duration) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .checked_add(wait)
        .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ParseError => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::VersionMismatch => StatusCode::BAD_REQUEST,
        ErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::RequestCancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const X_RATELIMIT_WINDOW: HeaderName = HeaderName::from_static("x-ratelimit-window");

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let request_id = self.envelope.request_id.clone();
        let body = serde_json::to_vec(&self.envelope).unwrap_or_default();

        let mut response = Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(
            X_REQUEST_ID,
            HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("invalid")),
        );

        if let Some(retry_after) = self.retry_after {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response = response.header(header::RETRY_AFTER, value);
            }
        }

        if let Some(rl) = self.rate_limit_headers {
            response = response
                .header(X_RATELIMIT_LIMIT, HeaderValue::from(rl.limit))
                .header(X_RATELIMIT_REMAINING, HeaderValue::from(rl.remaining))
                .header(X_RATELIMIT_RESET, HeaderValue::from(rl.reset_at_ms))
                .header(X_RATELIMIT_WINDOW, HeaderValue::from(rl.window_secs));
        }

        response
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}
