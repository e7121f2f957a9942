//! Unified error type for the admission pipeline.
//!
//! Every stage's own error type converts into [`AdmissionError<E>`] so a
//! caller composing the full chain (sanitizer → rate limiter → circuit
//! breaker → throttler → handler) doesn't have to write a `From` impl per
//! stage, the same way `tower_resilience_core::ResilienceError` spares a
//! caller per-layer boilerplate.

use std::fmt;
use std::time::Duration;

/// Wire-level stable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    UnsupportedMediaType,
    VersionMismatch,
    RateLimitExceeded,
    CircuitOpen,
    QueueFull,
    RequestTimeout,
    RequestCancelled,
    Internal,
}

impl ErrorKind {
    /// The stable wire string used in the `error` field of the envelope.
    pub fn as_code(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "parse_error",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::UnsupportedMediaType => "unsupported_media_type",
            ErrorKind::VersionMismatch => "version_mismatch",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::CircuitOpen => "service_unavailable_circuit_open",
            ErrorKind::QueueFull => "service_unavailable_queue_full",
            ErrorKind::RequestTimeout => "request_timeout",
            ErrorKind::RequestCancelled => "request_cancelled",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// The `limit`/`remaining`/window fields a rate-limit denial carries for the
/// response envelope and `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    pub window: Duration,
}

/// A common error type that wraps every admission-stage error.
///
/// # Type Parameters
///
/// - `E`: the downstream business-handler error type.
#[derive(Debug, Clone)]
pub enum AdmissionError<E> {
    /// A stage-level rejection with a stable kind, human message, and
    /// optional structured details for the response envelope.
    Rejected {
        kind: ErrorKind,
        message: String,
        retry_after: Option<Duration>,
        /// Overrides the HTTP status normally implied by `kind`, for the
        /// handful of sanitizer checks (oversized body) that share a kind
        /// with another check but need a different status code.
        status_override: Option<u16>,
        /// Populated only for `RateLimitExceeded` rejections.
        rate_limit: Option<RateLimitInfo>,
    },

    /// The underlying business handler returned an error.
    Application(E),
}

impl<E> AdmissionError<E> {
    pub fn rejected(kind: ErrorKind, message: impl Into<String>) -> Self {
        AdmissionError::Rejected {
            kind,
            message: message.into(),
            retry_after: None,
            status_override: None,
            rate_limit: None,
        }
    }

    pub fn rejected_with_retry(
        kind: ErrorKind,
        message: impl Into<String>,
        retry_after: Duration,
    ) -> Self {
        AdmissionError::Rejected {
            kind,
            message: message.into(),
            retry_after: Some(retry_after),
            status_override: None,
            rate_limit: None,
        }
    }

    pub fn rejected_with_status(
        kind: ErrorKind,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        AdmissionError::Rejected {
            kind,
            message: message.into(),
            retry_after: None,
            status_override: Some(status),
            rate_limit: None,
        }
    }

    /// Builds a `RateLimitExceeded` rejection carrying the limit/remaining/
    /// window detail the response envelope and `X-RateLimit-*` headers need.
    pub fn rate_limited(message: impl Into<String>, retry_after: Duration, rate_limit: RateLimitInfo) -> Self {
        AdmissionError::Rejected {
            kind: ErrorKind::RateLimitExceeded,
            message: message.into(),
            retry_after: Some(retry_after),
            status_override: None,
            rate_limit: Some(rate_limit),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AdmissionError::Rejected {
                kind: ErrorKind::RequestTimeout,
                ..
            }
        )
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(
            self,
            AdmissionError::Rejected {
                kind: ErrorKind::CircuitOpen,
                ..
            }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            AdmissionError::Rejected {
                kind: ErrorKind::RateLimitExceeded,
                ..
            }
        )
    }

    pub fn is_application(&self) -> bool {
        matches!(self, AdmissionError::Application(_))
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AdmissionError::Rejected { kind, .. } => Some(*kind),
            AdmissionError::Application(_) => None,
        }
    }

    pub fn application_error(self) -> Option<E> {
        match self {
            AdmissionError::Application(e) => Some(e),
            _ => None,
        }
    }

    pub fn map_application<F, T>(self, f: F) -> AdmissionError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            AdmissionError::Rejected {
                kind,
                message,
                retry_after,
                status_override,
                rate_limit,
            } => AdmissionError::Rejected {
                kind,
                message,
                retry_after,
                status_override,
                rate_limit,
            },
            AdmissionError::Application(e) => AdmissionError::Application(f(e)),
        }
    }
}

impl<E> fmt::Display for AdmissionError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::Rejected { kind, message, .. } => {
                write!(f, "{}: {}", kind.as_code(), message)
            }
            AdmissionError::Application(e) => write!(f, "application error: {}", e),
        }
    }
}

impl<E> std::error::Error for AdmissionError<E> where E: std::error::Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct TestError;

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error")
        }
    }

    impl std::error::Error for TestError {}

    const _: () = {
        const fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<AdmissionError<TestError>>();
    };

    #[test]
    fn rejected_carries_the_stable_wire_code() {
        let err: AdmissionError<TestError> =
            AdmissionError::rejected(ErrorKind::RateLimitExceeded, "too fast");
        assert_eq!(err.kind().unwrap().as_code(), "rate_limit_exceeded");
        assert!(err.is_rate_limited());
    }

    #[test]
    fn application_error_round_trips() {
        let err: AdmissionError<TestError> = AdmissionError::Application(TestError);
        assert!(err.is_application());
        assert!(err.application_error().is_some());
    }
}
