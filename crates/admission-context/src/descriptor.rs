//! Request descriptor derivation.
//!
//! Everything the rest of the pipeline needs about an inbound request is
//! derived exactly once, here, at ingress — remote address, normalized
//! endpoint pattern, method, the caller's user/session/client identifiers,
//! user-agent, and the "internal" flag.

use http::{HeaderMap, Method};

use crate::threat::ThreatRecord;

/// Header names the pipeline reads from the inbound request.
pub mod headers {
    pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
    pub const X_REAL_IP: &str = "x-real-ip";
    pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";
    pub const X_CLIENT_VERSION: &str = "x-client-version";
    pub const X_CLI_VERSION: &str = "x-cli-version";
    pub const USER_AGENT: &str = "user-agent";
    pub const X_REQUEST_ID: &str = "x-request-id";
    pub const X_USER_ID: &str = "x-user-id";
    pub const X_SESSION_ID: &str = "x-session-id";
    pub const X_CLIENT_ID: &str = "x-client-id";
    pub const X_INTERNAL_SERVICE: &str = "x-internal-service";
    pub const X_SERVICE_MESH: &str = "x-service-mesh";
}

/// Health/liveness paths that are always treated as internal.
const INTERNAL_PATHS: &[&str] = &["/health", "/metrics"];

/// Everything derived about an inbound request at ingress.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub remote_addr: Option<String>,
    pub endpoint_pattern: String,
    pub method: Method,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub user_agent: Option<String>,
    pub internal: bool,
    pub request_id: String,
    /// Threats the sanitizer recorded for this request, attached once the
    /// sanitizer stage runs. Empty until then.
    pub threats: Vec<ThreatRecord>,
}

impl RequestDescriptor {
    /// Derives a descriptor from the inbound method, raw path, and headers.
    ///
    /// `request_id` should already reflect reuse-or-generate logic (see
    /// [`crate::request_id::resolve_request_id`]).
    pub fn derive(method: Method, raw_path: &str, headers: &HeaderMap, request_id: String) -> Self {
        let remote_addr = extract_remote_addr(headers);
        let endpoint_pattern = normalize_path(raw_path);
        let user_id = header_str(headers, headers_name(headers::X_USER_ID));
        let session_id = header_str(headers, headers_name(headers::X_SESSION_ID));
        let client_id = header_str(headers, headers_name(headers::X_CLIENT_ID));
        let user_agent = header_str(headers, headers_name(headers::USER_AGENT));

        let internal = INTERNAL_PATHS.contains(&endpoint_pattern.as_str())
            || header_str(headers, headers_name(headers::X_INTERNAL_SERVICE)).is_some()
            || header_str(headers, headers_name(headers::X_SERVICE_MESH)).is_some();

        Self {
            remote_addr,
            endpoint_pattern,
            method,
            user_id,
            session_id,
            client_id,
            user_agent,
            internal,
            request_id,
            threats: Vec::new(),
        }
    }
}

fn headers_name(name: &str) -> &str {
    name
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts the caller's remote address via the prioritized header chain:
/// `X-Forwarded-For` (first hop), `X-Real-IP`,
/// `CF-Connecting-IP`.
pub fn extract_remote_addr(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = header_str(headers, headers::X_FORWARDED_FOR) {
        if let Some(first) = xff.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    if let Some(real_ip) = header_str(headers, headers::X_REAL_IP) {
        return Some(real_ip);
    }
    header_str(headers, headers::CF_CONNECTING_IP)
}

/// Normalizes a raw request path into an endpoint pattern: strips the query
/// string (the caller is expected to pass only the path), removes a
/// trailing slash, and collapses `/api/<version>/<resource>/<id...>` into
/// `/api/<version>/<resource>/*`.
pub fn normalize_path(raw_path: &str) -> String {
    let path = raw_path.split('?').next().unwrap_or(raw_path);
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    let trimmed = if trimmed.is_empty() { "/" } else { trimmed };

    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

    // /api/<version>/<resource>/<...> -> /api/<version>/<resource>/*
    if segments.len() > 3 && segments[0] == "api" {
        format!("/{}/{}/{}/*", segments[0], segments[1], segments[2])
    } else {
        trimmed.to_string()
    }
}
