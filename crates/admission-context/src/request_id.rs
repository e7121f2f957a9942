//! Request ID generation and reuse.
//!
//! A caller-supplied `X-Request-ID` is reused verbatim when it is
//! well-formed, so a request can be traced across service boundaries;
//! otherwise a fresh v4 UUID is minted.

use http::HeaderMap;
use uuid::Uuid;

use crate::descriptor::headers;

const MAX_LEN: usize = 128;

/// Resolves the request ID to propagate: the client-supplied
/// `X-Request-ID` if it is non-empty, reasonably short, and made up only of
/// ASCII alphanumerics, `-`, or `_`; otherwise a freshly generated v4 UUID.
pub fn resolve_request_id(headers: &HeaderMap) -> String {
    headers
        .get(headers::X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| is_well_formed(id))
        .map(str::to_string)
        .unwrap_or_else(generate_request_id)
}

fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
    && id.len() <= MAX_LEN
    && id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_a_well_formed_client_id() {
        let mut headers = HeaderMap::new();
        headers.insert(headers::X_REQUEST_ID, "trace-abc_123".parse().unwrap());
        assert_eq!(resolve_request_id(&headers), "trace-abc_123");
    }

    #[test]
    fn rejects_malformed_ids_and_mints_a_uuid() {
        let mut headers = HeaderMap::new();
        headers.insert(headers::X_REQUEST_ID, "not a valid id!!".parse().unwrap());
        let id = resolve_request_id(&headers);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn mints_a_uuid_when_absent() {
        let headers = HeaderMap::new();
        let id = resolve_request_id(&headers);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn rejects_overlong_ids() {
        let mut headers = HeaderMap::new();
        let long = "a".repeat(MAX_LEN + 1);
        headers.insert(headers::X_REQUEST_ID, long.parse().unwrap());
        let id = resolve_request_id(&headers);
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
