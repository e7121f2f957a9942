//! Rate-limit key derivation.
//!
//! Keys take the form `<endpoint-pattern>:<scope-tag>:<identifier>`. Two
//! requests with the same (endpoint pattern, scope, scoped identifier)
//! always produce the same key.

use crate::endpoint::Scope;

/// Everything needed to derive a key, already extracted from the request —
/// this crate has no HTTP-framework dependency.
pub struct KeyInput<'a> {
    pub remote_addr: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub client_id: Option<&'a str>,
    pub custom_identifier: Option<&'a str>,
}

/// Derives the scoped identifier for `scope`, falling back to the remote
/// address when the scope's preferred identifier is absent ("IP
/// fallback").
pub fn identifier_for(scope: Scope, input: &KeyInput<'_>) -> String {
    let preferred = match scope {
        Scope::Global => None,
        Scope::PerIp => None,
        Scope::PerUser => input.user_id,
        Scope::PerSession => input.session_id,
        Scope::PerClient => input.client_id,
        Scope::Custom => input.custom_identifier,
    };

    preferred
        .or(input.remote_addr)
        .unwrap_or("unknown")
        .to_string()
}

/// Builds the `<endpoint-pattern>:<scope-tag>:<identifier>` key.
pub fn derive_key(endpoint_pattern: &str, scope: Scope, input: &KeyInput<'_>) -> String {
    let identifier = if scope == Scope::Global {
        "*".to_string()
    } else {
        identifier_for(scope, input)
    };
    format!("{endpoint_pattern}:{}:{identifier}", scope.tag())
}
