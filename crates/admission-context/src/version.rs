//! Client-version negotiation.
//!
//! Checks `X-Client-Version` (falling back to `X-CLI-Version`, then a
//! version token embedded in `User-Agent`) against a configured set of
//! supported versions. Public paths (health, metrics, docs, openapi) always
//! bypass the check — an unauthenticated monitor should never be locked out
//! by a version bump.

use http::HeaderMap;

use crate::descriptor::headers;

const PUBLIC_PATHS: &[&str] = &["/health", "/metrics", "/docs", "/openapi.json"];

/// Configuration for client-version negotiation.
#[derive(Debug, Clone)]
pub struct VersionConfig {
    supported_versions: Vec<String>,
}

impl VersionConfig {
    pub fn new(supported_versions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            supported_versions: supported_versions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn builder() -> VersionConfigBuilder {
        VersionConfigBuilder::default()
    }

    fn supports(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }
}

#[derive(Debug, Default)]
pub struct VersionConfigBuilder {
    supported_versions: Vec<String>,
}

impl VersionConfigBuilder {
    pub fn supported_version(mut self, version: impl Into<String>) -> Self {
        self.supported_versions.push(version.into());
        self
    }

    pub fn build(self) -> VersionConfig {
        VersionConfig {
            supported_versions: self.supported_versions,
        }
    }
}

/// The outcome of negotiating a client's declared version against
/// [`VersionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOutcome {
    /// No version check applies (public path) or no version was declared.
    NotApplicable,
    Supported { declared: String },
    Mismatch {
        declared: String,
        supported: Vec<String>,
    },
}

/// Negotiates the declared client version against `config` for a request to
/// `endpoint_pattern`.
pub fn negotiate(config: &VersionConfig, endpoint_pattern: &str, headers: &HeaderMap) -> VersionOutcome {
    if PUBLIC_PATHS.contains(&endpoint_pattern) {
        return VersionOutcome::NotApplicable;
    }

    let Some(declared) = extract_declared_version(headers) else {
        return VersionOutcome::NotApplicable;
    };

    if config.supports(&declared) {
        VersionOutcome::Supported { declared }
    } else {
        VersionOutcome::Mismatch {
            declared,
            supported: config.supported_versions.clone(),
        }
    }
}

fn extract_declared_version(headers: &HeaderMap) -> Option<String> {
    if let Some(v) = header_str(headers, headers::X_CLIENT_VERSION) {
        return Some(v);
    }
    if let Some(v) = header_str(headers, headers::X_CLI_VERSION) {
        return Some(v);
    }
    header_str(headers, headers::USER_AGENT).and_then(|ua| extract_version_from_user_agent(&ua))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pulls a `name/x.y.z` style token out of a User-Agent string, e.g.
/// `memory-cli/1.4.0 (linux)` -> `1.4.0`.
fn extract_version_from_user_agent(ua: &str) -> Option<String> {
    let token = ua.split_whitespace().next()?;
    let (_, version) = token.split_once('/')?;
    if version.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        Some(version.to_string())
    } else {
        None
    }
}
