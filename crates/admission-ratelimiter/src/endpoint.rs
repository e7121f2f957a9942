//! Per-endpoint rate-limit configuration.

use std::time::Duration;

/// How a rate-limit key's identifier is derived for a matched endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    PerIp,
    PerUser,
    PerSession,
    PerClient,
    Custom,
}

impl Scope {
    pub fn tag(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::PerIp => "ip",
            Scope::PerUser => "user",
            Scope::PerSession => "session",
            Scope::PerClient => "client",
            Scope::Custom => "custom",
        }
    }
}

/// Per-endpoint-pattern rate limit configuration.
#[derive(Debug, Clone)]
pub struct EndpointLimit {
    pub endpoint_pattern: String,
    pub max_requests: u64,
    pub window: Duration,
    pub burst_limit: u64,
    pub scope: Scope,
    pub skip_paths: Vec<String>,
    pub skip_methods: Vec<String>,
    pub response_code: u16,
    pub priority: u8,
    pub exempt_identifiers: Vec<String>,
    pub include_headers: bool,
}

impl EndpointLimit {
    pub fn builder(endpoint_pattern: impl Into<String>) -> EndpointLimitBuilder {
        EndpointLimitBuilder::new(endpoint_pattern)
    }

    pub fn is_exempt(&self, identifier: &str) -> bool {
        self.exempt_identifiers.iter().any(|id| id == identifier)
    }

    pub fn is_skipped(&self, path: &str, method: &str) -> bool {
        self.skip_paths.iter().any(|p| p == path)
        || self.skip_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

#[derive(Debug)]
pub struct EndpointLimitBuilder {
    endpoint_pattern: String,
    max_requests: u64,
    window: Duration,
    burst_limit: u64,
    scope: Scope,
    skip_paths: Vec<String>,
    skip_methods: Vec<String>,
    response_code: u16,
    priority: u8,
    exempt_identifiers: Vec<String>,
    include_headers: bool,
}

impl EndpointLimitBuilder {
    pub fn new(endpoint_pattern: impl Into<String>) -> Self {
        Self {
            endpoint_pattern: endpoint_pattern.into(),
            max_requests: 60,
            window: Duration::from_secs(60),
            burst_limit: 10,
            scope: Scope::PerIp,
            skip_paths: Vec::new(),
            skip_methods: Vec::new(),
            response_code: 429,
            priority: 0,
            exempt_identifiers: Vec::new(),
            include_headers: true,
        }
    }

    pub fn max_requests(mut self, max: u64) -> Self {
        self.max_requests = max;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn burst_limit(mut self, burst: u64) -> Self {
        self.burst_limit = burst;
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn skip_path(mut self, path: impl Into<String>) -> Self {
        self.skip_paths.push(path.into());
        self
    }

    pub fn skip_method(mut self, method: impl Into<String>) -> Self {
        self.skip_methods.push(method.into());
        self
    }

    pub fn response_code(mut self, code: u16) -> Self {
        self.response_code = code;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn exempt(mut self, identifier: impl Into<String>) -> Self {
        self.exempt_identifiers.push(identifier.into());
        self
    }

    pub fn include_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    pub fn build(self) -> EndpointLimit {
        EndpointLimit {
            endpoint_pattern: self.endpoint_pattern,
            max_requests: self.max_requests,
            window: self.window,
            burst_limit: self.burst_limit,
            scope: self.scope,
            skip_paths: self.skip_paths,
            skip_methods: self.skip_methods,
            response_code: self.response_code,
            priority: self.priority,
            exempt_identifiers: self.exempt_identifiers,
            include_headers: self.include_headers,
        }
    }
}
