//! Gate-level configuration aggregates every stage's
//! config into one `GateConfig`, built with the same `*ConfigBuilder`
//! pattern used per pattern crate.

use std::net::SocketAddr;
use std::time::Duration;

use admission_circuitbreaker::{BackoffStrategy, CircuitBreakerConfig};
use admission_context::VersionConfig;
use admission_ratelimiter::EndpointLimit;
use admission_sanitizer::SanitizerConfig;
use admission_throttler::ThrottlerConfig;

/// A named downstream-service circuit breaker entry.
#[derive(Debug, Clone)]
pub struct ServiceBreaker {
    pub name: String,
    pub config: CircuitBreakerConfig,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub listen_addr: SocketAddr,
    pub sanitizer: SanitizerConfig,
    pub endpoint_limits: Vec<EndpointLimit>,
    pub service_breakers: Vec<ServiceBreaker>,
    pub throttler: ThrottlerConfig,
    pub version: VersionConfig,
    /// How often the rate limiter's janitor sweeps idle process-local
    /// windows.
    pub rate_limit_janitor_interval: Duration,
}

impl GateConfig {
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::new()
    }
}

pub struct GateConfigBuilder {
    listen_addr: SocketAddr,
    sanitizer: SanitizerConfig,
    endpoint_limits: Vec<EndpointLimit>,
    service_breakers: Vec<ServiceBreaker>,
    throttler: ThrottlerConfig,
    version: VersionConfig,
    rate_limit_janitor_interval: Duration,
}

impl GateConfigBuilder {
    pub fn new() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".parse().expect("valid default listen address"),
            sanitizer: SanitizerConfig::builder().build(),
            endpoint_limits: vec![
                EndpointLimit::builder("/api/v1/*").max_requests(60).window(Duration::from_secs(60)).build(),
                EndpointLimit::builder("/mcp").max_requests(120).window(Duration::from_secs(60)).build(),
            ],
            service_breakers: vec![ServiceBreaker {
                name: "default".to_string(),
                config: CircuitBreakerConfig::builder("default")
                    .failure_threshold(5)
                    .success_threshold(2)
                    .backoff_strategy(BackoffStrategy::Exponential)
                    .build(),
            }],
            throttler: ThrottlerConfig::builder().build(),
            version: VersionConfig::builder().supported_version("1.0.0").build(),
            rate_limit_janitor_interval: Duration::from_secs(30),
        }
    }

    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn sanitizer(mut self, config: SanitizerConfig) -> Self {
        self.sanitizer = config;
        self
    }

    pub fn endpoint_limits(mut self, limits: Vec<EndpointLimit>) -> Self {
        self.endpoint_limits = limits;
        self
    }

    pub fn service_breaker(mut self, name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.service_breakers.push(ServiceBreaker { name: name.into(), config });
        self
    }

    pub fn throttler(mut self, config: ThrottlerConfig) -> Self {
        self.throttler = config;
        self
    }

    pub fn version(mut self, config: VersionConfig) -> Self {
        self.version = config;
        self
    }

    pub fn rate_limit_janitor_interval(mut self, interval: Duration) -> Self {
        self.rate_limit_janitor_interval = interval;
        self
    }

    pub fn build(self) -> GateConfig {
        GateConfig {
            listen_addr: self.listen_addr,
            sanitizer: self.sanitizer,
            endpoint_limits: self.endpoint_limits,
            service_breakers: self.service_breakers,
            throttler: self.throttler,
            version: self.version,
            rate_limit_janitor_interval: self.rate_limit_janitor_interval,
        }
    }
}

impl Default for GateConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The on-disk shape of a config file override plain
/// serde-friendly fields rather than deriving `Deserialize` directly on the
/// builder structs, since several of them hold a `Duration` (no direct
/// serde mapping without a wrapper). Every field is optional so a file only
/// needs to mention what it overrides.
#[derive(Debug, Default, serde::Deserialize)]
pub struct GateConfigFile {
    pub listen_addr: Option<SocketAddr>,
    pub max_body_len: Option<usize>,
    pub supported_versions: Option<Vec<String>>,
    pub rate_limit_window_secs: Option<u64>,
    pub rate_limit_max_requests: Option<u64>,
    pub worker_count: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub rate_limit_janitor_interval_secs: Option<u64>,
}

impl GateConfigFile {
    /// Applies this file's overrides on top of [`GateConfig`]'s defaults.
    pub fn into_gate_config(self) -> GateConfig {
        let mut builder = GateConfig::builder();

        if let Some(addr) = self.listen_addr {
            builder = builder.listen_addr(addr);
        }
        if let Some(max_len) = self.max_body_len {
            builder = builder.sanitizer(SanitizerConfig::builder().max_body_len(max_len).build());
        }
        if let Some(versions) = self.supported_versions {
            let mut version_builder = VersionConfig::builder();
            for v in versions {
                version_builder = version_builder.supported_version(v);
            }
            builder = builder.version(version_builder.build());
        }
        if self.rate_limit_window_secs.is_some() || self.rate_limit_max_requests.is_some() {
            let window = self.rate_limit_window_secs.map(Duration::from_secs).unwrap_or(Duration::from_secs(60));
            let max_requests = self.rate_limit_max_requests.unwrap_or(60);
            builder = builder.endpoint_limits(vec![
                EndpointLimit::builder("/api/v1/*").max_requests(max_requests).window(window).build(),
                EndpointLimit::builder("/mcp").max_requests(max_requests).window(window).build(),
            ]);
        }
        if self.worker_count.is_some() || self.queue_capacity.is_some() {
            let mut throttler_builder = ThrottlerConfig::builder();
            if let Some(workers) = self.worker_count {
                throttler_builder = throttler_builder.worker_count(workers);
            }
            if let Some(capacity) = self.queue_capacity {
                throttler_builder = throttler_builder.queue_capacity(capacity);
            }
            builder = builder.throttler(throttler_builder.build());
        }
        if let Some(secs) = self.rate_limit_janitor_interval_secs {
            builder = builder.rate_limit_janitor_interval(Duration::from_secs(secs));
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_breaker_and_two_endpoint_limits() {
        let config = GateConfig::builder().build();
        assert_eq!(config.service_breakers.len(), 1);
        assert_eq!(config.endpoint_limits.len(), 2);
    }

    #[test]
    fn janitor_interval_override_applies() {
        let file: GateConfigFile = serde_json::from_str(r#"{"rate_limit_janitor_interval_secs": 5}"#).unwrap();
        let config = file.into_gate_config();
        assert_eq!(config.rate_limit_janitor_interval, Duration::from_secs(5));
    }

    #[test]
    fn config_file_overrides_apply_on_top_of_defaults() {
        let file: GateConfigFile = serde_json::from_str(
            r#"{"listen_addr": "0.0.0.0:9000", "rate_limit_max_requests": 10}"#,
        )
            .unwrap();
        let config = file.into_gate_config();
        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.endpoint_limits[0].max_requests, 10);
    }

    #[test]
    fn an_empty_config_file_changes_nothing() {
        let file: GateConfigFile = serde_json::from_str("{}").unwrap();
        let config = file.into_gate_config();
        let default_config = GateConfig::builder().build();
        assert_eq!(config.listen_addr, default_config.listen_addr);
    }
}
