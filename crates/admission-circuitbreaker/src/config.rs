//! Circuit breaker configuration,
//! grounded on `tower_resilience_circuitbreaker::config::CircuitBreakerConfig`'s
//! field set and builder shape.

use std::time::Duration;

/// How the reset timeout grows on repeated trips: a generalization of a
/// single fixed `wait_duration_in_open` into three strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Constant,
    Linear,
    Exponential,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub name: String,
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub request_timeout: Duration,
    pub half_open_probe_cap: usize,
    pub reset_timeout: Duration,
    pub backoff_strategy: BackoffStrategy,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl CircuitBreakerConfig {
    pub fn builder(name: impl Into<String>) -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new(name)
    }

    /// Computes the wait duration for the `n`-th consecutive open trip
    /// (`n` = 1 for the first trip), per [`BackoffStrategy`].
    pub fn compute_backoff(&self, trip_count: u32) -> Duration {
        let trip_count = trip_count.max(1);
        let computed = match self.backoff_strategy {
            BackoffStrategy::Constant => self.reset_timeout,
            BackoffStrategy::Linear => self.reset_timeout * trip_count,
            BackoffStrategy::Exponential => {
                let factor = self.backoff_multiplier.powi(trip_count as i32 - 1);
                Duration::from_secs_f64((self.reset_timeout.as_secs_f64() * factor).max(0.0))
            }
        };
        computed.min(self.max_backoff)
    }
}

#[derive(Debug)]
pub struct CircuitBreakerConfigBuilder {
    name: String,
    failure_threshold: usize,
    success_threshold: usize,
    request_timeout: Duration,
    half_open_probe_cap: usize,
    reset_timeout: Duration,
    backoff_strategy: BackoffStrategy,
    backoff_multiplier: f64,
    max_backoff: Duration,
}

impl CircuitBreakerConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 5,
            success_threshold: 2,
            request_timeout: Duration::from_secs(5),
            half_open_probe_cap: 1,
            reset_timeout: Duration::from_secs(1),
            backoff_strategy: BackoffStrategy::Constant,
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(60),
        }
    }

    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: usize) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn half_open_probe_cap(mut self, cap: usize) -> Self {
        self.half_open_probe_cap = cap;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    pub fn backoff_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = max;
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            name: self.name,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            request_timeout: self.request_timeout,
            half_open_probe_cap: self.half_open_probe_cap,
            reset_timeout: self.reset_timeout,
            backoff_strategy: self.backoff_strategy,
            backoff_multiplier: self.backoff_multiplier,
            max_backoff: self.max_backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_backoff_never_grows() {
        let config = CircuitBreakerConfig::builder("svc")
            .reset_timeout(Duration::from_secs(1))
            .backoff_strategy(BackoffStrategy::Constant)
            .build();
        assert_eq!(config.compute_backoff(1), Duration::from_secs(1));
        assert_eq!(config.compute_backoff(5), Duration::from_secs(1));
    }

    #[test]
    fn linear_backoff_scales_with_trip_count() {
        let config = CircuitBreakerConfig::builder("svc")
            .reset_timeout(Duration::from_secs(1))
            .backoff_strategy(BackoffStrategy::Linear)
            .max_backoff(Duration::from_secs(100))
            .build();
        assert_eq!(config.compute_backoff(3), Duration::from_secs(3));
    }

    #[test]
    fn exponential_backoff_applies_the_multiplier() {
        let config = CircuitBreakerConfig::builder("svc")
            .reset_timeout(Duration::from_secs(1))
            .backoff_strategy(BackoffStrategy::Exponential)
            .backoff_multiplier(2.0)
            .max_backoff(Duration::from_secs(100))
            .build();
        assert_eq!(config.compute_backoff(1), Duration::from_secs(1));
        assert_eq!(config.compute_backoff(2), Duration::from_secs(2));
        assert_eq!(config.compute_backoff(4), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped_at_max_backoff() {
        let config = CircuitBreakerConfig::builder("svc")
            .reset_timeout(Duration::from_secs(1))
            .backoff_strategy(BackoffStrategy::Exponential)
            .backoff_multiplier(10.0)
            .max_backoff(Duration::from_secs(5))
            .build();
        assert_eq!(config.compute_backoff(10), Duration::from_secs(5));
    }
}
