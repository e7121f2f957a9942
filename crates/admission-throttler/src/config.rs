//! Throttler configuration, grounded on
//! `tower_resilience_bulkhead::config::BulkheadConfig`'s field set and
//! builder shape, generalized from one concurrency limit to four
//! priority-keyed queues plus a worker pool.

use std::time::Duration;

/// What happens when a priority lane's queue is already at capacity.
///
/// `DropLowestPriority` degrades to `DropNewest`: the throttler has no
/// cross-lane visibility cheap enough to justify evicting a queued request
/// in a different lane just to make room in this one, so the two policies
/// behave identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    DropNewest,
    DropOldest,
    DropLowestPriority,
}

#[derive(Debug, Clone)]
pub struct ThrottlerConfig {
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub drop_policy: DropPolicy,
    pub default_timeout: Duration,
    pub empty_poll_backoff: Duration,
}

impl ThrottlerConfig {
    pub fn builder() -> ThrottlerConfigBuilder {
        ThrottlerConfigBuilder::new()
    }
}

#[derive(Debug)]
pub struct ThrottlerConfigBuilder {
    queue_capacity: usize,
    worker_count: usize,
    drop_policy: DropPolicy,
    default_timeout: Duration,
    empty_poll_backoff: Duration,
}

impl ThrottlerConfigBuilder {
    pub fn new() -> Self {
        Self {
            queue_capacity: 256,
            worker_count: 8,
            drop_policy: DropPolicy::DropNewest,
            default_timeout: Duration::from_secs(30),
            empty_poll_backoff: Duration::from_millis(5),
        }
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn empty_poll_backoff(mut self, backoff: Duration) -> Self {
        self.empty_poll_backoff = backoff;
        self
    }

    pub fn build(self) -> ThrottlerConfig {
        ThrottlerConfig {
            queue_capacity: self.queue_capacity,
            worker_count: self.worker_count,
            drop_policy: self.drop_policy,
            default_timeout: self.default_timeout,
            empty_poll_backoff: self.empty_poll_backoff,
        }
    }
}

impl Default for ThrottlerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_shape() {
        let config = ThrottlerConfig::builder().build();
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.drop_policy, DropPolicy::DropNewest);
    }

    #[test]
    fn worker_count_is_never_zero() {
        let config = ThrottlerConfig::builder().worker_count(0).build();
        assert_eq!(config.worker_count, 1);
    }
}
