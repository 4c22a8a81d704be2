//! Client configuration types.
//!
//! - [`ClientConfig`] tunes the hyper transport
//! - [`SendPolicy`] bounds the work a single `send` may do

use std::time::Duration;

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout duration.
    pub timeout: Duration,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
        }
    }
}

/// Limits applied to one `send` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPolicy {
    /// Budget of the retry decision in the default pipeline.
    pub retry_budget: u32,
    /// Resends allowed after decisions asked for a restart.
    pub max_restarts: u32,
    /// Password grants allowed when no token is cached.
    pub max_unauthorized_recoveries: u32,
}

impl Default for SendPolicy {
    fn default() -> Self {
        Self {
            retry_budget: 2,
            max_restarts: 16,
            max_unauthorized_recoveries: 1,
        }
    }
}

impl SendPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub fn builder() -> SendPolicyBuilder {
        SendPolicyBuilder::default()
    }
}

/// Builder for [`SendPolicy`].
#[derive(Debug, Clone, Default)]
pub struct SendPolicyBuilder {
    retry_budget: Option<u32>,
    max_restarts: Option<u32>,
    max_unauthorized_recoveries: Option<u32>,
}

impl SendPolicyBuilder {
    /// Set the default retry budget.
    #[must_use]
    pub const fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = Some(budget);
        self
    }

    /// Set the restart cap.
    #[must_use]
    pub const fn max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = Some(max);
        self
    }

    /// Set how many password grants a send may run.
    #[must_use]
    pub const fn max_unauthorized_recoveries(mut self, max: u32) -> Self {
        self.max_unauthorized_recoveries = Some(max);
        self
    }

    /// Build the policy.
    #[must_use]
    pub fn build(self) -> SendPolicy {
        let defaults = SendPolicy::default();
        SendPolicy {
            retry_budget: self.retry_budget.unwrap_or(defaults.retry_budget),
            max_restarts: self.max_restarts.unwrap_or(defaults.max_restarts),
            max_unauthorized_recoveries: self
                .max_unauthorized_recoveries
                .unwrap_or(defaults.max_unauthorized_recoveries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.pool_idle_per_host, 32);
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_per_host(16)
            .build();

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_idle_per_host, 16);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
    }

    #[test]
    fn default_policy() {
        let policy = SendPolicy::default();
        assert_eq!(policy.retry_budget, 2);
        assert_eq!(policy.max_restarts, 16);
        assert_eq!(policy.max_unauthorized_recoveries, 1);
    }

    #[test]
    fn policy_builder_keeps_unset_defaults() {
        let policy = SendPolicy::builder().retry_budget(5).build();
        assert_eq!(policy.retry_budget, 5);
        assert_eq!(policy.max_restarts, 16);
    }
}
