//! Pool and session configuration.

use std::time::Duration;

/// Pool behavior configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Hard cap on concurrently existing sessions (idle + borrowed +
    /// in-creation).
    pub max_total: usize,
    /// Cap on sessions kept idle; a return that would exceed it deletes the
    /// session instead.
    pub max_idle: usize,
    /// When true, blocked borrowers are served strictly in arrival order.
    pub fairness: bool,
    /// How long `borrow` blocks before failing with `Exhausted`.
    pub max_wait: Duration,
    /// Sessions older than this are deleted by the eviction sweep. Age is
    /// measured from when the pool first wrapped the session, not from its
    /// last use.
    pub min_evictable_idle_age: Duration,
    /// Interval between eviction sweeps.
    pub eviction_check_interval: Duration,
    /// Validate a freshly created session before handing it out.
    pub test_on_create: bool,
    /// Validate an idle session before handing it out.
    pub test_on_borrow: bool,
    /// Validate sessions on return and during the eviction sweep.
    pub test_while_idle: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: 10,
            max_idle: 5,
            fairness: true,
            max_wait: Duration::from_secs(2),
            min_evictable_idle_age: Duration::from_secs(12 * 3600),
            eviction_check_interval: Duration::from_secs(60),
            test_on_create: false,
            test_on_borrow: false,
            test_while_idle: false,
        }
    }
}

/// Parameters for sessions created by the pool. One set per pool.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// User to impersonate when running statements.
    pub proxy_user: Option<String>,
    /// Driver memory, e.g. "2g".
    pub driver_memory: String,
    pub driver_cores: u32,
    /// Executor memory, e.g. "2g".
    pub executor_memory: String,
    pub executor_cores: u32,
    pub num_executors: u32,
    /// YARN queue to submit to.
    pub queue: String,
    /// Server-side heartbeat timeout; generous so a pooled-but-quiet session
    /// is not reaped between uses.
    pub heartbeat_timeout: Duration,
    /// Reserved name prefix identifying this process instance's sessions.
    /// Computed from the local hostname when not set.
    pub name_prefix: Option<String>,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            proxy_user: None,
            driver_memory: "2g".to_string(),
            driver_cores: 1,
            executor_memory: "2g".to_string(),
            executor_cores: 2,
            num_executors: 2,
            queue: "default".to_string(),
            heartbeat_timeout: Duration::from_secs(30 * 60),
            name_prefix: None,
        }
    }
}

/// Default reserved name prefix: host identity plus a fixed tag. The prefix
/// is the sole mechanism for telling this instance's sessions apart from
/// other users' sessions at reattachment time.
pub(crate) fn default_name_prefix() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("LIVY_POOL_{}@", host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_values() {
        let config = PoolConfig::default();
        assert_eq!(config.max_total, 10);
        assert_eq!(config.max_idle, 5);
        assert!(config.fairness);
        assert_eq!(config.max_wait, Duration::from_secs(2));
    }

    #[test]
    fn default_prefix_has_tag_and_separator() {
        let prefix = default_name_prefix();
        assert!(prefix.starts_with("LIVY_POOL_"));
        assert!(prefix.ends_with('@'));
    }
}
