//! Age-based eviction policy.

use crate::config::PoolConfig;
use crate::pool::PooledSession;

/// Whether an idle session should be evicted on this sweep.
///
/// Evicts on absolute age: a session older than `min_evictable_idle_age` is
/// evicted no matter how recently it was borrowed, so no remote session lives
/// past a maximum age even when frequent reuse would keep resetting an
/// idle-time clock. `idle_count` does not influence the decision.
pub fn should_evict(pooled: &PooledSession, idle_count: usize, config: &PoolConfig) -> bool {
    let _ = idle_count;
    pooled.age() > config.min_evictable_idle_age
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Session, SessionState};
    use std::time::Duration;
    use tokio::time::{self, Instant};

    fn pooled() -> PooledSession {
        PooledSession {
            session: Session {
                id: 1,
                app_id: None,
                owner: None,
                proxy_user: None,
                name: Some("LIVY_POOL_test@1".to_string()),
                state: SessionState::Idle,
            },
            created_at: Instant::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_past_max_age_is_evicted() {
        let config = PoolConfig {
            min_evictable_idle_age: Duration::from_secs(3600),
            ..PoolConfig::default()
        };
        let p = pooled();
        time::advance(Duration::from_secs(3601)).await;
        assert!(should_evict(&p, 0, &config));
    }

    #[tokio::test(start_paused = true)]
    async fn young_session_is_kept_regardless_of_idle_count() {
        let config = PoolConfig {
            min_evictable_idle_age: Duration::from_secs(3600),
            ..PoolConfig::default()
        };
        let p = pooled();
        time::advance(Duration::from_secs(3599)).await;
        assert!(!should_evict(&p, 0, &config));
        assert!(!should_evict(&p, 100, &config));
    }
}
