// ============================================================================
// RATE LIMITING SERVICE - short fixed-window counters in Redis
// ============================================================================
//
// These per-minute windows are separate from the daily quota ledger and are
// deliberately less durable: Redis-only, eventually consistent, best-effort.
// Callers decide fail-open vs fail-closed when the window is unreachable.

use anyhow::Result;
use redis::AsyncCommands;
use tracing::warn;

pub struct RateLimiter {
    redis: deadpool_redis::Pool,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimiter {
    pub fn new(redis: deadpool_redis::Pool) -> Self {
        Self { redis }
    }

    /// Increment-and-check: charges the window as part of the check.
    pub async fn check_rate_limit(&self, key: &str, config: RateLimitConfig) -> Result<bool> {
        let mut conn = self.redis.get().await?;

        let count: u32 = conn.incr(key, 1).await?;

        // First request in the window sets the TTL
        if count == 1 {
            conn.expire::<_, ()>(key, config.window_secs as i64).await?;
        }

        let allowed = count <= config.max_requests;

        if !allowed {
            warn!("Rate limit exceeded for key: {}", key);
        }

        Ok(allowed)
    }

    /// Read the window without charging it. Used where the charge must only
    /// happen after the guarded operation succeeds.
    pub async fn current_count(&self, key: &str) -> Result<u32> {
        let mut conn = self.redis.get().await?;
        let count: Option<u32> = conn.get(key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Charge the window after a successful operation.
    pub async fn record(&self, key: &str, config: RateLimitConfig) -> Result<()> {
        let mut conn = self.redis.get().await?;
        let count: u32 = conn.incr(key, 1).await?;
        if count == 1 {
            conn.expire::<_, ()>(key, config.window_secs as i64).await?;
        }
        Ok(())
    }

    /// Requests left in the window
    pub async fn get_remaining(&self, key: &str, config: RateLimitConfig) -> Result<u32> {
        let count = self.current_count(key).await?;
        Ok(config.max_requests.saturating_sub(count))
    }

    /// Reset a window
    pub async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.get().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

// ============================================================================
// RATE LIMIT CONFIGS
// ============================================================================

impl RateLimitConfig {
    /// Likes sent per user (charged only on success)
    pub const LIKES_PER_MINUTE_USER: Self = Self {
        max_requests: 5,
        window_secs: 60,
    };

    /// Match browsing / name search requests per user
    pub const BROWSE_PER_MINUTE_USER: Self = Self {
        max_requests: 10,
        window_secs: 60,
    };
}

// ============================================================================
// RATE LIMIT KEYS
// ============================================================================

pub fn rate_limit_key_user_likes(user_id: i64) -> String {
    format!("ratelimit:user:{}:likes", user_id)
}

pub fn rate_limit_key_user_browse(user_id: i64) -> String {
    format!("ratelimit:user:{}:browse", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_builders_are_per_user() {
        assert_eq!(rate_limit_key_user_likes(7), "ratelimit:user:7:likes");
        assert_eq!(rate_limit_key_user_browse(7), "ratelimit:user:7:browse");
        assert_ne!(rate_limit_key_user_likes(7), rate_limit_key_user_likes(8));
    }
}
