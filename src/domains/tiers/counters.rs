//! Durable per-user-per-day activity counters with a Redis mirror in front.
//!
//! The PostgreSQL row is the source of truth; every increment is a single
//! atomic upsert there. The cache is write-through and read-through, and any
//! cache failure degrades to the durable value.

use crate::cache_key::CacheKeys;
use crate::cache_ttl::CacheTtl;
use crate::domains::tiers::models::ActivityType;
use crate::shared::{redis::RedisService, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::warn;

#[derive(Clone)]
pub struct ActivityCounterStore {
    db: PgPool,
    redis: RedisService,
}

impl ActivityCounterStore {
    pub fn new(db: PgPool, redis: RedisService) -> Self {
        Self { db, redis }
    }

    /// Atomically increment the durable counter and return the new count.
    /// Safe under concurrent callers: the increment happens in the store,
    /// never as read-modify-write here.
    pub async fn increment(
        &self,
        user_id: i64,
        activity: ActivityType,
        date: NaiveDate,
    ) -> Result<i64> {
        let count: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO amora.daily_activity_counters (user_id, activity_type, activity_date, count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (user_id, activity_type, activity_date)
            DO UPDATE SET count = amora.daily_activity_counters.count + 1, updated_at = NOW()
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(activity.as_str())
        .bind(date)
        .fetch_one(&self.db)
        .await?;

        let key = CacheKeys::daily_activity(user_id, activity.as_str(), date);
        if let Err(e) = self
            .redis
            .set_i64_ex(&key, count as i64, CacheTtl::DAILY_COUNTER)
            .await
        {
            warn!("Failed to mirror counter {} to cache: {}", key, e);
        }

        Ok(count as i64)
    }

    /// Read today's count, preferring the cache mirror. Cache errors are
    /// treated as a miss; a durable-store error propagates so quota checks
    /// can fail closed.
    pub async fn get_count(
        &self,
        user_id: i64,
        activity: ActivityType,
        date: NaiveDate,
    ) -> Result<i64> {
        let key = CacheKeys::daily_activity(user_id, activity.as_str(), date);

        match self.redis.get_i64(&key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!("Cache read failed for {}, falling back to store: {}", key, e),
        }

        let count: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT count FROM amora.daily_activity_counters
            WHERE user_id = $1 AND activity_type = $2 AND activity_date = $3
            "#,
        )
        .bind(user_id)
        .bind(activity.as_str())
        .bind(date)
        .fetch_optional(&self.db)
        .await?;

        let count = count.unwrap_or(0) as i64;

        if let Err(e) = self
            .redis
            .set_i64_ex(&key, count, CacheTtl::DAILY_COUNTER)
            .await
        {
            warn!("Failed to backfill counter {} into cache: {}", key, e);
        }

        Ok(count)
    }

    /// All of a user's counters for one day, straight from the durable store.
    pub async fn counts_for_day(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<HashMap<ActivityType, i64>> {
        let rows: Vec<(String, i32)> = sqlx::query_as(
            r#"
            SELECT activity_type, count FROM amora.daily_activity_counters
            WHERE user_id = $1 AND activity_date = $2
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.db)
        .await?;

        let mut counts = HashMap::new();
        for (raw, count) in rows {
            // Unknown names can only come from legacy rows; skip them.
            if let Ok(activity) = raw.parse::<ActivityType>() {
                counts.insert(activity, count as i64);
            }
        }
        Ok(counts)
    }
}
