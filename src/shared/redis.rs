//! Redis cache service
//!
//! The cache is an accelerator in front of the durable counter ledger; it is
//! never authoritative. Callers treat every error here as a cache miss.

use crate::shared::{config::RedisConfig, error::AppError, Result};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

pub fn create_redis_pool(config: &RedisConfig) -> Result<deadpool_redis::Pool> {
    deadpool_redis::Config::from_url(config.url.as_str())
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| AppError::configuration(format!("Failed to create Redis pool: {}", e)))
}

#[derive(Clone)]
pub struct RedisService {
    pool: deadpool_redis::Pool,
}

impl RedisService {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis connection verified");
        Ok(())
    }

    /// Get a JSON value
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.pool.get().await?;
        let result: Option<String> = conn.get(key).await?;

        match result {
            Some(serialized) => Ok(Some(serde_json::from_str(&serialized)?)),
            None => Ok(None),
        }
    }

    /// Set a JSON value with expiration
    pub async fn set_ex<T>(&self, key: &str, value: &T, expiration_seconds: u64) -> Result<()>
    where
        T: Serialize,
    {
        let serialized = serde_json::to_string(value)?;
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, serialized, expiration_seconds)
            .await?;
        Ok(())
    }

    /// Get a plain integer counter
    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.pool.get().await?;
        let result: Option<i64> = conn.get(key).await?;
        Ok(result)
    }

    /// Set a plain integer counter with expiration
    pub async fn set_i64_ex(&self, key: &str, value: i64, expiration_seconds: u64) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, value, expiration_seconds)
            .await?;
        Ok(())
    }

    /// Delete a key
    pub async fn forget(&self, key: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let result: i32 = conn.del(key).await?;
        Ok(result > 0)
    }

    /// Increment a counter
    pub async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.pool.get().await?;
        let result: i64 = conn.incr(key, 1).await?;
        Ok(result)
    }

    /// Increment a counter with expiration
    pub async fn incr_ex(&self, key: &str, expiration_seconds: u64) -> Result<i64> {
        let mut conn = self.pool.get().await?;
        let result: i64 = conn.incr(key, 1).await?;
        if result == 1 {
            conn.expire::<_, ()>(key, expiration_seconds as i64).await?;
        }
        Ok(result)
    }
}
