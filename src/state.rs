//! Shared application state: connection pools and the wired service graph.

use crate::domains::matching::{LikeService, MatchingService};
use crate::domains::tiers::{ActivityCounterStore, UserTierService};
use crate::services::notification_service::{init_notification_service, NotificationService};
use crate::services::rate_limiter_service::RateLimiter;
use crate::services::user_service::UserService;
use crate::shared::config::Config;
use crate::shared::database::create_db_pool;
use crate::shared::redis::{create_redis_pool, RedisService};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: deadpool_redis::Pool,
    pub users: Arc<UserService>,
    pub tier_service: Arc<UserTierService>,
    pub like_service: Arc<LikeService>,
    pub matching_service: Arc<MatchingService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(&config).await
    }

    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let db_pool = create_db_pool(&config.database).await?;
        let redis_pool = create_redis_pool(&config.redis)?;

        let redis = RedisService::new(redis_pool.clone());
        redis.ping().await?;

        let timezone = config.app.tz()?;

        let users = Arc::new(UserService::new(db_pool.clone()));
        let counters = ActivityCounterStore::new(db_pool.clone(), redis);
        let rate_limiter = Arc::new(RateLimiter::new(redis_pool.clone()));

        let tier_service = Arc::new(UserTierService::new(
            db_pool.clone(),
            users.clone(),
            counters,
            timezone,
        ));
        let like_service = Arc::new(LikeService::new(
            db_pool.clone(),
            users.clone(),
            tier_service.clone(),
            rate_limiter.clone(),
        ));
        let matching_service = Arc::new(MatchingService::new(
            db_pool.clone(),
            users.clone(),
            tier_service.clone(),
            rate_limiter.clone(),
            timezone,
        ));

        init_notification_service(Arc::new(NotificationService::from_env()));

        info!("Application state initialized (env: {})", config.app.environment);

        Ok(Self {
            db_pool,
            redis_pool,
            users,
            tier_service,
            like_service,
            matching_service,
            rate_limiter,
        })
    }
}
