//! Like/match transaction coordinator.
//!
//! The like-then-check-mutual-then-create-match sequence runs inside one
//! transaction with row locks on both user records, acquired lower-id-first
//! so two concurrent opposite-direction likes on the same pair serialize
//! instead of deadlocking. Notifications and counters happen only after a
//! successful commit.

use crate::domains::matching::models::{LikeResult, MatchingError};
use crate::domains::tiers::{ActivityType, Tier, UserTierService};
use crate::models::{canonical_pair, User};
use crate::services::notification_service::get_notification_service;
use crate::services::rate_limiter_service::{
    rate_limit_key_user_likes, RateLimitConfig, RateLimiter,
};
use crate::services::user_service::UserService;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct LikeService {
    db: PgPool,
    users: Arc<UserService>,
    tiers: Arc<UserTierService>,
    rate_limiter: Arc<RateLimiter>,
}

impl LikeService {
    pub fn new(
        db: PgPool,
        users: Arc<UserService>,
        tiers: Arc<UserTierService>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            db,
            users,
            tiers,
            rate_limiter,
        }
    }

    /// Record that `actor_id` likes `target_id`, creating a match when the
    /// like is mutual. Idempotent: a repeat call yields `AlreadyLiked` and
    /// changes nothing.
    pub async fn like(&self, actor_id: i64, target_id: i64) -> Result<LikeResult, MatchingError> {
        if actor_id == target_id {
            return Err(MatchingError::Validation(
                "cannot like your own profile".to_string(),
            ));
        }

        // Per-minute limiter is read-only here; it is charged only after a
        // successful outcome. Best-effort: an unavailable window allows.
        let rate_key = rate_limit_key_user_likes(actor_id);
        match self.rate_limiter.current_count(&rate_key).await {
            Ok(count) if count >= RateLimitConfig::LIKES_PER_MINUTE_USER.max_requests => {
                return Err(MatchingError::RateLimited);
            }
            Ok(_) => {}
            Err(e) => warn!("Like rate-limit check unavailable, allowing: {}", e),
        }

        let (actor, target) = tokio::join!(
            self.users.find_user(actor_id),
            self.users.find_user(target_id)
        );
        let actor: User = actor?.ok_or(MatchingError::UserNotFound)?;
        let target: User = target?.ok_or(MatchingError::TargetNotFound)?;

        // Admission: liking consumes the actor's remaining view headroom,
        // checked (not spent) before the critical section.
        let quota = self.tiers.view_quota(&actor).await;
        if !quota.allowed {
            return Err(MatchingError::ViewLimitReached {
                used: quota.used,
                limit: quota.limit,
            });
        }

        let (match_created, match_id) = self.like_transaction(actor_id, target_id).await?;

        // Post-commit side effects: never fail the operation.
        self.dispatch_notifications(actor_id, target_id, match_created, match_id);
        self.record_ledger(actor_id, target_id, match_created).await;
        if let Err(e) = self
            .rate_limiter
            .record(&rate_key, RateLimitConfig::LIKES_PER_MINUTE_USER)
            .await
        {
            warn!("Failed to charge like rate-limit window: {}", e);
        }

        let can_message = match_created || self.tiers.tier_of(&actor) != Tier::Free;

        Ok(LikeResult {
            success: true,
            match_created,
            can_message,
        })
    }

    /// The serialized critical section. Any error aborts the transaction, so
    /// no partial like/match state is ever persisted.
    async fn like_transaction(
        &self,
        actor_id: i64,
        target_id: i64,
    ) -> Result<(bool, Option<Uuid>), MatchingError> {
        let mut tx = self.db.begin().await?;

        // Lock both user rows, always lower id first.
        let (first, second) = canonical_pair(actor_id, target_id);
        for id in [first, second] {
            let locked: Option<i64> =
                sqlx::query_scalar("SELECT id FROM amora.users WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if locked.is_none() {
                return Err(if id == target_id {
                    MatchingError::TargetNotFound
                } else {
                    MatchingError::UserNotFound
                });
            }
        }

        // Re-check inside the lock: a concurrent call may have won the race.
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT status FROM amora.user_likes WHERE user_id = $1 AND liked_user_id = $2",
        )
        .bind(actor_id)
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(MatchingError::AlreadyLiked);
        }

        let matched: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM amora.user_matches
            WHERE user_a_id = $1 AND user_b_id = $2 AND status = 'active'
            "#,
        )
        .bind(first)
        .bind(second)
        .fetch_optional(&mut *tx)
        .await?;
        if matched.is_some() {
            return Err(MatchingError::AlreadyMatched);
        }

        sqlx::query(
            r#"
            INSERT INTO amora.user_likes (id, user_id, liked_user_id, status, liked_at)
            VALUES ($1, $2, $3, 'pending', NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

        // Mutuality: does the reverse like already exist?
        let reciprocal: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM amora.user_likes WHERE user_id = $1 AND liked_user_id = $2",
        )
        .bind(target_id)
        .bind(actor_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut match_id = None;
        if reciprocal.is_some() {
            let id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO amora.user_matches (id, user_a_id, user_b_id, status, matched_at)
                VALUES ($1, $2, $3, 'active', NOW())
                "#,
            )
            .bind(id)
            .bind(first)
            .bind(second)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                UPDATE amora.user_likes SET status = 'matched'
                WHERE (user_id = $1 AND liked_user_id = $2)
                   OR (user_id = $2 AND liked_user_id = $1)
                "#,
            )
            .bind(actor_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

            match_id = Some(id);
        }

        tx.commit().await?;

        if match_id.is_some() {
            info!("Users {} and {} matched", first, second);
        }

        Ok((match_id.is_some(), match_id))
    }

    /// Fire-and-forget; dispatch failures are logged, never surfaced.
    fn dispatch_notifications(
        &self,
        actor_id: i64,
        target_id: i64,
        match_created: bool,
        match_id: Option<Uuid>,
    ) {
        let Some(notifier) = get_notification_service() else {
            return;
        };
        tokio::spawn(async move {
            let result = if match_created {
                let match_id = match_id.unwrap_or_default();
                let first = notifier
                    .notify_match_created(actor_id, target_id, match_id)
                    .await;
                let second = notifier
                    .notify_match_created(target_id, actor_id, match_id)
                    .await;
                first.and(second)
            } else {
                notifier.notify_like_received(target_id, actor_id).await
            };
            if let Err(e) = result {
                error!("Failed to dispatch like/match notification: {}", e);
            }
        });
    }

    /// Daily ledger bookkeeping after a committed like; best-effort.
    async fn record_ledger(&self, actor_id: i64, target_id: i64, match_created: bool) {
        if let Err(e) = self
            .tiers
            .record_activity(actor_id, ActivityType::LikesSent)
            .await
        {
            warn!("Failed to record likes_sent for user {}: {}", actor_id, e);
        }
        if match_created {
            for id in [actor_id, target_id] {
                if let Err(e) = self
                    .tiers
                    .record_activity(id, ActivityType::MatchesCreated)
                    .await
                {
                    warn!("Failed to record matches_created for user {}: {}", id, e);
                }
            }
        }
    }
}
