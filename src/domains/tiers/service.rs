//! Tier policy engine: derives the tier, answers "is this action allowed
//! now", and records usage against the daily ledger.

use crate::domains::tiers::counters::ActivityCounterStore;
use crate::domains::tiers::models::{
    ActivityType, DailyUsageSummary, InteractionCheck, MessagePolicy, Tier, TierLimits, UsageEntry,
    ViewQuota, REASON_DAILY_LIMIT, REASON_FREE_TIER, REASON_FREE_TO_FREE,
    REASON_QUOTA_UNAVAILABLE, UNLIMITED,
};
use crate::models::{canonical_pair, SubscriptionStatus, User};
use crate::services::user_service::UserService;
use crate::shared::{AppError, Result};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct UserTierService {
    db: PgPool,
    users: Arc<UserService>,
    counters: ActivityCounterStore,
    timezone: Tz,
}

impl UserTierService {
    pub fn new(
        db: PgPool,
        users: Arc<UserService>,
        counters: ActivityCounterStore,
        timezone: Tz,
    ) -> Self {
        Self {
            db,
            users,
            counters,
            timezone,
        }
    }

    /// Calendar day of the quota ledger, in the application timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    // ========================================================================
    // TIER DERIVATION
    // ========================================================================

    /// Derive the tier from the subscription columns. When the stored status
    /// is still `active` past the expiry timestamp, a correction is spawned
    /// off the read path; the returned tier never waits on it.
    pub fn tier_of(&self, user: &User) -> Tier {
        let now = Utc::now();
        let tier = Tier::from_subscription(user.plan(), user.status(), user.subscription_expires_at, now);

        let stale_active = user.status() == SubscriptionStatus::Active
            && user.subscription_expires_at.map_or(false, |e| e <= now);
        if stale_active {
            self.spawn_expiry_correction(user.id);
        }

        tier
    }

    fn spawn_expiry_correction(&self, user_id: i64) {
        let users = self.users.clone();
        tokio::spawn(async move {
            match users.mark_subscription_expired(user_id).await {
                Ok(true) => info!("Marked lapsed subscription as expired for user {}", user_id),
                Ok(false) => {}
                Err(e) => warn!(
                    "Failed to persist subscription expiry for user {}: {}",
                    user_id, e
                ),
            }
        });
    }

    pub async fn get_tier(&self, user_id: i64) -> Result<Tier> {
        let user = self.require_user(user_id).await?;
        Ok(self.tier_of(&user))
    }

    pub fn get_limits(&self, tier: Tier) -> TierLimits {
        TierLimits::for_tier(tier)
    }

    // ========================================================================
    // PROFILE VIEW QUOTA
    // ========================================================================

    /// Quota check only; never increments, never errors. Unavailable counter
    /// reads deny the action (fail closed) except for unlimited tiers.
    pub async fn view_quota(&self, user: &User) -> ViewQuota {
        let limits = TierLimits::for_tier(self.tier_of(user));
        let limit = limits.daily_profile_views;

        if limit == UNLIMITED {
            let used = self
                .counters
                .get_count(user.id, ActivityType::ProfileViews, self.today())
                .await
                .unwrap_or_else(|e| {
                    warn!("Counter read failed for user {}: {}", user.id, e);
                    0
                });
            return ViewQuota {
                allowed: true,
                used,
                limit,
                remaining: UNLIMITED,
            };
        }

        let used = match self
            .counters
            .get_count(user.id, ActivityType::ProfileViews, self.today())
            .await
        {
            Ok(used) => used,
            Err(e) => {
                error!(
                    "Counter store unavailable for user {}, denying view: {}",
                    user.id, e
                );
                return ViewQuota {
                    allowed: false,
                    used: limit,
                    limit,
                    remaining: 0,
                };
            }
        };

        ViewQuota {
            allowed: used < limit,
            used,
            limit,
            remaining: (limit - used).max(0),
        }
    }

    pub async fn can_view_profile(&self, user_id: i64) -> Result<ViewQuota> {
        let user = self.require_user(user_id).await?;
        Ok(self.view_quota(&user).await)
    }

    /// Check, then spend one view. Exactly one increment per call; a denied
    /// check is returned as-is without touching the ledger.
    pub async fn record_profile_view(&self, user_id: i64) -> Result<ViewQuota> {
        let user = self.require_user(user_id).await?;
        self.record_view_for(&user).await
    }

    pub async fn record_view_for(&self, user: &User) -> Result<ViewQuota> {
        let quota = self.view_quota(user).await;
        if !quota.allowed {
            return Ok(quota);
        }

        let used = self
            .counters
            .increment(user.id, ActivityType::ProfileViews, self.today())
            .await?;

        Ok(ViewQuota {
            allowed: true,
            used,
            limit: quota.limit,
            remaining: if quota.limit == UNLIMITED {
                UNLIMITED
            } else {
                (quota.limit - used).max(0)
            },
        })
    }

    // ========================================================================
    // MESSAGING POLICY
    // ========================================================================

    pub async fn can_send_message(&self, user_id: i64) -> Result<MessagePolicy> {
        let user = self.require_user(user_id).await?;
        Ok(self.message_policy(&user).await)
    }

    /// Free tier is denied before the ledger is consulted.
    pub async fn message_policy(&self, user: &User) -> MessagePolicy {
        let tier = self.tier_of(user);
        if tier == Tier::Free {
            return MessagePolicy {
                allowed: false,
                reason: Some(REASON_FREE_TIER.to_string()),
                remaining: None,
            };
        }

        let limits = TierLimits::for_tier(tier);
        if limits.daily_messages == UNLIMITED {
            return MessagePolicy {
                allowed: true,
                reason: None,
                remaining: Some(UNLIMITED),
            };
        }

        let used = match self
            .counters
            .get_count(user.id, ActivityType::MessagesSent, self.today())
            .await
        {
            Ok(used) => used,
            Err(e) => {
                error!(
                    "Counter store unavailable for user {}, denying message: {}",
                    user.id, e
                );
                return MessagePolicy {
                    allowed: false,
                    reason: Some(REASON_QUOTA_UNAVAILABLE.to_string()),
                    remaining: None,
                };
            }
        };

        if used >= limits.daily_messages {
            MessagePolicy {
                allowed: false,
                reason: Some(REASON_DAILY_LIMIT.to_string()),
                remaining: Some(0),
            }
        } else {
            MessagePolicy {
                allowed: true,
                reason: None,
                remaining: Some(limits.daily_messages - used),
            }
        }
    }

    // ========================================================================
    // ACTIVITY LEDGER
    // ========================================================================

    /// Atomic increment of today's counter for the given activity.
    pub async fn record_activity(&self, user_id: i64, activity: ActivityType) -> Result<i64> {
        self.counters.increment(user_id, activity, self.today()).await
    }

    /// String-typed entry point for callers outside the crate; unknown
    /// activity names are rejected before any state change.
    pub async fn record_activity_named(&self, user_id: i64, activity: &str) -> Result<i64> {
        let activity: ActivityType = activity.parse()?;
        self.record_activity(user_id, activity).await
    }

    // ========================================================================
    // FREE-TIER INTERACTION GATE
    // ========================================================================

    /// Free-to-free messaging is always blocked; free-to-paid is blocked
    /// unless the pair is already matched.
    pub async fn check_free_user_interaction(
        &self,
        sender_id: i64,
        recipient_id: i64,
    ) -> Result<InteractionCheck> {
        let (sender, recipient) = tokio::join!(
            self.users.find_user(sender_id),
            self.users.find_user(recipient_id)
        );
        let sender = sender?.ok_or_else(|| AppError::not_found(format!("user {}", sender_id)))?;
        let recipient =
            recipient?.ok_or_else(|| AppError::not_found(format!("user {}", recipient_id)))?;

        if self.tier_of(&sender) != Tier::Free {
            return Ok(InteractionCheck {
                requires_upgrade: false,
                reason: None,
            });
        }

        if self.tier_of(&recipient) == Tier::Free {
            return Ok(InteractionCheck {
                requires_upgrade: true,
                reason: Some(REASON_FREE_TO_FREE.to_string()),
            });
        }

        if self.pair_is_matched(sender_id, recipient_id).await? {
            Ok(InteractionCheck {
                requires_upgrade: false,
                reason: None,
            })
        } else {
            Ok(InteractionCheck {
                requires_upgrade: true,
                reason: Some(REASON_FREE_TIER.to_string()),
            })
        }
    }

    pub async fn pair_is_matched(&self, a: i64, b: i64) -> Result<bool> {
        let (first, second) = canonical_pair(a, b);
        let exists: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM amora.user_matches
            WHERE user_a_id = $1 AND user_b_id = $2 AND status = 'active'
            "#,
        )
        .bind(first)
        .bind(second)
        .fetch_optional(&self.db)
        .await?;
        Ok(exists.is_some())
    }

    // ========================================================================
    // USAGE SUMMARY
    // ========================================================================

    /// Read-only view of today's counters against the limits, for display.
    pub async fn get_daily_usage_summary(&self, user_id: i64) -> Result<DailyUsageSummary> {
        let user = self.require_user(user_id).await?;
        let tier = self.tier_of(&user);
        let limits = TierLimits::for_tier(tier);
        let today = self.today();

        let counts = self.counters.counts_for_day(user.id, today).await?;

        let usage = ActivityType::ALL
            .iter()
            .map(|activity| {
                let used = counts.get(activity).copied().unwrap_or(0);
                let limit = match activity {
                    ActivityType::ProfileViews => limits.daily_profile_views,
                    ActivityType::MessagesSent => limits.daily_messages,
                    _ => UNLIMITED,
                };
                UsageEntry {
                    activity: *activity,
                    used,
                    limit,
                    remaining: if limit == UNLIMITED {
                        UNLIMITED
                    } else {
                        (limit - used).max(0)
                    },
                }
            })
            .collect();

        Ok(DailyUsageSummary {
            date: today,
            tier,
            usage,
        })
    }

    async fn require_user(&self, user_id: i64) -> Result<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {}", user_id)))
    }
}
