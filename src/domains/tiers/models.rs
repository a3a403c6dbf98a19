//! Tiers, entitlement limits and policy decision shapes

use crate::models::{SubscriptionPlan, SubscriptionStatus};
use crate::shared::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for "no daily limit".
pub const UNLIMITED: i64 = -1;

pub const REASON_FREE_TIER: &str = "free_tier_restriction";
pub const REASON_FREE_TO_FREE: &str = "free_to_free_restriction";
pub const REASON_DAILY_LIMIT: &str = "daily_limit_reached";
pub const REASON_QUOTA_UNAVAILABLE: &str = "temporarily_unavailable";

// ======================================================================
// TIER
// ======================================================================

/// Derived subscription level. Never stored; recomputed from the user's
/// subscription columns on every policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Gold,
    Platinum,
}

impl Tier {
    /// A user whose subscription is not active, or whose expiry has passed,
    /// is always `Free` regardless of the stored plan.
    pub fn from_subscription(
        plan: SubscriptionPlan,
        status: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        if status != SubscriptionStatus::Active {
            return Tier::Free;
        }
        if let Some(expires) = expires_at {
            if expires <= now {
                return Tier::Free;
            }
        }
        match plan {
            SubscriptionPlan::None => Tier::Free,
            SubscriptionPlan::Basic => Tier::Basic,
            SubscriptionPlan::Gold => Tier::Gold,
            SubscriptionPlan::Platinum => Tier::Platinum,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ======================================================================
// LIMITS
// ======================================================================

/// Static per-tier entitlement table. The definitive policy source;
/// immutable at runtime.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TierLimits {
    pub daily_profile_views: i64,
    pub daily_messages: i64,
    pub can_access_contact_details: bool,
    pub ad_frequency: i32,
    pub has_elite_access: bool,
}

impl TierLimits {
    pub const fn for_tier(tier: Tier) -> TierLimits {
        match tier {
            Tier::Free => TierLimits {
                daily_profile_views: 10,
                daily_messages: 0,
                can_access_contact_details: false,
                ad_frequency: 5,
                has_elite_access: false,
            },
            Tier::Basic => TierLimits {
                daily_profile_views: 50,
                daily_messages: 30,
                can_access_contact_details: false,
                ad_frequency: 10,
                has_elite_access: false,
            },
            Tier::Gold => TierLimits {
                daily_profile_views: UNLIMITED,
                daily_messages: 100,
                can_access_contact_details: true,
                ad_frequency: 0,
                has_elite_access: false,
            },
            Tier::Platinum => TierLimits {
                daily_profile_views: UNLIMITED,
                daily_messages: UNLIMITED,
                can_access_contact_details: true,
                ad_frequency: 0,
                has_elite_access: true,
            },
        }
    }
}

// ======================================================================
// ACTIVITY LEDGER
// ======================================================================

/// Closed set of rate-limited activities tracked in the daily ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    ProfileViews,
    MessagesSent,
    LikesSent,
    MatchesCreated,
    ProfileUpdates,
}

impl ActivityType {
    pub const ALL: [ActivityType; 5] = [
        ActivityType::ProfileViews,
        ActivityType::MessagesSent,
        ActivityType::LikesSent,
        ActivityType::MatchesCreated,
        ActivityType::ProfileUpdates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::ProfileViews => "profile_views",
            ActivityType::MessagesSent => "messages_sent",
            ActivityType::LikesSent => "likes_sent",
            ActivityType::MatchesCreated => "matches_created",
            ActivityType::ProfileUpdates => "profile_updates",
        }
    }
}

impl std::str::FromStr for ActivityType {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "profile_views" => Ok(ActivityType::ProfileViews),
            "messages_sent" => Ok(ActivityType::MessagesSent),
            "likes_sent" => Ok(ActivityType::LikesSent),
            "matches_created" => Ok(ActivityType::MatchesCreated),
            "profile_updates" => Ok(ActivityType::ProfileUpdates),
            other => Err(AppError::validation(format!(
                "unknown activity type: {}",
                other
            ))),
        }
    }
}

// ======================================================================
// POLICY DECISIONS
// ======================================================================

/// Outcome of a profile-view quota check. A denial is a normal decision,
/// not an error.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ViewQuota {
    pub allowed: bool,
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagePolicy {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionCheck {
    pub requires_upgrade: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageEntry {
    pub activity: ActivityType,
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyUsageSummary {
    pub date: NaiveDate,
    pub tier: Tier,
    pub usage: Vec<UsageEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn inactive_status_is_always_free() {
        let now = Utc::now();
        for status in [SubscriptionStatus::Expired, SubscriptionStatus::None] {
            let tier = Tier::from_subscription(
                SubscriptionPlan::Platinum,
                status,
                Some(now + Duration::days(30)),
                now,
            );
            assert_eq!(tier, Tier::Free);
        }
    }

    #[test]
    fn past_expiry_is_free_even_when_status_still_active() {
        let now = Utc::now();
        let tier = Tier::from_subscription(
            SubscriptionPlan::Gold,
            SubscriptionStatus::Active,
            Some(now - Duration::hours(1)),
            now,
        );
        assert_eq!(tier, Tier::Free);
    }

    #[test]
    fn active_subscription_maps_to_stored_plan() {
        let now = Utc::now();
        let tier = Tier::from_subscription(
            SubscriptionPlan::Gold,
            SubscriptionStatus::Active,
            Some(now + Duration::days(10)),
            now,
        );
        assert_eq!(tier, Tier::Gold);

        // Missing expiry means no time bound on the subscription.
        let tier = Tier::from_subscription(
            SubscriptionPlan::Basic,
            SubscriptionStatus::Active,
            None,
            now,
        );
        assert_eq!(tier, Tier::Basic);
    }

    #[test]
    fn limits_table_matches_policy() {
        assert_eq!(TierLimits::for_tier(Tier::Free).daily_messages, 0);
        assert_eq!(TierLimits::for_tier(Tier::Basic).daily_messages, 30);
        assert_eq!(TierLimits::for_tier(Tier::Gold).daily_messages, 100);
        assert_eq!(TierLimits::for_tier(Tier::Platinum).daily_messages, UNLIMITED);
        assert_eq!(TierLimits::for_tier(Tier::Gold).daily_profile_views, UNLIMITED);
        assert!(!TierLimits::for_tier(Tier::Basic).can_access_contact_details);
        assert!(TierLimits::for_tier(Tier::Platinum).has_elite_access);
    }

    #[test]
    fn activity_type_rejects_unknown_names() {
        assert!("profile_views".parse::<ActivityType>().is_ok());
        assert!("likes_sent".parse::<ActivityType>().is_ok());
        assert!("password_resets".parse::<ActivityType>().is_err());
    }
}
