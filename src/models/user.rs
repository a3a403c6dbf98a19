//! Core user entity as read from the user store.
//!
//! The subscription columns are stored as free-form text; the typed
//! accessors below normalize them, treating anything unrecognized as the
//! absent value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    None,
    Basic,
    Gold,
    Platinum,
}

impl SubscriptionPlan {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("basic") => Self::Basic,
            Some("gold") => Self::Gold,
            Some("platinum") => Self::Platinum,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    None,
}

impl SubscriptionStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("active") => Self::Active,
            Some("expired") => Self::Expired,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    pub gender: Option<String>,
    pub is_admin: bool,
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn plan(&self) -> SubscriptionPlan {
        SubscriptionPlan::parse(self.subscription_plan.as_deref())
    }

    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::parse(self.subscription_status.as_deref())
    }

    /// Normalized binary gender, when declared. Additional gender
    /// configurations fall through to `None` and skip the opposite-gender
    /// candidate restriction.
    pub fn binary_gender(&self) -> Option<&'static str> {
        match self
            .gender
            .as_deref()
            .map(|g| g.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("male") | Some("m") => Some("male"),
            Some("female") | Some("f") => Some("female"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_parse_is_lenient() {
        assert_eq!(SubscriptionPlan::parse(Some("  Gold ")), SubscriptionPlan::Gold);
        assert_eq!(SubscriptionPlan::parse(Some("PLATINUM")), SubscriptionPlan::Platinum);
        assert_eq!(SubscriptionPlan::parse(Some("trial")), SubscriptionPlan::None);
        assert_eq!(SubscriptionPlan::parse(None), SubscriptionPlan::None);
    }

    #[test]
    fn status_parse_defaults_to_none() {
        assert_eq!(SubscriptionStatus::parse(Some("active")), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::parse(Some("cancelled")), SubscriptionStatus::None);
    }
}
