//! Models of the matching domain

use crate::domains::matching::scoring::CompatibilityScore;
use crate::domains::tiers::Tier;
use crate::shared::AppError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ======================================================================
// PROFILES
// ======================================================================

/// A user's profile as the scorer and the candidate query see it. The same
/// shape serves the requester (including their stated preferences) and every
/// candidate row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRecord {
    pub user_id: i64,
    pub display_name: String,
    pub gender: Option<String>,
    pub dob_year: Option<i32>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub religion: Option<String>,
    pub education_level: Option<String>,
    pub marital_status: Option<String>,
    pub employment_status: Option<String>,
    pub income_range: Option<String>,
    pub height_cm: Option<i32>,
    pub ethnicity: Option<String>,
    pub smoking: Option<String>,
    pub drinking: Option<String>,
    pub children_preference: Option<String>,
    pub interests_entertainment: Option<String>,
    pub interests_food: Option<String>,
    pub interests_music: Option<String>,
    pub interests_sports: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub whatsapp: Option<String>,
    pub primary_photo_url: Option<String>,
    pub pref_age_min: Option<i32>,
    pub pref_age_max: Option<i32>,
    pub pref_education: Option<String>,
    pub pref_religious_practice: Option<String>,
    pub pref_marital_status: Option<String>,
}

// ======================================================================
// FILTERS
// ======================================================================

/// Candidate filters. Basic filters apply at every tier; the rest are gated
/// and silently dropped when the requester's tier does not unlock them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MatchFilters {
    // Basic (all tiers)
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub location: Option<String>,
    pub marital_status: Option<String>,
    pub religion: Option<String>,

    // Gold and above
    pub education_level: Option<String>,
    pub employment_status: Option<String>,
    pub income_range: Option<String>,

    // Platinum only
    pub height_min_cm: Option<i32>,
    pub height_max_cm: Option<i32>,
    pub ethnicity: Option<String>,
    pub smoking: Option<String>,
    pub drinking: Option<String>,
    #[serde(default)]
    pub elite_only: bool,
}

// ======================================================================
// RESULTS
// ======================================================================

/// One ranked candidate as returned to the caller. Contact fields are
/// redacted for viewers without the contact-details entitlement.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCard {
    pub user_id: i64,
    pub display_name: String,
    pub age: Option<i32>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub photo_url: Option<String>,
    pub compatibility: CompatibilityScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
}

impl MatchCard {
    pub fn from_profile(
        profile: &ProfileRecord,
        compatibility: CompatibilityScore,
        current_year: i32,
    ) -> Self {
        Self {
            user_id: profile.user_id,
            display_name: profile.display_name.clone(),
            age: profile.dob_year.map(|y| current_year - y),
            city: profile.city.clone(),
            country: profile.country.clone(),
            photo_url: profile.primary_photo_url.clone(),
            compatibility,
            phone: profile.phone.clone(),
            email: profile.email.clone(),
            whatsapp: profile.whatsapp.clone(),
        }
    }

    pub fn redact_contact(&mut self) {
        self.phone = None;
        self.email = None;
        self.whatsapp = None;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierInfo {
    pub tier: Tier,
    pub views_remaining: i64,
    pub can_access_contact_details: bool,
    pub has_elite_access: bool,
    pub ad_frequency: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchList {
    pub matches: Vec<MatchCard>,
    pub total_potential: i64,
    pub can_message: bool,
    pub tier_info: TierInfo,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeResult {
    pub success: bool,
    pub match_created: bool,
    pub can_message: bool,
}

// ======================================================================
// ERRORS
// ======================================================================

#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("You already liked this profile")]
    AlreadyLiked,

    #[error("You are already matched with this profile")]
    AlreadyMatched,

    #[error("Profile not found")]
    TargetNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Too many requests, try again in a moment")]
    RateLimited,

    #[error("Daily profile view limit reached ({used}/{limit})")]
    ViewLimitReached { used: i64, limit: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for MatchingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<AppError> for MatchingError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation { message } => Self::Validation(message),
            AppError::Database(e) => Self::Database(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
