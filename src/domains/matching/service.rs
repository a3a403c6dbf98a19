//! Matching facade: browse-rate admission, quota gate, candidate retrieval,
//! scoring, ranking and output formatting.

use crate::domains::matching::models::{
    MatchCard, MatchFilters, MatchList, MatchingError, ProfileRecord, TierInfo,
};
use crate::domains::matching::query::MatchQueryBuilder;
use crate::domains::matching::scoring::compatibility_score;
use crate::domains::tiers::{Tier, TierLimits, UserTierService};
use crate::services::rate_limiter_service::{
    rate_limit_key_user_browse, RateLimitConfig, RateLimiter,
};
use crate::services::user_service::UserService;
use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 50;

/// Over-fetch factor giving the scorer a pool to rank and truncate from.
const POOL_FACTOR: i64 = 2;

pub struct MatchingService {
    db: PgPool,
    users: Arc<UserService>,
    tiers: Arc<UserTierService>,
    query: MatchQueryBuilder,
    rate_limiter: Arc<RateLimiter>,
    timezone: Tz,
}

impl MatchingService {
    pub fn new(
        db: PgPool,
        users: Arc<UserService>,
        tiers: Arc<UserTierService>,
        rate_limiter: Arc<RateLimiter>,
        timezone: Tz,
    ) -> Self {
        let query = MatchQueryBuilder::new(db.clone());
        Self {
            db,
            users,
            tiers,
            query,
            rate_limiter,
            timezone,
        }
    }

    /// Ranked compatibility matches for a user.
    pub async fn get_matches(
        &self,
        user_id: i64,
        filters: &MatchFilters,
        limit: Option<i64>,
    ) -> Result<MatchList, MatchingError> {
        self.run_pipeline(user_id, filters, None, limit).await
    }

    /// Name search over the same candidate pool. Ranks primarily by how the
    /// name matches (prefix beats substring), with the compatibility score as
    /// a light tiebreaker.
    pub async fn search_by_name(
        &self,
        user_id: i64,
        term: &str,
        filters: &MatchFilters,
        limit: Option<i64>,
    ) -> Result<MatchList, MatchingError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(MatchingError::Validation(
                "search term must not be empty".to_string(),
            ));
        }
        self.run_pipeline(user_id, filters, Some(term), limit).await
    }

    async fn run_pipeline(
        &self,
        user_id: i64,
        filters: &MatchFilters,
        name_term: Option<&str>,
        limit: Option<i64>,
    ) -> Result<MatchList, MatchingError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        // Browse limiter is distinct from the daily view quota; best-effort.
        let browse_key = rate_limit_key_user_browse(user_id);
        match self
            .rate_limiter
            .check_rate_limit(&browse_key, RateLimitConfig::BROWSE_PER_MINUTE_USER)
            .await
        {
            Ok(true) => {}
            Ok(false) => return Err(MatchingError::RateLimited),
            Err(e) => warn!("Browse rate-limit unavailable, allowing: {}", e),
        }

        let (user, profile) = tokio::join!(
            self.users.find_user(user_id),
            self.users.find_profile(user_id)
        );
        let user = user?.ok_or(MatchingError::UserNotFound)?;
        let profile = profile?.ok_or(MatchingError::UserNotFound)?;

        let tier = self.tiers.tier_of(&user);
        let limits = TierLimits::for_tier(tier);

        let quota = self.tiers.view_quota(&user).await;
        if !quota.allowed {
            return Err(MatchingError::ViewLimitReached {
                used: quota.used,
                limit: quota.limit,
            });
        }

        let gated = MatchQueryBuilder::gate_filters(tier, filters);
        let current_year = Utc::now().with_timezone(&self.timezone).year();

        let (candidates, total_potential) = tokio::join!(
            self.query.fetch_candidates(
                &user,
                &gated,
                name_term,
                current_year,
                limit * POOL_FACTOR
            ),
            self.query
                .count_candidates(&user, &gated, name_term, current_year)
        );
        let candidates = candidates?;
        let total_potential = total_potential?;

        let mut ranked: Vec<(f64, MatchCard)> = candidates
            .iter()
            .map(|candidate| {
                let score = compatibility_score(&profile, candidate, current_year);
                let rank = match name_term {
                    Some(term) => {
                        f64::from(name_match_strength(&candidate.display_name, term)) * 100.0
                            + 0.1 * score.total
                    }
                    None => score.total,
                };
                (rank, MatchCard::from_profile(candidate, score, current_year))
            })
            .collect();

        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut matches: Vec<MatchCard> = ranked
            .into_iter()
            .take(limit as usize)
            .map(|(_, card)| card)
            .collect();

        // Redaction applies regardless of what the query returned.
        if !limits.can_access_contact_details {
            for card in &mut matches {
                card.redact_contact();
            }
        }

        Ok(MatchList {
            matches,
            total_potential,
            can_message: tier != Tier::Free,
            tier_info: TierInfo {
                tier,
                views_remaining: quota.remaining,
                can_access_contact_details: limits.can_access_contact_details,
                has_elite_access: limits.has_elite_access,
                ad_frequency: limits.ad_frequency,
            },
        })
    }

    /// The user's active matches, newest first, formatted like the browse
    /// results (same contact redaction rules).
    pub async fn get_user_matches(
        &self,
        user_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<MatchCard>, MatchingError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let (user, profile) = tokio::join!(
            self.users.find_user(user_id),
            self.users.find_profile(user_id)
        );
        let user = user?.ok_or(MatchingError::UserNotFound)?;
        let profile = profile?.ok_or(MatchingError::UserNotFound)?;

        let tier = self.tiers.tier_of(&user);
        let limits = TierLimits::for_tier(tier);
        let current_year = Utc::now().with_timezone(&self.timezone).year();

        let counterparts: Vec<ProfileRecord> = sqlx::query_as(
            r#"
            SELECT
                u.id AS user_id,
                u.display_name,
                u.gender,
                p.dob_year, p.city, p.state, p.country, p.religion,
                p.education_level, p.marital_status, p.employment_status,
                p.income_range, p.height_cm, p.ethnicity, p.smoking, p.drinking,
                p.children_preference, p.interests_entertainment, p.interests_food,
                p.interests_music, p.interests_sports, p.phone, p.email,
                p.whatsapp, p.primary_photo_url, p.pref_age_min, p.pref_age_max,
                p.pref_education, p.pref_religious_practice, p.pref_marital_status
            FROM amora.user_matches m
            INNER JOIN amora.users u
                ON u.id = CASE WHEN m.user_a_id = $1 THEN m.user_b_id ELSE m.user_a_id END
            INNER JOIN amora.user_profiles p ON p.user_id = u.id
            WHERE (m.user_a_id = $1 OR m.user_b_id = $1)
              AND m.status = 'active'
            ORDER BY m.matched_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let mut cards: Vec<MatchCard> = counterparts
            .iter()
            .map(|candidate| {
                let score = compatibility_score(&profile, candidate, current_year);
                MatchCard::from_profile(candidate, score, current_year)
            })
            .collect();

        if !limits.can_access_contact_details {
            for card in &mut cards {
                card.redact_contact();
            }
        }

        Ok(cards)
    }
}

/// Prefix match outranks substring match outranks no match.
fn name_match_strength(name: &str, term: &str) -> i32 {
    let name = name.to_lowercase();
    let term = term.to_lowercase();
    if name.starts_with(&term) {
        2
    } else if name.contains(&term) {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::matching::scoring::{CompatibilityScore, ScoreBreakdown};

    #[test]
    fn name_strength_ranks_prefix_over_substring() {
        assert_eq!(name_match_strength("Adaeze", "ada"), 2);
        assert_eq!(name_match_strength("Saadah", "ada"), 1);
        assert_eq!(name_match_strength("Bisi", "ada"), 0);
    }

    #[test]
    fn redaction_strips_contact_fields() {
        let mut card = MatchCard {
            user_id: 1,
            display_name: "Ada".into(),
            age: Some(30),
            city: Some("Lagos".into()),
            country: Some("Nigeria".into()),
            photo_url: Some("https://cdn.example/p.jpg".into()),
            compatibility: CompatibilityScore {
                total: 80.0,
                breakdown: ScoreBreakdown {
                    age: 100.0,
                    location: 100.0,
                    religion: 50.0,
                    education: 50.0,
                    interests: 50.0,
                    lifestyle: 50.0,
                    preference_bonus: 0.0,
                },
            },
            phone: Some("+23480000".into()),
            email: Some("ada@example.com".into()),
            whatsapp: Some("+23480000".into()),
        };

        card.redact_contact();
        assert!(card.phone.is_none());
        assert!(card.email.is_none());
        assert!(card.whatsapp.is_none());
        // Non-contact fields survive redaction.
        assert_eq!(card.city.as_deref(), Some("Lagos"));
    }
}
