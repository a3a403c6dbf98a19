//! Candidate retrieval for the matching pipeline.
//!
//! Builds the filterable, tier-gated candidate query. Filters above the
//! requester's tier are dropped silently rather than rejected, matching the
//! platform's graceful-degradation behavior.

use crate::domains::matching::models::{MatchFilters, MatchingError, ProfileRecord};
use crate::domains::tiers::Tier;
use crate::models::User;
use sqlx::PgPool;
use tracing::debug;

const CANDIDATE_COLUMNS: &str = r#"
    u.id AS user_id,
    u.display_name,
    u.gender,
    p.dob_year,
    p.city,
    p.state,
    p.country,
    p.religion,
    p.education_level,
    p.marital_status,
    p.employment_status,
    p.income_range,
    p.height_cm,
    p.ethnicity,
    p.smoking,
    p.drinking,
    p.children_preference,
    p.interests_entertainment,
    p.interests_food,
    p.interests_music,
    p.interests_sports,
    p.phone,
    p.email,
    p.whatsapp,
    p.primary_photo_url,
    p.pref_age_min,
    p.pref_age_max,
    p.pref_education,
    p.pref_religious_practice,
    p.pref_marital_status
"#;

pub struct MatchQueryBuilder {
    db: PgPool,
}

impl MatchQueryBuilder {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Drop filters the tier does not unlock. Lenient on purpose: callers get
    /// results for the filters they are entitled to instead of an error.
    pub fn gate_filters(tier: Tier, filters: &MatchFilters) -> MatchFilters {
        let mut gated = filters.clone();

        if !matches!(tier, Tier::Gold | Tier::Platinum) {
            if gated.education_level.take().is_some()
                | gated.employment_status.take().is_some()
                | gated.income_range.take().is_some()
            {
                debug!("Dropping gold filters for {} tier requester", tier);
            }
        }

        if tier != Tier::Platinum {
            let had_platinum = gated.height_min_cm.take().is_some()
                | gated.height_max_cm.take().is_some()
                | gated.ethnicity.take().is_some()
                | gated.smoking.take().is_some()
                | gated.drinking.take().is_some()
                | gated.elite_only;
            gated.elite_only = false;
            if had_platinum {
                debug!("Dropping platinum filters for {} tier requester", tier);
            }
        }

        gated
    }

    /// Fetch the unordered candidate pool, over-fetched so the scorer has a
    /// pool to rank and truncate from. `filters` must already be gated.
    pub async fn fetch_candidates(
        &self,
        requester: &User,
        filters: &MatchFilters,
        name_term: Option<&str>,
        current_year: i32,
        fetch_limit: i64,
    ) -> Result<Vec<ProfileRecord>, MatchingError> {
        let mut param = 1;
        let where_clause = build_where_clause(requester, filters, name_term, &mut param);
        let limit_param = param;

        let sql = format!(
            r#"
            SELECT {columns}
            FROM amora.users u
            INNER JOIN amora.user_profiles p ON p.user_id = u.id
            {where_clause}
            LIMIT ${limit_param}
            "#,
            columns = CANDIDATE_COLUMNS,
            where_clause = where_clause,
            limit_param = limit_param,
        );

        let query = sqlx::query_as::<_, ProfileRecord>(&sql);
        let query = bind_filters(query, requester, filters, name_term, current_year);
        let rows = query.bind(fetch_limit).fetch_all(&self.db).await?;

        Ok(rows)
    }

    /// Size of the full candidate pool for the same filters, ignoring the
    /// over-fetch cap.
    pub async fn count_candidates(
        &self,
        requester: &User,
        filters: &MatchFilters,
        name_term: Option<&str>,
        current_year: i32,
    ) -> Result<i64, MatchingError> {
        let mut param = 1;
        let where_clause = build_where_clause(requester, filters, name_term, &mut param);

        let sql = format!(
            r#"
            SELECT COUNT(*)
            FROM amora.users u
            INNER JOIN amora.user_profiles p ON p.user_id = u.id
            {where_clause}
            "#,
            where_clause = where_clause,
        );

        let query = sqlx::query_scalar::<_, i64>(&sql);
        let query = bind_count_filters(query, requester, filters, name_term, current_year);
        let total = query.fetch_one(&self.db).await?;

        Ok(total)
    }
}

/// Shared WHERE clause for the select and count queries. Parameter numbers
/// are allocated here; the bind functions below must follow the same order.
fn build_where_clause(
    requester: &User,
    filters: &MatchFilters,
    name_term: Option<&str>,
    param: &mut usize,
) -> String {
    let mut clause = String::from(
        r#"
        WHERE u.id != $1
          AND u.is_admin = FALSE
          AND p.primary_photo_url IS NOT NULL
          AND p.primary_photo_url <> ''
        "#,
    );
    *param += 1;

    if requester.binary_gender().is_some() {
        clause.push_str(&format!(" AND LOWER(u.gender) = ${}", param));
        *param += 1;
    }
    if filters.age_min.is_some() {
        // Older bound on age is the lower bound on birth year.
        clause.push_str(&format!(" AND p.dob_year <= ${}", param));
        *param += 1;
    }
    if filters.age_max.is_some() {
        clause.push_str(&format!(" AND p.dob_year >= ${}", param));
        *param += 1;
    }
    if filters.location.is_some() {
        clause.push_str(&format!(
            " AND (p.city ILIKE ${p} OR p.state ILIKE ${p} OR p.country ILIKE ${p})",
            p = param
        ));
        *param += 1;
    }
    if filters.marital_status.is_some() {
        clause.push_str(&format!(" AND LOWER(p.marital_status) = LOWER(${})", param));
        *param += 1;
    }
    if filters.religion.is_some() {
        clause.push_str(&format!(" AND LOWER(p.religion) = LOWER(${})", param));
        *param += 1;
    }
    if filters.education_level.is_some() {
        clause.push_str(&format!(" AND LOWER(p.education_level) = LOWER(${})", param));
        *param += 1;
    }
    if filters.employment_status.is_some() {
        clause.push_str(&format!(
            " AND LOWER(p.employment_status) = LOWER(${})",
            param
        ));
        *param += 1;
    }
    if filters.income_range.is_some() {
        clause.push_str(&format!(" AND LOWER(p.income_range) = LOWER(${})", param));
        *param += 1;
    }
    if filters.height_min_cm.is_some() {
        clause.push_str(&format!(" AND p.height_cm >= ${}", param));
        *param += 1;
    }
    if filters.height_max_cm.is_some() {
        clause.push_str(&format!(" AND p.height_cm <= ${}", param));
        *param += 1;
    }
    if filters.ethnicity.is_some() {
        clause.push_str(&format!(" AND LOWER(p.ethnicity) = LOWER(${})", param));
        *param += 1;
    }
    if filters.smoking.is_some() {
        clause.push_str(&format!(" AND LOWER(p.smoking) = LOWER(${})", param));
        *param += 1;
    }
    if filters.drinking.is_some() {
        clause.push_str(&format!(" AND LOWER(p.drinking) = LOWER(${})", param));
        *param += 1;
    }
    if filters.elite_only {
        // Same expiry-aware check as tier derivation.
        clause.push_str(
            r#"
          AND LOWER(u.subscription_plan) = 'platinum'
          AND LOWER(u.subscription_status) = 'active'
          AND (u.subscription_expires_at IS NULL OR u.subscription_expires_at > NOW())
            "#,
        );
    }
    if name_term.is_some() {
        clause.push_str(&format!(" AND u.display_name ILIKE ${}", param));
        *param += 1;
    }

    clause
}

fn opposite_gender(requester: &User) -> Option<&'static str> {
    match requester.binary_gender() {
        Some("male") => Some("female"),
        Some("female") => Some("male"),
        _ => None,
    }
}

// The two bind helpers mirror build_where_clause exactly; keep all three in
// the same order when adding a filter.

fn bind_filters<'q>(
    mut query: sqlx::query::QueryAs<'q, sqlx::Postgres, ProfileRecord, sqlx::postgres::PgArguments>,
    requester: &'q User,
    filters: &'q MatchFilters,
    name_term: Option<&'q str>,
    current_year: i32,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, ProfileRecord, sqlx::postgres::PgArguments> {
    query = query.bind(requester.id);
    if let Some(gender) = opposite_gender(requester) {
        query = query.bind(gender);
    }
    if let Some(age_min) = filters.age_min {
        query = query.bind(current_year - age_min);
    }
    if let Some(age_max) = filters.age_max {
        query = query.bind(current_year - age_max);
    }
    if let Some(location) = &filters.location {
        query = query.bind(format!("%{}%", location));
    }
    if let Some(v) = &filters.marital_status {
        query = query.bind(v);
    }
    if let Some(v) = &filters.religion {
        query = query.bind(v);
    }
    if let Some(v) = &filters.education_level {
        query = query.bind(v);
    }
    if let Some(v) = &filters.employment_status {
        query = query.bind(v);
    }
    if let Some(v) = &filters.income_range {
        query = query.bind(v);
    }
    if let Some(v) = filters.height_min_cm {
        query = query.bind(v);
    }
    if let Some(v) = filters.height_max_cm {
        query = query.bind(v);
    }
    if let Some(v) = &filters.ethnicity {
        query = query.bind(v);
    }
    if let Some(v) = &filters.smoking {
        query = query.bind(v);
    }
    if let Some(v) = &filters.drinking {
        query = query.bind(v);
    }
    if let Some(term) = name_term {
        query = query.bind(format!("%{}%", term));
    }
    query
}

fn bind_count_filters<'q>(
    mut query: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    requester: &'q User,
    filters: &'q MatchFilters,
    name_term: Option<&'q str>,
    current_year: i32,
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    query = query.bind(requester.id);
    if let Some(gender) = opposite_gender(requester) {
        query = query.bind(gender);
    }
    if let Some(age_min) = filters.age_min {
        query = query.bind(current_year - age_min);
    }
    if let Some(age_max) = filters.age_max {
        query = query.bind(current_year - age_max);
    }
    if let Some(location) = &filters.location {
        query = query.bind(format!("%{}%", location));
    }
    if let Some(v) = &filters.marital_status {
        query = query.bind(v);
    }
    if let Some(v) = &filters.religion {
        query = query.bind(v);
    }
    if let Some(v) = &filters.education_level {
        query = query.bind(v);
    }
    if let Some(v) = &filters.employment_status {
        query = query.bind(v);
    }
    if let Some(v) = &filters.income_range {
        query = query.bind(v);
    }
    if let Some(v) = filters.height_min_cm {
        query = query.bind(v);
    }
    if let Some(v) = filters.height_max_cm {
        query = query.bind(v);
    }
    if let Some(v) = &filters.ethnicity {
        query = query.bind(v);
    }
    if let Some(v) = &filters.smoking {
        query = query.bind(v);
    }
    if let Some(v) = &filters.drinking {
        query = query.bind(v);
    }
    if let Some(term) = name_term {
        query = query.bind(format!("%{}%", term));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_filters() -> MatchFilters {
        MatchFilters {
            age_min: Some(25),
            age_max: Some(35),
            location: Some("Lagos".into()),
            marital_status: Some("single".into()),
            religion: Some("Christianity".into()),
            education_level: Some("Masters".into()),
            employment_status: Some("employed".into()),
            income_range: Some("100k+".into()),
            height_min_cm: Some(160),
            height_max_cm: Some(190),
            ethnicity: Some("Yoruba".into()),
            smoking: Some("no".into()),
            drinking: Some("socially".into()),
            elite_only: true,
        }
    }

    #[test]
    fn free_tier_keeps_only_basic_filters() {
        let gated = MatchQueryBuilder::gate_filters(Tier::Free, &full_filters());
        assert_eq!(gated.age_min, Some(25));
        assert_eq!(gated.location.as_deref(), Some("Lagos"));
        assert_eq!(gated.religion.as_deref(), Some("Christianity"));
        assert!(gated.education_level.is_none());
        assert!(gated.employment_status.is_none());
        assert!(gated.income_range.is_none());
        assert!(gated.height_min_cm.is_none());
        assert!(gated.ethnicity.is_none());
        assert!(gated.smoking.is_none());
        assert!(!gated.elite_only);
    }

    #[test]
    fn gold_tier_unlocks_gold_but_not_platinum_filters() {
        let gated = MatchQueryBuilder::gate_filters(Tier::Gold, &full_filters());
        assert_eq!(gated.education_level.as_deref(), Some("Masters"));
        assert_eq!(gated.income_range.as_deref(), Some("100k+"));
        assert!(gated.height_max_cm.is_none());
        assert!(gated.drinking.is_none());
        assert!(!gated.elite_only);
    }

    #[test]
    fn platinum_tier_keeps_everything() {
        let gated = MatchQueryBuilder::gate_filters(Tier::Platinum, &full_filters());
        assert_eq!(gated.height_min_cm, Some(160));
        assert_eq!(gated.smoking.as_deref(), Some("no"));
        assert!(gated.elite_only);
    }

    #[test]
    fn where_clause_parameters_line_up_with_binds() {
        let requester = User {
            id: 1,
            display_name: "a".into(),
            gender: Some("female".into()),
            is_admin: false,
            subscription_plan: Some("platinum".into()),
            subscription_status: Some("active".into()),
            subscription_expires_at: None,
            created_at: None,
            updated_at: None,
        };
        let filters = full_filters();
        let mut param = 1;
        let clause = build_where_clause(&requester, &filters, Some("ada"), &mut param);

        // $1 requester, $2 gender, $3-$15 filters, $16 name term; next is the limit
        assert_eq!(param, 17);
        assert!(clause.contains("LOWER(u.gender) = $2"));
        assert!(clause.contains("u.display_name ILIKE $16"));
        assert!(clause.contains("subscription_expires_at IS NULL"));
    }

    #[test]
    fn unfiltered_clause_only_binds_requester() {
        let requester = User {
            id: 9,
            display_name: "b".into(),
            gender: Some("nonbinary".into()),
            is_admin: false,
            subscription_plan: None,
            subscription_status: None,
            subscription_expires_at: None,
            created_at: None,
            updated_at: None,
        };
        let mut param = 1;
        let clause = build_where_clause(&requester, &MatchFilters::default(), None, &mut param);
        assert_eq!(param, 2);
        // Non-binary requester gets no opposite-gender restriction.
        assert!(!clause.contains("u.gender"));
        assert!(clause.contains("u.is_admin = FALSE"));
        assert!(clause.contains("primary_photo_url IS NOT NULL"));
    }
}
