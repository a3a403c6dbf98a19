//! User store access.
//!
//! The user table is owned by the wider platform; this core reads it and,
//! as the one sanctioned write, lazily corrects a lapsed `active`
//! subscription status.

use crate::domains::matching::models::ProfileRecord;
use crate::models::User;
use crate::shared::Result;
use sqlx::PgPool;
use std::time::Duration;
use tracing::warn;

/// Reads are idempotent, so one transparent retry is safe. Writes never
/// retry here; the caller owns that decision.
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        match self.find_user_once(user_id).await {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!("Retrying user read for {} after error: {}", user_id, e);
                tokio::time::sleep(READ_RETRY_DELAY).await;
                self.find_user_once(user_id).await
            }
        }
    }

    async fn find_user_once(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, display_name, gender, COALESCE(is_admin, FALSE) AS is_admin,
                   subscription_plan, subscription_status, subscription_expires_at,
                   created_at, updated_at
            FROM amora.users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    pub async fn find_profile(&self, user_id: i64) -> Result<Option<ProfileRecord>> {
        match self.find_profile_once(user_id).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                warn!("Retrying profile read for {} after error: {}", user_id, e);
                tokio::time::sleep(READ_RETRY_DELAY).await;
                self.find_profile_once(user_id).await
            }
        }
    }

    async fn find_profile_once(&self, user_id: i64) -> Result<Option<ProfileRecord>> {
        let profile = sqlx::query_as::<_, ProfileRecord>(
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
            FROM amora.users u
            INNER JOIN amora.user_profiles p ON p.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(profile)
    }

    /// Flip a stale `active` status to `expired`. Returns whether a row was
    /// actually corrected; the guard keeps concurrent corrections idempotent.
    pub async fn mark_subscription_expired(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE amora.users
            SET subscription_status = 'expired', updated_at = NOW()
            WHERE id = $1
              AND subscription_status = 'active'
              AND subscription_expires_at IS NOT NULL
              AND subscription_expires_at <= NOW()
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
