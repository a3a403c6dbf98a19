// ============================================================================
// CORE FLOW TESTS - tier policy + like/match coordination
// ============================================================================
//
// These run against live PostgreSQL and Redis (DATABASE_URL / REDIS_URL) and
// skip quietly when neither is reachable, so the unit suite stays green on a
// bare checkout.

mod support;

use amora_core::domains::matching::MatchingError;
use amora_core::domains::tiers::{ActivityType, Tier};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use support::setup;
use uuid::Uuid;

struct TestUser {
    plan: &'static str,
    status: &'static str,
    gender: &'static str,
    expires_in_days: i64,
    is_admin: bool,
    with_photo: bool,
    display_name: String,
    religion: Option<String>,
}

impl TestUser {
    fn new(plan: &'static str, status: &'static str, gender: &'static str) -> Self {
        Self {
            plan,
            status,
            gender,
            expires_in_days: 30,
            is_admin: false,
            with_photo: true,
            display_name: format!("test-{}", Uuid::new_v4()),
            religion: None,
        }
    }
}

async fn create_user(db: &PgPool, spec: TestUser) -> i64 {
    let expires_at = Utc::now() + Duration::days(spec.expires_in_days);
    let user_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO amora.users
            (display_name, gender, is_admin, subscription_plan, subscription_status, subscription_expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&spec.display_name)
    .bind(spec.gender)
    .bind(spec.is_admin)
    .bind(spec.plan)
    .bind(spec.status)
    .bind(expires_at)
    .fetch_one(db)
    .await
    .expect("failed to create test user");

    let photo = if spec.with_photo {
        Some(format!("https://cdn.example/{}.jpg", user_id))
    } else {
        None
    };
    sqlx::query(
        r#"
        INSERT INTO amora.user_profiles (user_id, dob_year, city, country, religion, primary_photo_url, phone, email)
        VALUES ($1, 1992, 'Lagos', 'Nigeria', $2, $3, '+2348000000', 'test@example.com')
        "#,
    )
    .bind(user_id)
    .bind(&spec.religion)
    .bind(photo)
    .execute(db)
    .await
    .expect("failed to create test profile");

    user_id
}

async fn match_count(db: &PgPool, a: i64, b: i64) -> i64 {
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM amora.user_matches WHERE user_a_id = $1 AND user_b_id = $2",
    )
    .bind(first)
    .bind(second)
    .fetch_one(db)
    .await
    .expect("failed to count matches")
}

// ============================================================================
// LIKE / MATCH COORDINATION
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opposite_likes_create_exactly_one_match() {
    let Some(state) = setup().await else { return };
    let db = &state.db_pool;

    let a = create_user(db, TestUser::new("platinum", "active", "male")).await;
    let b = create_user(db, TestUser::new("platinum", "active", "female")).await;

    let likes_ab = state.like_service.clone();
    let likes_ba = state.like_service.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { likes_ab.like(a, b).await }),
        tokio::spawn(async move { likes_ba.like(b, a).await }),
    );
    let r1 = r1.expect("task panicked").expect("like(a,b) failed");
    let r2 = r2.expect("task panicked").expect("like(b,a) failed");

    // Exactly one of the two racing calls observes the mutual like.
    assert!(
        r1.match_created ^ r2.match_created,
        "exactly one call must create the match (got {} / {})",
        r1.match_created,
        r2.match_created
    );
    assert_eq!(match_count(db, a, b).await, 1);

    let statuses: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT status FROM amora.user_likes
        WHERE (user_id = $1 AND liked_user_id = $2) OR (user_id = $2 AND liked_user_id = $1)
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_all(db)
    .await
    .expect("failed to read like rows");
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s == "matched"));
}

#[tokio::test]
async fn repeated_like_is_rejected_and_changes_nothing() {
    let Some(state) = setup().await else { return };
    let db = &state.db_pool;

    let a = create_user(db, TestUser::new("gold", "active", "male")).await;
    let b = create_user(db, TestUser::new("basic", "active", "female")).await;

    let first = state.like_service.like(a, b).await.expect("first like failed");
    assert!(first.success);
    assert!(!first.match_created);

    let second = state.like_service.like(a, b).await;
    assert!(matches!(second, Err(MatchingError::AlreadyLiked)));
    assert_eq!(match_count(db, a, b).await, 0);
}

#[tokio::test]
async fn sequential_mutual_likes_match_once() {
    let Some(state) = setup().await else { return };
    let db = &state.db_pool;

    let a = create_user(db, TestUser::new("gold", "active", "male")).await;
    let b = create_user(db, TestUser::new("gold", "active", "female")).await;

    let first = state.like_service.like(a, b).await.expect("like(a,b) failed");
    assert!(!first.match_created);

    let second = state.like_service.like(b, a).await.expect("like(b,a) failed");
    assert!(second.match_created);
    assert!(second.can_message);
    assert_eq!(match_count(db, a, b).await, 1);

    // A third attempt in either direction conflicts.
    let third = state.like_service.like(a, b).await;
    assert!(matches!(third, Err(MatchingError::AlreadyLiked)));
}

#[tokio::test]
async fn liking_a_missing_profile_is_target_not_found() {
    let Some(state) = setup().await else { return };
    let a = create_user(&state.db_pool, TestUser::new("gold", "active", "male")).await;

    let result = state.like_service.like(a, i64::MAX - 17).await;
    assert!(matches!(result, Err(MatchingError::TargetNotFound)));
}

// ============================================================================
// TIER POLICY
// ============================================================================

#[tokio::test]
async fn expired_subscription_derives_free_tier() {
    let Some(state) = setup().await else { return };
    let db = &state.db_pool;

    let mut spec = TestUser::new("platinum", "active", "male");
    spec.expires_in_days = -1;
    let user_id = create_user(db, spec).await;

    let tier = state.tier_service.get_tier(user_id).await.expect("get_tier failed");
    assert_eq!(tier, Tier::Free);

    // The stored plan is irrelevant once the status is not active.
    let basic_expired = {
        let mut spec = TestUser::new("gold", "expired", "female");
        spec.expires_in_days = 30;
        create_user(db, spec).await
    };
    let tier = state
        .tier_service
        .get_tier(basic_expired)
        .await
        .expect("get_tier failed");
    assert_eq!(tier, Tier::Free);
}

#[tokio::test]
async fn free_tier_messaging_is_denied_before_any_quota() {
    let Some(state) = setup().await else { return };

    let user_id = create_user(&state.db_pool, TestUser::new("none", "none", "female")).await;

    let policy = state
        .tier_service
        .can_send_message(user_id)
        .await
        .expect("can_send_message failed");
    assert!(!policy.allowed);
    assert_eq!(policy.reason.as_deref(), Some("free_tier_restriction"));
}

#[tokio::test]
async fn message_quota_carries_over_a_same_day_upgrade() {
    let Some(state) = setup().await else { return };
    let db = &state.db_pool;

    let user_id = create_user(db, TestUser::new("basic", "active", "male")).await;

    // Basic allows 30/day; burn the whole allowance in the ledger directly.
    sqlx::query(
        r#"
        INSERT INTO amora.daily_activity_counters (user_id, activity_type, activity_date, count)
        VALUES ($1, 'messages_sent', $2, 30)
        "#,
    )
    .bind(user_id)
    .bind(Utc::now().date_naive())
    .execute(db)
    .await
    .expect("failed to seed counter");

    let policy = state
        .tier_service
        .can_send_message(user_id)
        .await
        .expect("can_send_message failed");
    assert!(!policy.allowed);
    assert_eq!(policy.remaining, Some(0));

    // Same-day upgrade to gold: limit becomes 100, today's usage carries over.
    sqlx::query("UPDATE amora.users SET subscription_plan = 'gold' WHERE id = $1")
        .bind(user_id)
        .execute(db)
        .await
        .expect("failed to upgrade user");

    let policy = state
        .tier_service
        .can_send_message(user_id)
        .await
        .expect("can_send_message failed");
    assert!(policy.allowed);
    assert_eq!(policy.remaining, Some(70));
}

#[tokio::test]
async fn record_activity_is_monotonic() {
    let Some(state) = setup().await else { return };

    let user_id = create_user(&state.db_pool, TestUser::new("basic", "active", "male")).await;

    let first = state
        .tier_service
        .record_activity(user_id, ActivityType::ProfileUpdates)
        .await
        .expect("first increment failed");
    let second = state
        .tier_service
        .record_activity(user_id, ActivityType::ProfileUpdates)
        .await
        .expect("second increment failed");
    assert_eq!(second, first + 1);

    let rejected = state
        .tier_service
        .record_activity_named(user_id, "password_resets")
        .await;
    assert!(rejected.is_err());
}

#[tokio::test]
async fn view_quota_exhausts_at_the_free_limit() {
    let Some(state) = setup().await else { return };

    let user_id = create_user(&state.db_pool, TestUser::new("none", "none", "male")).await;

    for i in 0..10 {
        let quota = state
            .tier_service
            .record_profile_view(user_id)
            .await
            .expect("record_profile_view failed");
        assert!(quota.allowed, "view {} should be allowed", i + 1);
        assert_eq!(quota.used, i64::from(i) + 1);
    }

    let quota = state
        .tier_service
        .can_view_profile(user_id)
        .await
        .expect("can_view_profile failed");
    assert!(!quota.allowed);
    assert_eq!(quota.remaining, 0);

    // Recording once more must not spend past the limit.
    let denied = state
        .tier_service
        .record_profile_view(user_id)
        .await
        .expect("record_profile_view failed");
    assert!(!denied.allowed);
    assert_eq!(denied.used, 10);
}

#[tokio::test]
async fn free_to_free_interaction_requires_upgrade_even_when_matched() {
    let Some(state) = setup().await else { return };
    let db = &state.db_pool;

    let a = create_user(db, TestUser::new("none", "none", "male")).await;
    let b = create_user(db, TestUser::new("none", "none", "female")).await;

    let check = state
        .tier_service
        .check_free_user_interaction(a, b)
        .await
        .expect("interaction check failed");
    assert!(check.requires_upgrade);
    assert_eq!(check.reason.as_deref(), Some("free_to_free_restriction"));

    // Free -> paid is allowed only once the pair is matched.
    let paid = create_user(db, TestUser::new("gold", "active", "female")).await;
    let check = state
        .tier_service
        .check_free_user_interaction(a, paid)
        .await
        .expect("interaction check failed");
    assert!(check.requires_upgrade);
    assert_eq!(check.reason.as_deref(), Some("free_tier_restriction"));

    state.like_service.like(a, paid).await.expect("like failed");
    state.like_service.like(paid, a).await.expect("like failed");

    let check = state
        .tier_service
        .check_free_user_interaction(a, paid)
        .await
        .expect("interaction check failed");
    assert!(!check.requires_upgrade);
}
