//! Cache key builders

use chrono::NaiveDate;

pub struct CacheKeys;

impl CacheKeys {
    /// Mirror of one row in the daily activity ledger.
    pub fn daily_activity(user_id: i64, activity: &str, date: NaiveDate) -> String {
        format!("daily_activity:{}:{}:{}", user_id, activity, date)
    }
}
