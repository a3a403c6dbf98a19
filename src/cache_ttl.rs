//! Cache TTL constants (in seconds)

pub struct CacheTtl;

impl CacheTtl {
    /// Daily counter mirrors; keys embed the date, so stale days just expire.
    pub const DAILY_COUNTER: u64 = 86_400; // 24 hours
    pub const RATE_LIMIT: u64 = 60; // 1 minute
}
