pub mod notification_service;
pub mod rate_limiter_service;
pub mod user_service;
