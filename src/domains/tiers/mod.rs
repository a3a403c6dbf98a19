//! Subscription-tier policy: tier derivation, entitlement limits and the
//! daily activity quota ledger.

pub mod counters;
pub mod models;
pub mod service;

pub use counters::ActivityCounterStore;
pub use models::{
    ActivityType, DailyUsageSummary, InteractionCheck, MessagePolicy, Tier, TierLimits, UsageEntry,
    ViewQuota, UNLIMITED,
};
pub use service::UserTierService;
