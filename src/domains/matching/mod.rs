//! Compatibility matching: candidate retrieval, scoring, the like/match
//! transaction coordinator and the facade composing them.

pub mod likes;
pub mod models;
pub mod query;
pub mod scoring;
pub mod service;

pub use likes::LikeService;
pub use models::{LikeResult, MatchCard, MatchFilters, MatchList, MatchingError, TierInfo};
pub use query::MatchQueryBuilder;
pub use service::MatchingService;
