//! Entitlement and compatibility-matching core for the Amora platform.
//!
//! This crate is the library-level service boundary consumed by the HTTP
//! layer: subscription-tier policy (daily quotas, contact-detail gating),
//! the weighted compatibility scorer, candidate retrieval, and the
//! lock-ordered like/match transaction coordinator.

pub mod cache_key;
pub mod cache_ttl;
pub mod models;
pub mod state;

// Domain-driven architecture
pub mod domains;
pub mod services;
pub mod shared;
