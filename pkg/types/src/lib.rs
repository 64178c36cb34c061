//! Shared object model for the onboarding service: identities, requests,
//! cluster objects, quota policy and reconciliation outcomes.

pub mod config;
pub mod identity;
pub mod namespace;
pub mod onboarding;
pub mod quantity;
pub mod quota;
pub mod reconcile;
pub mod validate;
