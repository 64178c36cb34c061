//! Centralized constants for the onboarding service.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod auth;
pub mod network;
pub mod onboarding;
pub mod paths;
pub mod state;
