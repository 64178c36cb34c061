pub mod annotations;
pub mod namespace;
pub mod onboarding;
pub mod quota;
