//! Network-related constants.

/// Default port for the onboarding API server.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Header echoed on every API response with the generated request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
