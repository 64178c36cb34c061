//! Filesystem path constants.

/// Default config file path for the server.
pub const DEFAULT_SERVER_CONFIG: &str = "/etc/onboarding/config.yaml";

/// Default data directory for the registry backend's state store.
pub const DEFAULT_SERVER_DATA_DIR: &str = "/tmp/onboarding-data";
