//! Identity header constants for the trusted front-proxy auth mode.

/// Username of the fixed identity used when authentication is disabled.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Default header carrying the authenticated username.
pub const DEFAULT_USER_HEADER: &str = "x-remote-user";

/// Default header carrying group memberships (repeatable or comma-separated).
pub const DEFAULT_GROUP_HEADER: &str = "x-remote-group";

/// Default header carrying roles (repeatable or comma-separated, order kept).
pub const DEFAULT_ROLE_HEADER: &str = "x-remote-role";

/// Default prefix of headers carrying extra identity attributes.
pub const DEFAULT_EXTRA_HEADER_PREFIX: &str = "x-remote-extra-";
