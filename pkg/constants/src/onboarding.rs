//! Names, labels and annotations written onto cluster objects.

/// Well-known name of the single resource quota managed per namespace.
pub const QUOTA_NAME: &str = "onboarding-quota";

/// A live quota carrying this annotation set to `"true"` is never reconciled.
pub const IGNORE_QUOTA_ANNOTATION: &str = "onboarding/ignore";

/// Value of [`IGNORE_QUOTA_ANNOTATION`] that switches reconciliation off.
pub const IGNORE_QUOTA_VALUE: &str = "true";

/// Label key marking objects owned by this service.
pub const OWNER_LABEL_KEY: &str = "created-by";

/// Label value marking objects owned by this service.
pub const OWNER_LABEL_VALUE: &str = "onboarding";

/// Namespace annotation holding the last onboarding time (unix millis).
pub const LAST_LOGIN_ANNOTATION: &str = "onboarding/last-login-timestamp";

/// Default prefix for per-user namespaces.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "user-";

/// Default prefix for per-group namespaces.
pub const DEFAULT_GROUP_NAMESPACE_PREFIX: &str = "projet-";
