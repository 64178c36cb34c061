//! Registry key layout used by the state-store backend.

/// Prefix for namespace objects: `/registry/namespaces/{name}`.
pub const NAMESPACES_PREFIX: &str = "/registry/namespaces/";

/// Prefix for resource quota objects: `/registry/resourcequotas/{ns}/{name}`.
pub const RESOURCE_QUOTAS_PREFIX: &str = "/registry/resourcequotas/";
