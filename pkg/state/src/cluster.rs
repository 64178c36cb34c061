use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use pkg_types::namespace::Namespace;
use pkg_types::quota::ResourceQuota;

pub const NAMESPACE_KIND: &str = "namespace";
pub const RESOURCE_QUOTA_KIND: &str = "resourcequota";

/// Failure of a single cluster API call.
///
/// `AlreadyExists` and `NotFound` are kept apart from everything else because
/// the reconcilers treat them as ordinary outcomes, not failures.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' was modified since it was read")]
    Conflict { kind: &'static str, name: String },

    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

impl ClusterError {
    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        ClusterError::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ClusterError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn conflict(kind: &'static str, name: impl Into<String>) -> Self {
        ClusterError::Conflict {
            kind,
            name: name.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict { .. })
    }
}

/// Version check for backends that keep quota objects themselves. Returns the
/// version to store with the accepted write.
pub(crate) fn next_quota_version(
    live: &ResourceQuota,
    incoming: &ResourceQuota,
) -> ClusterResult<String> {
    if incoming.resource_version.is_some() && incoming.resource_version != live.resource_version {
        return Err(ClusterError::conflict(RESOURCE_QUOTA_KIND, &incoming.name));
    }
    let current = live
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    Ok((current + 1).to_string())
}

pub type ClusterResult<T> = Result<T, ClusterError>;

/// The subset of a cluster API the onboarding reconcilers need.
///
/// Implementations must make `create_*` atomic with respect to the
/// already-exists check; the reconcilers hold no locks of their own.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create a namespace. Fails with `AlreadyExists` if the name is taken.
    async fn create_namespace(&self, namespace: &Namespace) -> ClusterResult<Namespace>;

    async fn get_namespace(&self, name: &str) -> ClusterResult<Namespace>;

    /// Merge `annotations` into the live namespace. Keys not listed are kept.
    async fn patch_namespace_annotations(
        &self,
        name: &str,
        annotations: &BTreeMap<String, String>,
    ) -> ClusterResult<Namespace>;

    async fn get_resource_quota(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<ResourceQuota>;

    async fn create_resource_quota(&self, quota: &ResourceQuota) -> ClusterResult<ResourceQuota>;

    /// Replace an existing quota object. Fails with `Conflict` when
    /// `quota.resource_version` no longer matches the live object.
    async fn update_resource_quota(&self, quota: &ResourceQuota) -> ClusterResult<ResourceQuota>;
}
