use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cluster::{
    ClusterApi, ClusterError, ClusterResult, NAMESPACE_KIND, RESOURCE_QUOTA_KIND,
    next_quota_version,
};
use pkg_types::namespace::Namespace;
use pkg_types::quota::ResourceQuota;
use pkg_types::validate::validate_namespace_name;

/// Cluster calls that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateNamespace,
    GetNamespace,
    PatchNamespace,
    GetResourceQuota,
    CreateResourceQuota,
    UpdateResourceQuota,
}

#[derive(Default)]
struct MemoryState {
    namespaces: BTreeMap<String, Namespace>,
    quotas: BTreeMap<(String, String), ResourceQuota>,
    faults: HashMap<Operation, String>,
    writes: u64,
}

impl MemoryState {
    fn check_fault(&self, op: Operation) -> ClusterResult<()> {
        match self.faults.get(&op) {
            Some(message) => Err(ClusterError::Api(anyhow::anyhow!("{}", message))),
            None => Ok(()),
        }
    }
}

/// In-process cluster, one mutex around all objects.
///
/// Serves the `memory` backend and every test that needs a cluster.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a namespace without going through the API (no write counted).
    pub async fn insert_namespace(&self, namespace: Namespace) {
        let mut state = self.state.lock().await;
        state.namespaces.insert(namespace.name.clone(), namespace);
    }

    /// Seed a quota object without going through the API (no write counted).
    pub async fn insert_resource_quota(&self, quota: ResourceQuota) {
        let mut state = self.state.lock().await;
        state
            .quotas
            .insert((quota.namespace.clone(), quota.name.clone()), quota);
    }

    pub async fn namespace(&self, name: &str) -> Option<Namespace> {
        self.state.lock().await.namespaces.get(name).cloned()
    }

    pub async fn resource_quota(&self, namespace: &str, name: &str) -> Option<ResourceQuota> {
        self.state
            .lock()
            .await
            .quotas
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of mutating calls (create, patch, update) that succeeded.
    pub async fn writes(&self) -> u64 {
        self.state.lock().await.writes
    }

    /// Make every later call of `op` fail with `message`.
    pub async fn fail(&self, op: Operation, message: impl Into<String>) {
        self.state.lock().await.faults.insert(op, message.into());
    }
}

#[async_trait]
impl ClusterApi for MemoryCluster {
    async fn create_namespace(&self, namespace: &Namespace) -> ClusterResult<Namespace> {
        let mut state = self.state.lock().await;
        state.check_fault(Operation::CreateNamespace)?;
        validate_namespace_name(&namespace.name)?;
        if state.namespaces.contains_key(&namespace.name) {
            return Err(ClusterError::already_exists(NAMESPACE_KIND, &namespace.name));
        }
        state
            .namespaces
            .insert(namespace.name.clone(), namespace.clone());
        state.writes += 1;
        Ok(namespace.clone())
    }

    async fn get_namespace(&self, name: &str) -> ClusterResult<Namespace> {
        let state = self.state.lock().await;
        state.check_fault(Operation::GetNamespace)?;
        state
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::not_found(NAMESPACE_KIND, name))
    }

    async fn patch_namespace_annotations(
        &self,
        name: &str,
        annotations: &BTreeMap<String, String>,
    ) -> ClusterResult<Namespace> {
        let mut state = self.state.lock().await;
        state.check_fault(Operation::PatchNamespace)?;
        let namespace = state
            .namespaces
            .get_mut(name)
            .ok_or_else(|| ClusterError::not_found(NAMESPACE_KIND, name))?;
        namespace.annotations.extend(
            annotations
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let patched = namespace.clone();
        state.writes += 1;
        Ok(patched)
    }

    async fn get_resource_quota(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<ResourceQuota> {
        let state = self.state.lock().await;
        state.check_fault(Operation::GetResourceQuota)?;
        state
            .quotas
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found(RESOURCE_QUOTA_KIND, name))
    }

    async fn create_resource_quota(&self, quota: &ResourceQuota) -> ClusterResult<ResourceQuota> {
        let mut state = self.state.lock().await;
        state.check_fault(Operation::CreateResourceQuota)?;
        if !state.namespaces.contains_key(&quota.namespace) {
            return Err(ClusterError::not_found(NAMESPACE_KIND, &quota.namespace));
        }
        let key = (quota.namespace.clone(), quota.name.clone());
        if state.quotas.contains_key(&key) {
            return Err(ClusterError::already_exists(RESOURCE_QUOTA_KIND, &quota.name));
        }
        let mut created = quota.clone();
        created.resource_version = Some("1".to_string());
        state.quotas.insert(key, created.clone());
        state.writes += 1;
        Ok(created)
    }

    async fn update_resource_quota(&self, quota: &ResourceQuota) -> ClusterResult<ResourceQuota> {
        let mut state = self.state.lock().await;
        state.check_fault(Operation::UpdateResourceQuota)?;
        let key = (quota.namespace.clone(), quota.name.clone());
        let Some(live) = state.quotas.get_mut(&key) else {
            return Err(ClusterError::not_found(RESOURCE_QUOTA_KIND, &quota.name));
        };
        let mut updated = quota.clone();
        updated.resource_version = Some(next_quota_version(live, quota)?);
        *live = updated.clone();
        state.writes += 1;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::quota::HardLimits;

    fn ns(name: &str) -> Namespace {
        Namespace::new(name, BTreeMap::new(), BTreeMap::new())
    }

    #[tokio::test]
    async fn create_namespace_twice_reports_already_exists() {
        let cluster = MemoryCluster::new();
        cluster.create_namespace(&ns("user-a")).await.unwrap();
        let err = cluster.create_namespace(&ns("user-a")).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(cluster.writes().await, 1);
    }

    #[tokio::test]
    async fn rejects_invalid_namespace_names() {
        let cluster = MemoryCluster::new();
        let err = cluster.create_namespace(&ns("User_A")).await.unwrap_err();
        assert!(!err.is_already_exists());
        assert!(cluster.namespace("User_A").await.is_none());
    }

    #[tokio::test]
    async fn patch_merges_annotations() {
        let cluster = MemoryCluster::new();
        let mut live = ns("user-a");
        live.annotations.insert("a".to_string(), "1".to_string());
        cluster.insert_namespace(live).await;

        let patch = BTreeMap::from([("b".to_string(), "2".to_string())]);
        let patched = cluster
            .patch_namespace_annotations("user-a", &patch)
            .await
            .unwrap();
        assert_eq!(patched.annotations["a"], "1");
        assert_eq!(patched.annotations["b"], "2");
    }

    #[tokio::test]
    async fn quota_requires_namespace() {
        let cluster = MemoryCluster::new();
        let quota = ResourceQuota::owned("q", "missing", HardLimits::new());
        let err = cluster.create_resource_quota(&quota).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn stale_quota_update_conflicts() {
        let cluster = MemoryCluster::new();
        cluster.insert_namespace(ns("user-a")).await;
        let created = cluster
            .create_resource_quota(&ResourceQuota::owned("q", "user-a", HardLimits::new()))
            .await
            .unwrap();
        assert_eq!(created.resource_version.as_deref(), Some("1"));

        let first = cluster.update_resource_quota(&created).await.unwrap();
        assert_eq!(first.resource_version.as_deref(), Some("2"));

        let err = cluster.update_resource_quota(&created).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(cluster.writes().await, 2);
    }

    #[tokio::test]
    async fn update_missing_quota_is_not_found() {
        let cluster = MemoryCluster::new();
        let quota = ResourceQuota::owned("q", "ns", HardLimits::new());
        let err = cluster.update_resource_quota(&quota).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_fault_surfaces_as_api_error() {
        let cluster = MemoryCluster::new();
        cluster
            .fail(Operation::GetNamespace, "simulated API failure")
            .await;
        let err = cluster.get_namespace("user-a").await.unwrap_err();
        assert!(matches!(err, ClusterError::Api(_)));
        assert!(err.to_string().contains("simulated API failure"));
    }
}
