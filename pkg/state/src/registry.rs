use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::StateStore;
use crate::cluster::{
    ClusterApi, ClusterError, ClusterResult, NAMESPACE_KIND, RESOURCE_QUOTA_KIND,
    next_quota_version,
};
use pkg_constants::state::{NAMESPACES_PREFIX, RESOURCE_QUOTAS_PREFIX};
use pkg_types::namespace::Namespace;
use pkg_types::quota::ResourceQuota;
use pkg_types::validate::validate_namespace_name;

fn namespace_key(name: &str) -> String {
    format!("{}{}", NAMESPACES_PREFIX, name)
}

fn quota_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", RESOURCE_QUOTAS_PREFIX, namespace, name)
}

/// Cluster objects persisted as JSON in the SlateDB state store.
///
/// SlateDB has no compare-and-swap, so every read-check-write sequence runs
/// under one write lock shared by all clones.
#[derive(Clone)]
pub struct RegistryCluster {
    store: StateStore,
    write_lock: Arc<Mutex<()>>,
}

impl RegistryCluster {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl ClusterApi for RegistryCluster {
    async fn create_namespace(&self, namespace: &Namespace) -> ClusterResult<Namespace> {
        validate_namespace_name(&namespace.name)?;
        let key = namespace_key(&namespace.name);

        let _guard = self.write_lock.lock().await;
        if self.store.get(&key).await?.is_some() {
            return Err(ClusterError::already_exists(NAMESPACE_KIND, &namespace.name));
        }
        self.store.put_json(&key, namespace).await?;
        debug!("Stored namespace {}", key);
        Ok(namespace.clone())
    }

    async fn get_namespace(&self, name: &str) -> ClusterResult<Namespace> {
        self.store
            .get_json(&namespace_key(name))
            .await?
            .ok_or_else(|| ClusterError::not_found(NAMESPACE_KIND, name))
    }

    async fn patch_namespace_annotations(
        &self,
        name: &str,
        annotations: &BTreeMap<String, String>,
    ) -> ClusterResult<Namespace> {
        let key = namespace_key(name);

        let _guard = self.write_lock.lock().await;
        let mut namespace: Namespace = self
            .store
            .get_json(&key)
            .await?
            .ok_or_else(|| ClusterError::not_found(NAMESPACE_KIND, name))?;
        for (k, v) in annotations {
            namespace.annotations.insert(k.clone(), v.clone());
        }
        self.store.put_json(&key, &namespace).await?;
        Ok(namespace)
    }

    async fn get_resource_quota(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<ResourceQuota> {
        self.store
            .get_json(&quota_key(namespace, name))
            .await?
            .ok_or_else(|| ClusterError::not_found(RESOURCE_QUOTA_KIND, name))
    }

    async fn create_resource_quota(&self, quota: &ResourceQuota) -> ClusterResult<ResourceQuota> {
        let key = quota_key(&quota.namespace, &quota.name);

        let _guard = self.write_lock.lock().await;
        if self
            .store
            .get(&namespace_key(&quota.namespace))
            .await?
            .is_none()
        {
            return Err(ClusterError::not_found(NAMESPACE_KIND, &quota.namespace));
        }
        if self.store.get(&key).await?.is_some() {
            return Err(ClusterError::already_exists(RESOURCE_QUOTA_KIND, &quota.name));
        }
        let mut created = quota.clone();
        created.resource_version = Some("1".to_string());
        self.store.put_json(&key, &created).await?;
        debug!("Stored resource quota {}", key);
        Ok(created)
    }

    async fn update_resource_quota(&self, quota: &ResourceQuota) -> ClusterResult<ResourceQuota> {
        let key = quota_key(&quota.namespace, &quota.name);

        let _guard = self.write_lock.lock().await;
        let live: ResourceQuota = self
            .store
            .get_json(&key)
            .await?
            .ok_or_else(|| ClusterError::not_found(RESOURCE_QUOTA_KIND, &quota.name))?;
        let mut updated = quota.clone();
        updated.resource_version = Some(next_quota_version(&live, quota)?);
        self.store.put_json(&key, &updated).await?;
        Ok(updated)
    }
}
