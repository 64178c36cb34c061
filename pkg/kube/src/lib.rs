//! [`ClusterApi`] backed by a Kubernetes API server through kube-rs.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::{
    Namespace as KubeNamespace, ResourceQuota as KubeResourceQuota, ResourceQuotaSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::collections::BTreeMap;
use tracing::{debug, info};

use pkg_state::cluster::{
    ClusterApi, ClusterError, ClusterResult, NAMESPACE_KIND, RESOURCE_QUOTA_KIND,
};
use pkg_types::namespace::Namespace;
use pkg_types::quantity::Quantity;
use pkg_types::quota::{HardLimits, ResourceQuota};

/// Field manager recorded on server-side objects we patch.
const FIELD_MANAGER: &str = "onboarding";

pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from an explicit kubeconfig (and optional context), or
    /// fall back to the in-cluster / `$KUBECONFIG` default.
    pub async fn connect(kubeconfig: Option<&str>, context: Option<&str>) -> anyhow::Result<Self> {
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..Default::default()
        };

        let client = match kubeconfig {
            Some(path) => {
                info!("[Kubernetes] Using kubeconfig from path: {}", path);
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("failed to load kubeconfig {}", path))?;
                let config = Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("failed to build client config from kubeconfig")?;
                Client::try_from(config)?
            }
            None if context.is_some() => {
                info!("[Kubernetes] Using context: {:?}", context);
                let config = Config::from_kubeconfig(&options)
                    .await
                    .context("failed to build client config for context")?;
                Client::try_from(config)?
            }
            None => Client::try_default()
                .await
                .context("failed to build default Kubernetes client")?,
        };

        Ok(Self::new(client))
    }

    fn namespaces(&self) -> Api<KubeNamespace> {
        Api::all(self.client.clone())
    }

    fn quotas(&self, namespace: &str) -> Api<KubeResourceQuota> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// 409 (AlreadyExists or Conflict) and 404 become typed outcomes; everything
/// else is kept as the transport error with the object named.
fn map_kube_error(err: kube::Error, kind: &'static str, name: &str) -> ClusterError {
    match err {
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            ClusterError::already_exists(kind, name)
        }
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "Conflict" => {
            ClusterError::conflict(kind, name)
        }
        kube::Error::Api(resp) if resp.code == 404 => ClusterError::not_found(kind, name),
        other => {
            ClusterError::Api(anyhow::Error::new(other).context(format!("{} '{}'", kind, name)))
        }
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

fn to_kube_namespace(namespace: &Namespace) -> KubeNamespace {
    KubeNamespace {
        metadata: ObjectMeta {
            name: Some(namespace.name.clone()),
            labels: Some(namespace.labels.clone()),
            annotations: Some(namespace.annotations.clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn from_kube_namespace(namespace: KubeNamespace) -> Namespace {
    let meta = namespace.metadata;
    Namespace {
        name: meta.name.unwrap_or_default(),
        labels: meta.labels.unwrap_or_default(),
        annotations: meta.annotations.unwrap_or_default(),
        created_at: meta
            .creation_timestamp
            .map(|t| t.0)
            .unwrap_or_else(Utc::now),
    }
}

fn to_kube_hard(hard: &HardLimits) -> BTreeMap<String, KubeQuantity> {
    hard.iter()
        .map(|(k, v)| (k.clone(), KubeQuantity(v.as_str().to_string())))
        .collect()
}

fn to_kube_quota(quota: &ResourceQuota) -> KubeResourceQuota {
    KubeResourceQuota {
        metadata: ObjectMeta {
            name: Some(quota.name.clone()),
            namespace: Some(quota.namespace.clone()),
            labels: Some(quota.labels.clone()),
            annotations: Some(quota.annotations.clone()),
            ..Default::default()
        },
        spec: Some(ResourceQuotaSpec {
            hard: Some(to_kube_hard(&quota.hard)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn from_kube_quota(quota: KubeResourceQuota) -> anyhow::Result<ResourceQuota> {
    let meta = quota.metadata;
    let name = meta.name.unwrap_or_default();
    let mut hard = HardLimits::new();
    for (resource, value) in quota.spec.and_then(|s| s.hard).unwrap_or_default() {
        let parsed = Quantity::parse(&value.0).with_context(|| {
            format!("live quota {} has unparseable {}: '{}'", name, resource, value.0)
        })?;
        hard.insert(resource, parsed);
    }
    Ok(ResourceQuota {
        name,
        namespace: meta.namespace.unwrap_or_default(),
        labels: meta.labels.unwrap_or_default(),
        annotations: meta.annotations.unwrap_or_default(),
        hard,
        created_at: meta
            .creation_timestamp
            .map(|t| t.0)
            .unwrap_or_else(Utc::now),
        resource_version: meta.resource_version,
    })
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn create_namespace(&self, namespace: &Namespace) -> ClusterResult<Namespace> {
        let created = self
            .namespaces()
            .create(&PostParams::default(), &to_kube_namespace(namespace))
            .await
            .map_err(|e| map_kube_error(e, NAMESPACE_KIND, &namespace.name))?;
        Ok(from_kube_namespace(created))
    }

    async fn get_namespace(&self, name: &str) -> ClusterResult<Namespace> {
        let live = self
            .namespaces()
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, NAMESPACE_KIND, name))?;
        Ok(from_kube_namespace(live))
    }

    async fn patch_namespace_annotations(
        &self,
        name: &str,
        annotations: &BTreeMap<String, String>,
    ) -> ClusterResult<Namespace> {
        let patch = serde_json::json!({ "metadata": { "annotations": annotations } });
        debug!("[Kubernetes] Merge-patching namespace {} annotations", name);
        let patched = self
            .namespaces()
            .patch(name, &patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(e, NAMESPACE_KIND, name))?;
        Ok(from_kube_namespace(patched))
    }

    async fn get_resource_quota(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<ResourceQuota> {
        let live = self
            .quotas(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, RESOURCE_QUOTA_KIND, name))?;
        Ok(from_kube_quota(live)?)
    }

    async fn create_resource_quota(&self, quota: &ResourceQuota) -> ClusterResult<ResourceQuota> {
        let created = self
            .quotas(&quota.namespace)
            .create(&PostParams::default(), &to_kube_quota(quota))
            .await
            .map_err(|e| map_kube_error(e, RESOURCE_QUOTA_KIND, &quota.name))?;
        Ok(from_kube_quota(created)?)
    }

    async fn update_resource_quota(&self, quota: &ResourceQuota) -> ClusterResult<ResourceQuota> {
        let api = self.quotas(&quota.namespace);
        // Start from the live object to keep spec fields we do not manage
        // (scopes, scope selector). The replace is pinned to the version the
        // caller read, so the API server rejects it if anything changed since.
        let mut live = api
            .get(&quota.name)
            .await
            .map_err(|e| map_kube_error(e, RESOURCE_QUOTA_KIND, &quota.name))?;
        if quota.resource_version.is_some() {
            live.metadata.resource_version = quota.resource_version.clone();
        }
        live.metadata.labels = Some(quota.labels.clone());
        live.metadata.annotations = Some(quota.annotations.clone());
        let mut spec = live.spec.take().unwrap_or_default();
        spec.hard = Some(to_kube_hard(&quota.hard));
        live.spec = Some(spec);

        debug!(
            "[Kubernetes] Replacing quota {}/{} at version {:?}",
            quota.namespace, quota.name, live.metadata.resource_version
        );
        let replaced = api
            .replace(&quota.name, &PostParams::default(), &live)
            .await
            .map_err(|e| map_kube_error(e, RESOURCE_QUOTA_KIND, &quota.name))?;
        Ok(from_kube_quota(replaced)?)
    }
}
