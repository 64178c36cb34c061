use anyhow::Context;
use pkg_state::cluster::ClusterApi;
use pkg_types::namespace::Namespace;
use pkg_types::reconcile::NamespaceOutcome;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Ensures a namespace exists and carries the desired annotations.
///
/// Create first; on AlreadyExists fetch the live object and merge-patch only
/// the annotation keys that are missing or differ. Keys the namespace already
/// has and that are not desired are never touched. No retries.
pub struct NamespaceLifecycleManager {
    cluster: Arc<dyn ClusterApi>,
}

impl NamespaceLifecycleManager {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    pub async fn ensure(
        &self,
        name: &str,
        annotations: &BTreeMap<String, String>,
        labels: &BTreeMap<String, String>,
    ) -> anyhow::Result<NamespaceOutcome> {
        let desired = Namespace::new(name, annotations.clone(), labels.clone());

        match self.cluster.create_namespace(&desired).await {
            Ok(_) => {
                info!("Created namespace: {}", name);
                return Ok(NamespaceOutcome::Created);
            }
            Err(e) if e.is_already_exists() => {
                debug!("Namespace {} already exists, checking annotations", name);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to create namespace {}", name));
            }
        }

        let live = self
            .cluster
            .get_namespace(name)
            .await
            .with_context(|| format!("failed to get namespace {}", name))?;

        let drift = live.annotation_drift(annotations);
        if drift.is_empty() {
            info!("Namespace {} already exists, annotations up to date", name);
            return Ok(NamespaceOutcome::AlreadyExists);
        }

        self.cluster
            .patch_namespace_annotations(name, &drift)
            .await
            .with_context(|| format!("failed to patch annotations on namespace {}", name))?;
        info!(
            "Namespace {} annotations updated ({} key(s))",
            name,
            drift.len()
        );
        Ok(NamespaceOutcome::AnnotationsUpdated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_state::memory::{MemoryCluster, Operation};

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn manager(cluster: &MemoryCluster) -> NamespaceLifecycleManager {
        NamespaceLifecycleManager::new(Arc::new(cluster.clone()))
    }

    #[tokio::test]
    async fn creates_then_reports_already_exists() {
        let cluster = MemoryCluster::new();
        let mgr = manager(&cluster);
        let annotations = map(&[("team", "data")]);
        let labels = map(&[("tenant", "true")]);

        let first = mgr.ensure("user-alice", &annotations, &labels).await.unwrap();
        assert_eq!(first, NamespaceOutcome::Created);
        let live = cluster.namespace("user-alice").await.unwrap();
        assert_eq!(live.annotations, annotations);
        assert_eq!(live.labels, labels);

        let writes = cluster.writes().await;
        let second = mgr.ensure("user-alice", &annotations, &labels).await.unwrap();
        assert_eq!(second, NamespaceOutcome::AlreadyExists);
        assert_eq!(cluster.writes().await, writes);
    }

    #[tokio::test]
    async fn empty_desired_set_never_patches() {
        let cluster = MemoryCluster::new();
        cluster
            .insert_namespace(Namespace::new("user-a", map(&[("x", "1")]), BTreeMap::new()))
            .await;
        let outcome = manager(&cluster)
            .ensure("user-a", &BTreeMap::new(), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(outcome, NamespaceOutcome::AlreadyExists);
        assert_eq!(cluster.writes().await, 0);
    }

    #[tokio::test]
    async fn patch_merges_only_drifted_keys() {
        let cluster = MemoryCluster::new();
        cluster
            .insert_namespace(Namespace::new(
                "user-a",
                map(&[("a", "1"), ("b", "2")]),
                BTreeMap::new(),
            ))
            .await;

        let outcome = manager(&cluster)
            .ensure("user-a", &map(&[("a", "1"), ("b", "3"), ("c", "4")]), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(outcome, NamespaceOutcome::AnnotationsUpdated);

        let live = cluster.namespace("user-a").await.unwrap();
        assert_eq!(live.annotations, map(&[("a", "1"), ("b", "3"), ("c", "4")]));
    }

    #[tokio::test]
    async fn foreign_annotations_survive_patch() {
        let cluster = MemoryCluster::new();
        cluster
            .insert_namespace(Namespace::new(
                "user-a",
                map(&[("owner-note", "keep me")]),
                BTreeMap::new(),
            ))
            .await;

        manager(&cluster)
            .ensure("user-a", &map(&[("team", "data")]), &BTreeMap::new())
            .await
            .unwrap();
        let live = cluster.namespace("user-a").await.unwrap();
        assert_eq!(live.annotations["owner-note"], "keep me");
        assert_eq!(live.annotations["team"], "data");
    }

    #[tokio::test]
    async fn create_failure_is_wrapped_with_namespace() {
        let cluster = MemoryCluster::new();
        cluster.fail(Operation::CreateNamespace, "forbidden").await;
        let err = manager(&cluster)
            .ensure("user-a", &BTreeMap::new(), &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to create namespace user-a");
        assert!(format!("{:#}", err).contains("forbidden"));
    }

    #[tokio::test]
    async fn patch_failure_surfaces() {
        let cluster = MemoryCluster::new();
        cluster
            .insert_namespace(Namespace::new("user-a", BTreeMap::new(), BTreeMap::new()))
            .await;
        cluster.fail(Operation::PatchNamespace, "connection reset").await;
        let err = manager(&cluster)
            .ensure("user-a", &map(&[("team", "data")]), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("failed to patch annotations on namespace user-a"));
        assert!(format!("{:#}", err).contains("connection reset"));
    }
}
