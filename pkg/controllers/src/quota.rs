use anyhow::Context;
use pkg_constants::onboarding::QUOTA_NAME;
use pkg_state::cluster::ClusterApi;
use pkg_types::quota::{QuotaTier, ResourceQuota};
use pkg_types::reconcile::QuotaOutcome;
use std::sync::Arc;
use tracing::{debug, info};

/// Converges the namespace's well-known quota object onto a tier.
pub struct QuotaReconciler {
    cluster: Arc<dyn ClusterApi>,
}

impl QuotaReconciler {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Read, diff, then create or update. A live object annotated
    /// `onboarding/ignore: "true"` is left alone. The update carries the
    /// version that was read, so an object changed in between (for instance
    /// marked ignore) fails with a conflict instead of being overwritten.
    pub async fn apply(&self, namespace: &str, tier: &QuotaTier) -> anyhow::Result<QuotaOutcome> {
        // Parse everything before talking to the cluster.
        let hard = tier.hard_limits()?;
        if hard.is_empty() {
            debug!("Quota tier for {} sets no limits, nothing to apply", namespace);
            return Ok(QuotaOutcome::Unchanged);
        }

        let mut live = match self.cluster.get_resource_quota(namespace, QUOTA_NAME).await {
            Ok(live) => live,
            Err(e) if e.is_not_found() => {
                let quota = ResourceQuota::owned(QUOTA_NAME, namespace, hard.clone());
                match self.cluster.create_resource_quota(&quota).await {
                    Ok(_) => {
                        info!("Created quota {} in namespace {}", QUOTA_NAME, namespace);
                        return Ok(QuotaOutcome::Created);
                    }
                    // Another caller created it first; converge on what it wrote.
                    Err(e) if e.is_already_exists() => {
                        debug!("Quota in namespace {} appeared concurrently, re-reading", namespace);
                        self.cluster
                            .get_resource_quota(namespace, QUOTA_NAME)
                            .await
                            .with_context(|| {
                                format!("failed to get quota in namespace {}", namespace)
                            })?
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("failed to create quota in namespace {}", namespace)
                        });
                    }
                }
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to get quota in namespace {}", namespace));
            }
        };

        if live.is_ignored() {
            info!("Quota in namespace {} is marked ignore, skipping", namespace);
            return Ok(QuotaOutcome::Ignored);
        }

        if live.hard == hard {
            info!("Quota in namespace {} is up to date", namespace);
            return Ok(QuotaOutcome::Unchanged);
        }

        live.hard = hard;
        live.assert_owner_label();
        self.cluster
            .update_resource_quota(&live)
            .await
            .with_context(|| format!("failed to update quota in namespace {}", namespace))?;
        info!("Updated quota {} in namespace {}", QUOTA_NAME, namespace);
        Ok(QuotaOutcome::Updated)
    }
}
