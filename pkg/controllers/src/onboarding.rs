use chrono::Utc;
use pkg_metrics::{
    FAILURES_TOTAL, IN_FLIGHT, MetricsRegistry, QUOTA_SKIPPED_TOTAL, REQUESTS_TOTAL,
    outcome_counter,
};
use pkg_policy::QuotaPolicyResolver;
use pkg_state::cluster::ClusterApi;
use pkg_types::config::OnboardingConfig;
use pkg_types::onboarding::{NamespaceNaming, OnboardingRequest};
use pkg_types::reconcile::{OnboardingReport, QuotaOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::annotations::NamespaceAnnotator;
use crate::namespace::NamespaceLifecycleManager;
use crate::quota::QuotaReconciler;

/// One unit of the in-flight gauge, held until dropped.
struct InFlight<'a> {
    metrics: &'a MetricsRegistry,
}

impl<'a> InFlight<'a> {
    fn enter(metrics: &'a MetricsRegistry) -> Self {
        metrics.gauge_inc(IN_FLIGHT);
        Self { metrics }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.gauge_dec(IN_FLIGHT);
    }
}

/// Runs one onboarding pass: namespace first, then quota.
///
/// Holds only configuration and the cluster handle, so a single instance is
/// shared across concurrent requests.
pub struct OnboardingOrchestrator {
    naming: NamespaceNaming,
    labels: BTreeMap<String, String>,
    annotator: NamespaceAnnotator,
    quotas_enabled: bool,
    resolver: QuotaPolicyResolver,
    namespaces: NamespaceLifecycleManager,
    quotas: QuotaReconciler,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl OnboardingOrchestrator {
    pub fn new(cluster: Arc<dyn ClusterApi>, config: OnboardingConfig) -> Self {
        Self {
            naming: config.naming(),
            labels: config.labels,
            annotator: NamespaceAnnotator::new(config.annotations),
            quotas_enabled: config.quotas.enabled,
            resolver: QuotaPolicyResolver::new(config.quotas),
            namespaces: NamespaceLifecycleManager::new(cluster.clone()),
            quotas: QuotaReconciler::new(cluster),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn onboard(&self, req: &OnboardingRequest) -> anyhow::Result<OnboardingReport> {
        let in_flight = self.metrics.as_deref().map(|m| {
            m.counter_inc(REQUESTS_TOTAL);
            InFlight::enter(m)
        });

        let result = self.run(req).await;
        drop(in_flight);

        if let Some(m) = &self.metrics {
            match &result {
                Ok(report) => {
                    m.counter_inc(&outcome_counter("namespace", report.namespace_result.as_str()));
                    match report.quota_result {
                        Some(q) => m.counter_inc(&outcome_counter("quota", q.as_str())),
                        None if self.quotas_enabled => m.counter_inc(QUOTA_SKIPPED_TOTAL),
                        None => {}
                    }
                }
                Err(_) => m.counter_inc(FAILURES_TOTAL),
            }
        }

        result
    }

    async fn run(&self, req: &OnboardingRequest) -> anyhow::Result<OnboardingReport> {
        let namespace = self.naming.namespace_for(req);
        let annotations = self.annotator.desired(&req.identity, Utc::now());

        let namespace_result = self
            .namespaces
            .ensure(&namespace, &annotations, &self.labels)
            .await?;

        let quota_result = if self.quotas_enabled {
            self.apply_quota(&namespace, req).await?
        } else {
            None
        };

        info!(
            "Onboarded {} into namespace {}: namespace={}, quota={}",
            req.identity.username,
            namespace,
            namespace_result,
            quota_result.map_or("skipped", |q| q.as_str())
        );

        Ok(OnboardingReport {
            namespace,
            namespace_result,
            quota_result,
        })
    }

    async fn apply_quota(
        &self,
        namespace: &str,
        req: &OnboardingRequest,
    ) -> anyhow::Result<Option<QuotaOutcome>> {
        let Some(resolved) = self.resolver.resolve(&req.identity, req) else {
            warn!("No quota tier applies to namespace {}, skipping quota", namespace);
            return Ok(None);
        };
        info!("Applying {} quota tier to namespace {}", resolved.source, namespace);
        let outcome = self.quotas.apply(namespace, resolved.tier).await?;
        Ok(Some(outcome))
    }
}
