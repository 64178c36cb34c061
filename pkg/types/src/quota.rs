use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::quantity::Quantity;
use pkg_constants::onboarding::{
    IGNORE_QUOTA_ANNOTATION, IGNORE_QUOTA_VALUE, OWNER_LABEL_KEY, OWNER_LABEL_VALUE,
};

pub const REQUESTS_MEMORY: &str = "requests.memory";
pub const REQUESTS_CPU: &str = "requests.cpu";
pub const LIMITS_MEMORY: &str = "limits.memory";
pub const LIMITS_CPU: &str = "limits.cpu";
pub const REQUESTS_STORAGE: &str = "requests.storage";
pub const COUNT_PODS: &str = "count/pods";
pub const REQUESTS_EPHEMERAL_STORAGE: &str = "requests.ephemeral-storage";
pub const LIMITS_EPHEMERAL_STORAGE: &str = "limits.ephemeral-storage";
pub const REQUESTS_GPU: &str = "requests.nvidia.com/gpu";
pub const LIMITS_GPU: &str = "limits.nvidia.com/gpu";

/// Hard limits keyed by resource name, in a stable order.
pub type HardLimits = BTreeMap<String, Quantity>;

/// A bundle of resource limits applied to a namespace.
///
/// Every dimension is a quantity string; an empty string leaves the
/// dimension out of the quota object. YAML keys may be either the field
/// name or the resource name:
/// ```yaml
/// requests.memory: 10Gi
/// limits_cpu: "4"
/// count/pods: "50"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaTier {
    #[serde(default, alias = "requests.memory")]
    pub requests_memory: String,
    #[serde(default, alias = "requests.cpu")]
    pub requests_cpu: String,
    #[serde(default, alias = "limits.memory")]
    pub limits_memory: String,
    #[serde(default, alias = "limits.cpu")]
    pub limits_cpu: String,
    #[serde(default, alias = "requests.storage")]
    pub requests_storage: String,
    #[serde(default, alias = "count/pods")]
    pub count_pods: String,
    #[serde(default, alias = "requests.ephemeral-storage")]
    pub requests_ephemeral_storage: String,
    #[serde(default, alias = "limits.ephemeral-storage")]
    pub limits_ephemeral_storage: String,
    #[serde(default, alias = "requests.nvidia.com/gpu")]
    pub requests_gpu: String,
    #[serde(default, alias = "limits.nvidia.com/gpu")]
    pub limits_gpu: String,
}

impl QuotaTier {
    /// `(resource name, configured value)` for all ten dimensions.
    pub fn entries(&self) -> [(&'static str, &str); 10] {
        [
            (REQUESTS_MEMORY, self.requests_memory.as_str()),
            (REQUESTS_CPU, self.requests_cpu.as_str()),
            (LIMITS_MEMORY, self.limits_memory.as_str()),
            (LIMITS_CPU, self.limits_cpu.as_str()),
            (REQUESTS_STORAGE, self.requests_storage.as_str()),
            (COUNT_PODS, self.count_pods.as_str()),
            (REQUESTS_EPHEMERAL_STORAGE, self.requests_ephemeral_storage.as_str()),
            (LIMITS_EPHEMERAL_STORAGE, self.limits_ephemeral_storage.as_str()),
            (REQUESTS_GPU, self.requests_gpu.as_str()),
            (LIMITS_GPU, self.limits_gpu.as_str()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.trim().is_empty())
    }

    /// Parse every non-empty dimension. A single malformed value fails the
    /// whole tier so that nothing is partially applied.
    pub fn hard_limits(&self) -> Result<HardLimits> {
        let mut hard = HardLimits::new();
        for (resource, value) in self.entries() {
            if value.trim().is_empty() {
                continue;
            }
            let quantity = Quantity::parse(value)
                .with_context(|| format!("invalid quota value for {}: '{}'", resource, value))?;
            hard.insert(resource.to_string(), quantity);
        }
        Ok(hard)
    }
}

/// Quota policy loaded from configuration at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default: QuotaTier,
    #[serde(default, alias = "user-enabled")]
    pub user_enabled: bool,
    #[serde(default)]
    pub user: QuotaTier,
    #[serde(default, alias = "group-enabled")]
    pub group_enabled: bool,
    #[serde(default)]
    pub group: QuotaTier,
    #[serde(default)]
    pub roles: BTreeMap<String, QuotaTier>,
}

/// Resource quota object attached to a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub hard: HardLimits,
    pub created_at: DateTime<Utc>,
    /// Version of the live object this copy was read from. An update carrying
    /// one is rejected if the object has changed since.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ResourceQuota {
    /// A new quota object carrying the ownership label.
    pub fn owned(name: impl Into<String>, namespace: impl Into<String>, hard: HardLimits) -> Self {
        let mut quota = Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            hard,
            created_at: Utc::now(),
            resource_version: None,
        };
        quota.assert_owner_label();
        quota
    }

    pub fn assert_owner_label(&mut self) {
        self.labels
            .insert(OWNER_LABEL_KEY.to_string(), OWNER_LABEL_VALUE.to_string());
    }

    /// Whether a human opted this object out of reconciliation.
    pub fn is_ignored(&self) -> bool {
        self.annotations
            .get(IGNORE_QUOTA_ANNOTATION)
            .is_some_and(|v| v == IGNORE_QUOTA_VALUE)
    }
}
