use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of ensuring a namespace exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceOutcome {
    Created,
    AlreadyExists,
    AnnotationsUpdated,
}

impl NamespaceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceOutcome::Created => "created",
            NamespaceOutcome::AlreadyExists => "already_exists",
            NamespaceOutcome::AnnotationsUpdated => "annotations_updated",
        }
    }
}

impl fmt::Display for NamespaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of converging a namespace's resource quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaOutcome {
    Created,
    Updated,
    Unchanged,
    Ignored,
}

impl QuotaOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaOutcome::Created => "created",
            QuotaOutcome::Updated => "updated",
            QuotaOutcome::Unchanged => "unchanged",
            QuotaOutcome::Ignored => "ignored",
        }
    }
}

impl fmt::Display for QuotaOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one onboarding pass did.
///
/// `quota` is `None` when quotas are disabled or no tier applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingReport {
    pub namespace: String,
    pub namespace_result: NamespaceOutcome,
    #[serde(default)]
    pub quota_result: Option<QuotaOutcome>,
}
