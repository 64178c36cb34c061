use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use pkg_constants::onboarding::{DEFAULT_GROUP_NAMESPACE_PREFIX, DEFAULT_NAMESPACE_PREFIX};

/// A request to onboard the caller, or one of the caller's groups.
///
/// When `target_group` is set it must be one of `identity.groups`. The
/// caller (the API layer) checks this before the request reaches the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingRequest {
    #[serde(default)]
    pub target_group: Option<String>,
    pub identity: Identity,
}

impl OnboardingRequest {
    pub fn for_user(identity: Identity) -> Self {
        Self {
            target_group: None,
            identity,
        }
    }

    pub fn for_group(identity: Identity, group: impl Into<String>) -> Self {
        Self {
            target_group: Some(group.into()),
            identity,
        }
    }
}

/// Prefixes used to derive namespace names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceNaming {
    pub user_prefix: String,
    pub group_prefix: String,
}

impl NamespaceNaming {
    pub fn new(user_prefix: impl Into<String>, group_prefix: impl Into<String>) -> Self {
        Self {
            user_prefix: user_prefix.into(),
            group_prefix: group_prefix.into(),
        }
    }

    /// `group_prefix + group` for group onboarding, `user_prefix + username`
    /// otherwise. Pure: the same request always maps to the same name.
    pub fn namespace_for(&self, req: &OnboardingRequest) -> String {
        match &req.target_group {
            Some(group) => format!("{}{}", self.group_prefix, group),
            None => format!("{}{}", self.user_prefix, req.identity.username),
        }
    }
}

impl Default for NamespaceNaming {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE_PREFIX, DEFAULT_GROUP_NAMESPACE_PREFIX)
    }
}
