use pkg_types::identity::Identity;
use pkg_types::onboarding::OnboardingRequest;
use pkg_types::quota::{QuotaPolicy, QuotaTier};
use std::fmt;
use tracing::debug;

/// Which part of the policy a tier came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaSource {
    Group,
    Role(String),
    User,
    Default,
}

impl fmt::Display for QuotaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaSource::Group => f.write_str("group"),
            QuotaSource::Role(role) => write!(f, "role:{}", role),
            QuotaSource::User => f.write_str("user"),
            QuotaSource::Default => f.write_str("default"),
        }
    }
}

/// A tier picked by [`QuotaPolicyResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuota<'a> {
    pub source: QuotaSource,
    pub tier: &'a QuotaTier,
}

/// Picks the quota tier for an onboarding request. Pure; no I/O.
///
/// Precedence, first match wins:
/// 1. a group was requested: the group tier if group quotas are enabled,
///    otherwise nothing at all (no fallback to role/user/default);
/// 2. the first of the identity's roles, in provider order, that has a tier;
/// 3. the user tier if user quotas are enabled;
/// 4. the default tier.
///
/// The global `enabled` switch is not consulted here: callers skip
/// resolution entirely when quotas are off.
pub struct QuotaPolicyResolver {
    policy: QuotaPolicy,
}

impl QuotaPolicyResolver {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self { policy }
    }

    pub fn resolve(&self, identity: &Identity, req: &OnboardingRequest) -> Option<ResolvedQuota<'_>> {
        if let Some(group) = &req.target_group {
            if !self.policy.group_enabled {
                debug!("Group quotas disabled, no tier for group {}", group);
                return None;
            }
            return Some(ResolvedQuota {
                source: QuotaSource::Group,
                tier: &self.policy.group,
            });
        }

        if let Some((role, tier)) = identity
            .roles
            .iter()
            .find_map(|role| self.policy.roles.get(role).map(|tier| (role, tier)))
        {
            return Some(ResolvedQuota {
                source: QuotaSource::Role(role.clone()),
                tier,
            });
        }

        if self.policy.user_enabled {
            return Some(ResolvedQuota {
                source: QuotaSource::User,
                tier: &self.policy.user,
            });
        }

        Some(ResolvedQuota {
            source: QuotaSource::Default,
            tier: &self.policy.default,
        })
    }
}
