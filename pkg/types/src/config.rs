use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::onboarding::NamespaceNaming;
use crate::quota::QuotaPolicy;
use pkg_constants::auth::{
    DEFAULT_EXTRA_HEADER_PREFIX, DEFAULT_GROUP_HEADER, DEFAULT_ROLE_HEADER, DEFAULT_USER_HEADER,
};
use pkg_constants::onboarding::{DEFAULT_GROUP_NAMESPACE_PREFIX, DEFAULT_NAMESPACE_PREFIX};

/// Server configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// port: 8080
/// backend: kube
/// auth:
///   mode: header
/// onboarding:
///   namespace-prefix: user-
///   group-namespace-prefix: projet-
///   quotas:
///     enabled: true
///     default:
///       requests.memory: 10Gi
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfigFile {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub backend: Option<BackendKind>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub kubeconfig: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
}

/// Which cluster API the reconcilers talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process maps, lost on exit.
    #[default]
    Memory,
    /// Objects persisted in the local SlateDB state store.
    Registry,
    /// A Kubernetes API server.
    Kube,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "registry" => Ok(BackendKind::Registry),
            "kube" | "kubernetes" => Ok(BackendKind::Kube),
            other => bail!("unknown backend '{}' (expected memory, registry or kube)", other),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Memory => "memory",
            BackendKind::Registry => "registry",
            BackendKind::Kube => "kube",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Every request runs as the fixed anonymous identity.
    #[default]
    None,
    /// Identity is read from headers set by a trusted authenticating proxy.
    Header,
}

/// How the API layer obtains the caller identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    #[serde(default = "default_user_header", alias = "user-header")]
    pub user_header: String,
    #[serde(default = "default_group_header", alias = "group-header")]
    pub group_header: String,
    #[serde(default = "default_role_header", alias = "role-header")]
    pub role_header: String,
    #[serde(default = "default_extra_header_prefix", alias = "extra-header-prefix")]
    pub extra_header_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            user_header: default_user_header(),
            group_header: default_group_header(),
            role_header: default_role_header(),
            extra_header_prefix: default_extra_header_prefix(),
        }
    }
}

fn default_user_header() -> String {
    DEFAULT_USER_HEADER.to_string()
}

fn default_group_header() -> String {
    DEFAULT_GROUP_HEADER.to_string()
}

fn default_role_header() -> String {
    DEFAULT_ROLE_HEADER.to_string()
}

fn default_extra_header_prefix() -> String {
    DEFAULT_EXTRA_HEADER_PREFIX.to_string()
}

/// Namespace naming, metadata and quota policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingConfig {
    #[serde(default = "default_namespace_prefix", alias = "namespace-prefix")]
    pub namespace_prefix: String,
    #[serde(
        default = "default_group_namespace_prefix",
        alias = "group-namespace-prefix"
    )]
    pub group_namespace_prefix: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: AnnotationConfig,
    #[serde(default)]
    pub quotas: QuotaPolicy,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: default_namespace_prefix(),
            group_namespace_prefix: default_group_namespace_prefix(),
            labels: BTreeMap::new(),
            annotations: AnnotationConfig::default(),
            quotas: QuotaPolicy::default(),
        }
    }
}

impl OnboardingConfig {
    pub fn naming(&self) -> NamespaceNaming {
        NamespaceNaming::new(&self.namespace_prefix, &self.group_namespace_prefix)
    }
}

fn default_namespace_prefix() -> String {
    DEFAULT_NAMESPACE_PREFIX.to_string()
}

fn default_group_namespace_prefix() -> String {
    DEFAULT_GROUP_NAMESPACE_PREFIX.to_string()
}

/// Annotations written onto onboarded namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "static")]
    pub static_annotations: BTreeMap<String, String>,
    #[serde(default, alias = "last-login-timestamp")]
    pub last_login_timestamp: bool,
    /// Identity attribute keys copied verbatim as annotations.
    #[serde(default, alias = "user-attributes")]
    pub user_attributes: Vec<String>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
