use clap::{Parser, Subcommand, ValueEnum};
use pkg_api::AppState;
use pkg_api::server::{ServerConfig, start_server};
use pkg_constants::network::DEFAULT_API_PORT;
use pkg_constants::paths::{DEFAULT_SERVER_CONFIG, DEFAULT_SERVER_DATA_DIR};
use pkg_controllers::onboarding::OnboardingOrchestrator;
use pkg_kube::KubeCluster;
use pkg_metrics::MetricsRegistry;
use pkg_state::client::StateStore;
use pkg_state::cluster::ClusterApi;
use pkg_state::memory::MemoryCluster;
use pkg_state::registry::RegistryCluster;
use pkg_types::config::{
    AuthConfig, BackendKind, OnboardingConfig, ServerConfigFile, load_config_file,
};
use pkg_types::identity::Identity;
use pkg_types::onboarding::OnboardingRequest;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "onboard-server", about = "Namespace and quota onboarding service")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, global = true, default_value = DEFAULT_SERVER_CONFIG)]
    config: String,

    /// Port to listen on
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Cluster backend: memory, registry or kube
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Directory for SlateDB state storage (registry backend)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Kubeconfig path (kube backend)
    #[arg(long, global = true)]
    kubeconfig: Option<String>,

    /// Kubeconfig context (kube backend)
    #[arg(long, global = true)]
    context: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Onboard a single user or group and print the report as JSON
    Onboard {
        /// Username to onboard
        #[arg(long)]
        user: String,
        /// Onboard this group instead of the user's own namespace
        #[arg(long)]
        group: Option<String>,
        /// Role of the user; repeat to pass several, first match wins
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Effective settings after merging CLI args > config file > defaults.
#[derive(Debug)]
struct Settings {
    port: u16,
    backend: BackendKind,
    data_dir: String,
    kubeconfig: Option<String>,
    context: Option<String>,
    auth: AuthConfig,
    onboarding: OnboardingConfig,
}

impl Settings {
    fn merge(cli: &Cli, file_cfg: ServerConfigFile) -> Self {
        Self {
            port: cli.port.or(file_cfg.port).unwrap_or(DEFAULT_API_PORT),
            backend: cli.backend.or(file_cfg.backend).unwrap_or_default(),
            data_dir: cli
                .data_dir
                .clone()
                .or(file_cfg.data_dir)
                .unwrap_or_else(|| DEFAULT_SERVER_DATA_DIR.to_string()),
            kubeconfig: cli.kubeconfig.clone().or(file_cfg.kubeconfig),
            context: cli.context.clone().or(file_cfg.context),
            auth: file_cfg.auth,
            onboarding: file_cfg.onboarding,
        }
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Cluster backend plus the state store to close on exit, if any.
async fn connect_backend(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn ClusterApi>, Option<StateStore>)> {
    match settings.backend {
        BackendKind::Memory => Ok((Arc::new(MemoryCluster::new()), None)),
        BackendKind::Registry => {
            let store = StateStore::new(&settings.data_dir).await?;
            Ok((Arc::new(RegistryCluster::new(store.clone())), Some(store)))
        }
        BackendKind::Kube => {
            let cluster =
                KubeCluster::connect(settings.kubeconfig.as_deref(), settings.context.as_deref())
                    .await?;
            Ok((Arc::new(cluster), None))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    // Load config file (returns defaults if file not found)
    let file_cfg: ServerConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);
    let settings = Settings::merge(&cli, file_cfg);

    info!("Starting onboard-server");
    info!("  Backend:   {}", settings.backend);
    info!("  Quotas:    {}", if settings.onboarding.quotas.enabled { "enabled" } else { "disabled" });
    info!("  Auth mode: {:?}", settings.auth.mode);

    let (cluster, store) = connect_backend(&settings).await?;
    let metrics = Arc::new(MetricsRegistry::onboarding());
    let orchestrator = OnboardingOrchestrator::new(cluster, settings.onboarding.clone())
        .with_metrics(metrics.clone());

    let result = match cli.command {
        Commands::Serve => {
            info!("  Port:      {}", settings.port);
            let state = AppState {
                orchestrator: Arc::new(orchestrator),
                auth: Arc::new(settings.auth.clone()),
                metrics,
            };
            let config = ServerConfig {
                addr: SocketAddr::from(([0, 0, 0, 0], settings.port)),
            };
            start_server(config, state).await
        }
        Commands::Onboard { user, group, roles } => {
            let identity = Identity::new(user).with_roles(roles);
            let request = match group {
                Some(group) => {
                    OnboardingRequest::for_group(identity.with_groups([group.clone()]), group)
                }
                None => OnboardingRequest::for_user(identity),
            };
            orchestrator.onboard(&request).await.and_then(|report| {
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            })
        }
    };

    if let Some(store) = store {
        store.close().await?;
    }

    result
}
