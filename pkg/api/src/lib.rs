pub mod auth;
pub mod handlers;
pub mod request_id;
pub mod server;

use std::sync::Arc;

use pkg_controllers::onboarding::OnboardingOrchestrator;
use pkg_metrics::MetricsRegistry;
use pkg_types::config::AuthConfig;

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<OnboardingOrchestrator>,
    pub auth: Arc<AuthConfig>,
    pub metrics: Arc<MetricsRegistry>,
}
