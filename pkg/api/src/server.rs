use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::AppState;
use crate::auth::identity_middleware;
use crate::handlers::{health, onboarding};
use crate::request_id::request_id_middleware;

/// Server configuration passed from the binary's CLI.
pub struct ServerConfig {
    pub addr: SocketAddr,
}

/// Routes: identity-protected onboarding API plus public health and metrics.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/onboarding", post(onboarding::onboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics))
        .merge(api_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

pub async fn start_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    info!("Starting API server on {}", config.addr);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use pkg_constants::network::REQUEST_ID_HEADER;
    use pkg_constants::onboarding::QUOTA_NAME;
    use pkg_controllers::onboarding::OnboardingOrchestrator;
    use pkg_metrics::MetricsRegistry;
    use pkg_state::memory::{MemoryCluster, Operation};
    use pkg_types::config::{AuthConfig, AuthMode, OnboardingConfig};
    use pkg_types::quota::{QuotaPolicy, QuotaTier};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(cluster: &MemoryCluster, mode: AuthMode) -> AppState {
        let config = OnboardingConfig {
            quotas: QuotaPolicy {
                enabled: true,
                default: QuotaTier {
                    requests_memory: "10Gi".to_string(),
                    ..Default::default()
                },
                group_enabled: true,
                group: QuotaTier {
                    requests_memory: "100Gi".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let metrics = Arc::new(MetricsRegistry::onboarding());
        let orchestrator = OnboardingOrchestrator::new(Arc::new(cluster.clone()), config)
            .with_metrics(metrics.clone());
        AppState {
            orchestrator: Arc::new(orchestrator),
            auth: Arc::new(AuthConfig {
                mode,
                ..Default::default()
            }),
            metrics,
        }
    }

    fn onboarding_request() -> axum::http::request::Builder {
        Request::builder()
            .method("POST")
            .uri("/api/v1/onboarding")
            .header("content-type", "application/json")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_public_and_tagged() {
        let app = router(state(&MemoryCluster::new(), AuthMode::Header));
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn anonymous_mode_onboards_default_identity() {
        let cluster = MemoryCluster::new();
        let app = router(state(&cluster, AuthMode::None));
        let response = app
            .oneshot(onboarding_request().body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["namespace"], "user-anonymous");
        assert_eq!(body["namespace_result"], "created");
        assert_eq!(body["quota_result"], "created");
        assert!(cluster.resource_quota("user-anonymous", QUOTA_NAME).await.is_some());
    }

    #[tokio::test]
    async fn header_mode_requires_user() {
        let app = router(state(&MemoryCluster::new(), AuthMode::Header));
        let response = app
            .oneshot(onboarding_request().body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn group_outside_identity_is_forbidden() {
        let cluster = MemoryCluster::new();
        let app = router(state(&cluster, AuthMode::Header));
        let response = app
            .oneshot(
                onboarding_request()
                    .header("x-remote-user", "alice")
                    .header("x-remote-group", "data")
                    .body(Body::from(r#"{"group":"finance"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(cluster.namespace("projet-finance").await.is_none());
    }

    #[tokio::test]
    async fn group_onboarding_through_headers() {
        let cluster = MemoryCluster::new();
        let app = router(state(&cluster, AuthMode::Header));
        let response = app
            .oneshot(
                onboarding_request()
                    .header("x-remote-user", "alice")
                    .header("x-remote-group", "data")
                    .body(Body::from(r#"{"group":"data"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["namespace"], "projet-data");
        let quota = cluster.resource_quota("projet-data", QUOTA_NAME).await.unwrap();
        assert_eq!(quota.hard["requests.memory"].as_str(), "100Gi");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = router(state(&MemoryCluster::new(), AuthMode::None));
        let response = app
            .oneshot(onboarding_request().body(Body::from("{not json")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cluster_failure_is_500_with_chain() {
        let cluster = MemoryCluster::new();
        cluster.fail(Operation::CreateNamespace, "apiserver unavailable").await;
        let app = router(state(&cluster, AuthMode::None));
        let response = app
            .oneshot(onboarding_request().body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("failed to create namespace user-anonymous"));
        assert!(message.contains("apiserver unavailable"));
    }

    #[tokio::test]
    async fn metrics_reflect_requests() {
        let cluster = MemoryCluster::new();
        let app = router(state(&cluster, AuthMode::None));
        app.clone()
            .oneshot(onboarding_request().body(Body::empty()).unwrap())
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("onboarding_requests_total 1\n"));
        assert!(text.contains("onboarding_namespace_created_total 1\n"));
    }
}
