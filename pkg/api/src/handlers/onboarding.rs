use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::AppState;
use pkg_types::identity::Identity;
use pkg_types::onboarding::OnboardingRequest;

/// Body of `POST /api/v1/onboarding`. An empty body onboards the caller.
#[derive(Debug, Default, Deserialize)]
pub struct OnboardingBody {
    #[serde(default)]
    pub group: Option<String>,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// POST /api/v1/onboarding: onboard the caller, or one of the caller's groups.
pub async fn onboard(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Response {
    let body: OnboardingBody = if body.is_empty() {
        OnboardingBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(b) => b,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e));
            }
        }
    };

    let request = match body.group.filter(|g| !g.is_empty()) {
        Some(group) => {
            if !identity.is_member_of(&group) {
                warn!("User {} is not a member of group {}", identity.username, group);
                return error_response(
                    StatusCode::FORBIDDEN,
                    format!("user {} is not a member of group {}", identity.username, group),
                );
            }
            OnboardingRequest::for_group(identity, group)
        }
        None => OnboardingRequest::for_user(identity),
    };

    info!(
        "Onboarding request from {} (group: {:?})",
        request.identity.username, request.target_group
    );

    match state.orchestrator.onboard(&request).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Onboarding failed for {}: {:#}", request.identity.username, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}
