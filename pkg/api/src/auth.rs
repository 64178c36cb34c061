use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::AppState;
use pkg_types::config::{AuthConfig, AuthMode};
use pkg_types::identity::{AttributeValue, Identity};

/// Middleware: resolves the caller [`Identity`] and injects it into the
/// request extensions. Handlers read it with `Extension<Identity>`.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let identity = match state.auth.mode {
        AuthMode::None => Identity::anonymous(),
        AuthMode::Header => identity_from_headers(req.headers(), &state.auth)?,
    };
    debug!(
        "Authenticated user={} groups={:?} roles={:?}",
        identity.username, identity.groups, identity.roles
    );
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// All values of a header, split on commas, trimmed, empties dropped, in the
/// order they were sent.
fn header_values(headers: &HeaderMap, name: &str) -> Result<Vec<String>, StatusCode> {
    let mut values = Vec::new();
    for value in headers.get_all(name.to_ascii_lowercase().as_str()) {
        let value = value.to_str().map_err(|_| {
            warn!("Non-ASCII value in identity header {}", name);
            StatusCode::UNAUTHORIZED
        })?;
        values.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        );
    }
    Ok(values)
}

/// Identity asserted by a trusted authenticating proxy.
///
/// The user header is required and must carry exactly one name. Group and
/// role headers may repeat or be comma-separated; role order is kept.
/// `<extra-prefix><key>` headers become string attributes, or lists when the
/// header carries more than one value.
pub fn identity_from_headers(headers: &HeaderMap, auth: &AuthConfig) -> Result<Identity, StatusCode> {
    let users = header_values(headers, &auth.user_header)?;
    let username = match users.as_slice() {
        [user] => user.clone(),
        [] => {
            warn!("Missing identity header {}", auth.user_header);
            return Err(StatusCode::UNAUTHORIZED);
        }
        _ => {
            warn!("Ambiguous identity header {}", auth.user_header);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let groups = header_values(headers, &auth.group_header)?;
    let mut roles = Vec::new();
    for role in header_values(headers, &auth.role_header)? {
        if !roles.contains(&role) {
            roles.push(role);
        }
    }

    let prefix = auth.extra_header_prefix.to_ascii_lowercase();
    let mut extras: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in headers.keys() {
        let Some(key) = name.as_str().strip_prefix(prefix.as_str()) else {
            continue;
        };
        if key.is_empty() || extras.contains_key(key) {
            continue;
        }
        extras.insert(key.to_string(), header_values(headers, name.as_str())?);
    }

    let mut identity = Identity::new(username)
        .with_groups(groups)
        .with_roles(roles);
    for (key, mut values) in extras {
        let value = match values.len() {
            0 => continue,
            1 => AttributeValue::String(values.remove(0)),
            _ => AttributeValue::List(values),
        };
        identity = identity.with_attribute(key, value);
    }
    Ok(identity)
}
