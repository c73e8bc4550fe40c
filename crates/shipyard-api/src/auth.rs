//! Credential checks. All comparisons are constant-time.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use shipyard_config::Config;

use crate::error::ApiError;
use crate::AppState;

/// Credential header for HTTP routes. WebSocket upgrades carry the key as
/// a query parameter instead, because browsers cannot set arbitrary
/// headers on upgrade requests.
pub const AUTH_HEADER: &str = "x-shipyard-key";

/// Constant-time equality. Differing lengths compare unequal without
/// short-circuiting within a length class.
pub fn key_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Whether the key matches any admin credential.
pub fn is_admin(config: &Config, key: &str) -> bool {
    // Check every key so timing does not reveal which one matched.
    let mut found = false;
    for admin_key in &config.admin_keys {
        if key_matches(key, admin_key) {
            found = true;
        }
    }
    found
}

/// The `X-Shipyard-Key` header value, if present and readable.
pub fn provided_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok())
}

/// Middleware guarding admin routes.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(key) = provided_key(request.headers()) else {
        return Err(ApiError::with_detail(
            axum::http::StatusCode::UNAUTHORIZED,
            "missing_auth",
            "X-Shipyard-Key header required",
        ));
    };
    if !is_admin(&state.registry.snapshot(), key) {
        return Err(ApiError::unauthorized("invalid_key"));
    }
    Ok(next.run(request).await)
}

/// Site-scoped check: the target site's own key, or any admin key (admins
/// may perform any site operation).
pub fn authorize_site(config: &Config, domain: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    let site = config
        .site
        .get(domain)
        .ok_or_else(|| ApiError::not_found("site_not_found"))?;

    let Some(key) = provided_key(headers) else {
        return Err(ApiError::unauthorized("missing_auth"));
    };

    let site_match = key_matches(key, &site.api_key);
    if site_match || is_admin(config, key) {
        return Ok(());
    }
    Err(ApiError::unauthorized("invalid_key"))
}
