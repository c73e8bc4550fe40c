//! Unauthenticated health and per-site status endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use shipyard_config::naming::container_name;

use crate::error::ApiError;
use crate::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let mut services = serde_json::Map::new();
    for (domain, status) in state.monitor.status() {
        services.insert(
            domain,
            json!({
                "healthy": status.healthy,
                "consecutive_failures": status.consecutive_failures,
                "last_check": status.last_check.to_rfc3339(),
            }),
        );
    }

    Json(json!({
        "status": "healthy",
        "version": state.version,
        "commit": state.commit,
        "services": services,
    }))
}

/// GET /status/{site}
pub async fn site_status(
    State(state): State<AppState>,
    Path(site): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let config = state
        .registry
        .site(&site)
        .ok_or_else(|| ApiError::not_found("site_not_found"))?;

    let mut response = json!({ "site": site });

    if config.backend.is_some() {
        let status = match state.monitor.status_for(&site) {
            Some(s) if s.healthy => "healthy",
            Some(_) => "unhealthy",
            None => "unknown",
        };
        response["backend"] = json!({
            "container": container_name(&site),
            "status": status,
        });
    }

    Ok(Json(response))
}
