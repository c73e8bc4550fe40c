//! Self-update endpoint.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

/// POST /deploy/self
///
/// Raw binary in the body. On success the response is sent first; the
/// graceful shutdown fires 100 ms later and the external supervisor
/// restarts the process on the new binary.
pub async fn deploy_self(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.is_empty() {
        return Err(ApiError::with_detail(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "request body is empty",
        ));
    }

    info!(binary_size = body.len(), "self-update started");

    state
        .updater
        .update(&body)
        .await
        .map_err(|e| ApiError::internal("update_failed", e.to_string()))?;

    info!("self-update succeeded, scheduling restart");

    let restart = state.restart.clone();
    tokio::spawn(async move {
        // Let the response reach the client before the listener drains.
        tokio::time::sleep(Duration::from_millis(100)).await;
        restart.notify_one();
    });

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "restarting",
            "message": "Update successful, restarting...",
        })),
    ))
}
