//! Frontend deploy: unpack → promote → proxy transaction.
//!
//! The artifact commit happens before the proxy step, so a proxy
//! validation failure leaves the commit on disk and reports
//! `partially_deployed` — the caller fixes the template and retries, and
//! the retry is safe because commit directories are content-bound.

use std::path::Path;

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::authorize_site;
use crate::error::ApiError;
use crate::handlers::common::{is_valid_commit, render_site_config, tls_mode};
use crate::multipart::FormData;
use crate::AppState;

/// POST /deploy/frontend
pub async fn deploy_frontend(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let form = FormData::collect(multipart).await?;
    let (Some(domain), Some(commit)) = (form.value("site"), form.value("commit")) else {
        return Err(ApiError::bad_request("missing_fields"));
    };
    let domain = domain.to_string();
    let commit = commit.to_string();

    let config = state.registry.snapshot();
    authorize_site(&config, &domain, &headers)?;
    let site = config.site.get(&domain).expect("authorized site exists");

    if site.is_backend_only() {
        return Err(ApiError::with_detail(
            StatusCode::BAD_REQUEST,
            "backend_only_site",
            "this site has no frontend; use /deploy/backend instead",
        ));
    }
    if !is_valid_commit(&commit) {
        return Err(ApiError::with_detail(
            StatusCode::BAD_REQUEST,
            "invalid_commit_hash",
            "must be 7-40 char hex string",
        ));
    }

    let Some(artifact) = form.file("artifact") else {
        return Err(ApiError::bad_request("missing_artifact"));
    };

    // Default false: branch previews deploy a commit without moving latest.
    let update_latest = form.flag("update_latest");

    let user_template = form.value_or_file("nginx_config");
    let rendered = render_site_config(&state, &domain, site, user_template.as_deref())?;

    info!(%domain, %commit, update_latest, "frontend deploy started");

    let site_root = Path::new(&site.frontend_root);
    shipyard_store::unpack(site_root, &commit, artifact)
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;

    if update_latest {
        shipyard_store::promote_latest(site_root, &commit)
            .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;
    }

    let outcome = state
        .nginx
        .deploy_site(&domain, &rendered, tls_mode(&state, &domain, site), &config.site)
        .await
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;

    if !outcome.reloaded {
        warn!(%domain, %commit, "frontend deploy partial: nginx validation failed");
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "status": "partially_deployed",
                "error": "nginx_validation_failed",
                "detail": outcome.validation_error.unwrap_or_default(),
                "commit_deployed": true,
                "nginx_reloaded": false,
                "latest_updated": update_latest,
                "site": domain,
                "commit": commit,
            })),
        ));
    }

    info!(%domain, %commit, "frontend deploy succeeded");
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "deployed",
            "site": domain,
            "commit": commit,
            "path": format!("{}/{commit}", site.frontend_root),
            "nginx_reloaded": true,
            "latest_updated": update_latest,
        })),
    ))
}
