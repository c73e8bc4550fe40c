//! Site teardown: service, jail, proxy config, frontend tree, registry
//! entry — in that order.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::multipart::FormData;
use crate::AppState;

/// POST /site/destroy
pub async fn site_destroy(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let form = FormData::collect(multipart).await?;
    let domain = form.require("site", "missing_site")?.to_string();

    let site = state
        .registry
        .site(&domain)
        .ok_or_else(|| ApiError::not_found("site_not_found"))?;

    info!(%domain, "site destroy started");

    if site.backend.is_some() {
        state.services.stop(&domain).await;
        if let Err(e) = state.services.disable(&domain).await {
            warn!(%domain, error = %e, "service disable failed");
        }
        state.services.remove(&domain);

        if let Err(e) = state.containers.destroy(&domain).await {
            warn!(%domain, error = %e, "jail destroy failed");
        }
    }

    // Regenerate override.conf without this site before the registry drop,
    // so the proxy tree and the registry flip in the same operation.
    let mut remaining = state.registry.snapshot().site;
    remaining.remove(&domain);
    if let Err(e) = state.nginx.remove_site(&domain, &remaining).await {
        warn!(%domain, error = %e, "failed to remove nginx config");
    }

    if site.has_frontend() {
        let _ = std::fs::remove_dir_all(&site.frontend_root);
    }

    let config_removed = match state.registry.remove_site(&domain) {
        Ok(()) => true,
        Err(e) => {
            warn!(%domain, error = %e, "failed to remove site from config");
            false
        }
    };

    info!(%domain, config_removed, "site destroyed");
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "destroyed",
            "site": domain,
            "config_removed": config_removed,
        })),
    ))
}
