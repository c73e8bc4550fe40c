//! Admin listing of all configured sites.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

/// One row of the `/sites` listing.
#[derive(Serialize)]
pub struct SiteInfo {
    pub domain: String,
    pub frontend_root: String,
    pub has_backend: bool,
    pub backend_only: bool,
    pub ssl_enabled: bool,
    /// "healthy", "unhealthy", or "unknown".
    pub health: String,
}

/// GET /sites
pub async fn list_sites(State(state): State<AppState>) -> Json<Value> {
    let config = state.registry.snapshot();
    let mut sites = Vec::with_capacity(config.site.len());

    for (domain, site) in &config.site {
        sites.push(SiteInfo {
            domain: domain.clone(),
            frontend_root: site.frontend_root.clone(),
            has_backend: site.backend.is_some(),
            backend_only: site.is_backend_only(),
            ssl_enabled: site.ssl_enabled,
            health: check_site_health(domain, site.ssl_enabled).await,
        });
    }

    Json(json!({ "sites": sites }))
}

/// Quick liveness probe through the front door: GET
/// `http(s)://<domain>/health` with a short timeout.
async fn check_site_health(domain: &str, ssl_enabled: bool) -> String {
    let scheme = if ssl_enabled { "https" } else { "http" };
    let url = format!("{scheme}://{domain}/health");

    let Ok(client) = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    else {
        return "unknown".to_string();
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => "healthy".to_string(),
        Ok(_) => "unhealthy".to_string(),
        Err(_) => "unknown".to_string(),
    }
}
