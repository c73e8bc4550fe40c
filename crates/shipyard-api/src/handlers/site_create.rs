//! Site creation: credential minting, backend allocation, and the
//! first-time TLS choreography.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use shipyard_config::{generate_api_key, BackendConfig, SiteConfig};

use crate::error::ApiError;
use crate::handlers::common::{is_valid_domain, render_site_config, tls_mode};
use crate::AppState;

#[derive(Deserialize)]
pub struct SiteCreateRequest {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub frontend_root: String,
    #[serde(default)]
    pub ssl_enabled: bool,
    #[serde(default)]
    pub with_backend: bool,
    #[serde(default)]
    pub backend_port: u16,
    #[serde(default)]
    pub proxy_path: String,
}

/// POST /site/create
///
/// For TLS sites the registry is committed *last*: HTTP-only proxy config
/// first, then the ACME webroot flow, and only once a certificate exists
/// does the site become real. A crash mid-choreography leaves only
/// reclaimable disk state (orphan cert, orphan HTTP config), never a
/// half-configured site.
pub async fn site_create(
    State(state): State<AppState>,
    body: Result<Json<SiteCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body.map_err(|e| {
        ApiError::with_detail(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            format!("failed to parse JSON body: {e}"),
        )
    })?;

    if req.domain.is_empty() {
        return Err(ApiError::bad_request("missing_domain"));
    }
    if !is_valid_domain(&req.domain) {
        return Err(ApiError::with_detail(
            StatusCode::BAD_REQUEST,
            "invalid_domain",
            "domain must be lowercase alphanumeric with dots and hyphens",
        ));
    }
    if state.registry.site(&req.domain).is_some() {
        return Err(ApiError::conflict("site_exists"));
    }

    let api_key = generate_api_key("sk-site-");

    // with_backend and no explicit root means backend-only (no frontend).
    let backend_only = req.with_backend && req.frontend_root.is_empty();
    let frontend_root = if backend_only {
        String::new()
    } else if req.frontend_root.is_empty() {
        format!("/var/www/{}", req.domain)
    } else {
        req.frontend_root.clone()
    };

    info!(
        domain = %req.domain,
        ssl = req.ssl_enabled,
        with_backend = req.with_backend,
        backend_only,
        "site creation started"
    );

    let mut site = SiteConfig {
        frontend_root,
        api_key: api_key.clone(),
        ssl_enabled: req.ssl_enabled,
        ..Default::default()
    };

    if req.with_backend {
        let listen_port = if req.backend_port == 0 {
            8080
        } else {
            req.backend_port
        };
        let proxy_path = if req.proxy_path.is_empty() {
            "/api".to_string()
        } else {
            req.proxy_path.clone()
        };
        site.backend = Some(BackendConfig {
            jail_ip: state.registry.next_jail_ip(),
            listen_port,
            proxy_path,
            binary_name: req.domain.clone(),
        });
    }

    // TLS bootstrap runs before the registry commit.
    if req.ssl_enabled {
        if let Err(e) = state.nginx.deploy_http_only(&req.domain).await {
            return Err(ApiError::internal("nginx_setup_failed", e.to_string()));
        }
        if let Err(e) = state.tls.obtain(&req.domain).await {
            state.nginx.remove_site_files(&req.domain).await;
            return Err(ApiError::internal("cert_generation_failed", e.to_string()));
        }
    }

    state
        .registry
        .add_site(&req.domain, site.clone())
        .map_err(|e| ApiError::internal("save_failed", e.to_string()))?;

    // Backend sites get a routable proxy config immediately; frontend-only
    // sites get theirs on first deploy.
    let mut nginx_deployed = false;
    if site.backend.is_some() {
        let sites = state.registry.snapshot().site;
        match render_site_config(&state, &req.domain, &site, None) {
            Ok(rendered) => {
                let mode = tls_mode(&state, &req.domain, &site);
                match state.nginx.deploy_site(&req.domain, &rendered, mode, &sites).await {
                    Ok(outcome) => nginx_deployed = outcome.reloaded,
                    Err(e) => warn!(domain = %req.domain, error = %e, "backend nginx deploy failed"),
                }
            }
            Err(e) => warn!(domain = %req.domain, detail = ?e.detail, "backend config render failed"),
        }
    }

    info!(domain = %req.domain, nginx_deployed, "site created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "created",
            "domain": req.domain,
            "api_key": api_key,
            "frontend_root": site.frontend_root,
            "ssl_enabled": req.ssl_enabled,
            "has_backend": req.with_backend,
            "backend_only": backend_only,
            "nginx_deployed": nginx_deployed,
        })),
    ))
}
