//! Site initialisation: directories, jail, service script, and the proxy
//! config — tolerant of pre-existing resources so it can be retried after
//! any partial failure.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info};

use shipyard_nginx::TlsMode;

use crate::error::ApiError;
use crate::handlers::common::render_site_config;
use crate::multipart::FormData;
use crate::AppState;

/// POST /site/init
///
/// Reports per-step outcomes rather than failing wholesale. The TLS path
/// renders the same config twice: once plain (so ACME challenges are
/// servable), then — certificate in hand — through the HTTPS transform.
/// The HTTP-only pass is a render mode, not a registry mutation.
pub async fn site_init(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let form = FormData::collect(multipart).await?;
    let domain = form.require("site", "missing_site")?.to_string();

    let site = state
        .registry
        .site(&domain)
        .ok_or_else(|| ApiError::not_found("site_not_found"))?;

    info!(
        %domain,
        ssl = site.ssl_enabled,
        has_backend = site.backend.is_some(),
        "site init started"
    );

    let user_template = form.value_or_file("nginx_config");
    let rendered = render_site_config(&state, &domain, &site, user_template.as_deref())?;

    let mut report = serde_json::Map::new();
    report.insert("status".to_string(), json!("initialized"));
    report.insert("site".to_string(), json!(domain));

    // Frontend tree root (tolerates an existing directory).
    let mut frontend_dir_created = false;
    if site.has_frontend() && !std::path::Path::new(&site.frontend_root).exists() {
        frontend_dir_created = std::fs::create_dir_all(&site.frontend_root).is_ok();
    }
    report.insert("frontend_dir_created".to_string(), json!(frontend_dir_created));

    // Jail and service plumbing.
    let mut container_created = false;
    let mut container_started = false;
    let mut service_created = false;
    if let Some(backend) = &site.backend {
        match state.containers.ensure(&domain).await {
            Ok(()) => {
                container_created = true;
                match state.containers.start(&domain).await {
                    Ok(()) => container_started = true,
                    Err(e) => error!(%domain, error = %e, "jail start failed"),
                }
            }
            Err(e) => error!(%domain, error = %e, "jail creation failed"),
        }

        match state.services.create(&domain, backend) {
            Ok(()) => {
                service_created = true;
                if let Err(e) = state.services.enable(&domain).await {
                    error!(%domain, error = %e, "service enable failed");
                }
            }
            Err(e) => error!(%domain, error = %e, "rc.d script creation failed"),
        }
    }
    report.insert("container_created".to_string(), json!(container_created));
    report.insert("container_started".to_string(), json!(container_started));
    report.insert("service_created".to_string(), json!(service_created));

    let sites = state.registry.snapshot().site;

    if !site.ssl_enabled {
        let outcome = state
            .nginx
            .deploy_site(&domain, &rendered, TlsMode::Disabled, &sites)
            .await
            .map_err(|e| ApiError::internal("nginx_deployment_failed", e.to_string()))?;
        if !outcome.reloaded {
            return Err(ApiError::with_detail(
                StatusCode::UNPROCESSABLE_ENTITY,
                "nginx_validation_failed",
                outcome.validation_error.unwrap_or_default(),
            ));
        }
        report.insert("nginx_reloaded".to_string(), json!(true));
        return Ok((StatusCode::OK, Json(Value::Object(report))));
    }

    // TLS path. Skip the HTTP-only pass when a certificate already exists
    // (retry after a partial failure).
    let mut ssl_obtained = state.tls.has_valid_cert(&domain);
    if !ssl_obtained {
        let outcome = state
            .nginx
            .deploy_site(&domain, &rendered, TlsMode::Disabled, &sites)
            .await
            .map_err(|e| ApiError::internal("nginx_deployment_failed", e.to_string()))?;
        if !outcome.reloaded {
            return Err(ApiError::with_detail(
                StatusCode::UNPROCESSABLE_ENTITY,
                "nginx_validation_failed",
                outcome.validation_error.unwrap_or_default(),
            ));
        }

        match state.tls.obtain(&domain).await {
            Ok(()) => ssl_obtained = true,
            Err(e) => {
                // The plain-HTTP config stays live; a retry picks up here.
                report.insert("ssl_error".to_string(), json!(e.to_string()));
            }
        }
    }
    report.insert("ssl_obtained".to_string(), json!(ssl_obtained));

    if ssl_obtained {
        let (cert_path, key_path) = state.tls.cert_paths(&domain);
        let outcome = state
            .nginx
            .deploy_site(
                &domain,
                &rendered,
                TlsMode::Enabled {
                    cert_path: cert_path.display().to_string(),
                    key_path: key_path.display().to_string(),
                },
                &sites,
            )
            .await
            .map_err(|e| ApiError::internal("nginx_https_deployment_failed", e.to_string()))?;
        report.insert("nginx_reloaded".to_string(), json!(outcome.reloaded));
        if let Some(message) = outcome.validation_error {
            report.insert("nginx_error".to_string(), json!(message));
        }
    } else {
        // HTTP config is live and serving challenges for the next attempt.
        report.insert("nginx_reloaded".to_string(), json!(true));
        report.insert("ssl_pending".to_string(), json!(true));
    }

    info!(%domain, frontend_dir_created, container_created, service_created, "site init completed");
    Ok((StatusCode::OK, Json(Value::Object(report))))
}
