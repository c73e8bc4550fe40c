//! Backend deploy: binary into the jail, service script, supervised start.

use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use shipyard_config::naming::container_name;
use shipyard_health::http_probe;

use crate::auth::authorize_site;
use crate::error::ApiError;
use crate::handlers::common::is_valid_commit;
use crate::multipart::FormData;
use crate::AppState;

/// Startup grace: how long to wait for the fresh backend to answer its
/// health endpoint before handing responsibility to the monitor.
const STARTUP_PROBE_ATTEMPTS: u32 = 10;
const STARTUP_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// POST /deploy/backend
///
/// A backend that has not turned healthy by the end of the startup grace
/// still deploys successfully — slow starters are the health monitor's
/// problem, not a deploy failure.
pub async fn deploy_backend(
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
    let Some(backend) = &site.backend else {
        return Err(ApiError::bad_request("site_has_no_backend"));
    };

    if !is_valid_commit(&commit) {
        return Err(ApiError::bad_request("invalid_commit_hash"));
    }
    let Some(artifact) = form.file("artifact") else {
        return Err(ApiError::bad_request("missing_artifact"));
    };

    // The zip may carry the binary under a different name than the one the
    // service script runs.
    let extract_name = form
        .value("binary_name")
        .unwrap_or(backend.binary_name.as_str());

    info!(%domain, %commit, binary = %extract_name, "backend deploy started");

    state
        .containers
        .ensure(&domain)
        .await
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;

    let binary = shipyard_store::extract_binary(artifact, extract_name)
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;

    // Swap under a stopped service, but keep the jail up for the copy.
    state.services.stop(&domain).await;
    state
        .containers
        .start(&domain)
        .await
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;

    if let Err(e) = state
        .containers
        .exec(&domain, &["mkdir", "-p", "/usr/local/bin"])
        .await
    {
        warn!(%domain, error = %e, "mkdir in jail failed");
    }

    let dest = format!("/usr/local/bin/{}", backend.binary_name);
    state
        .containers
        .copy_in(&domain, &binary.path().display().to_string(), &dest)
        .await
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;

    state
        .services
        .create(&domain, backend)
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;
    state
        .services
        .enable(&domain)
        .await
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;

    if let Err(e) = state
        .containers
        .exec(&domain, &["mkdir", "-p", "/var/log"])
        .await
    {
        warn!(%domain, error = %e, "mkdir /var/log in jail failed");
    }

    // Launch under daemon(8) inside the jail: restart on exit, stdout and
    // stderr to the jail's app log.
    let port = backend.listen_port.to_string();
    let port_env = format!("PORT={port}");
    state
        .containers
        .exec(
            &domain,
            &[
                "env",
                &port_env,
                "HOST=0.0.0.0",
                "/usr/sbin/daemon",
                "-r",
                "-R",
                "5",
                "-o",
                "/var/log/app.log",
                "-f",
                &dest,
            ],
        )
        .await
        .map_err(|e| ApiError::internal("deployment_failed", e.to_string()))?;

    let healthy = wait_for_startup(&state, backend.jail_ip.as_str(), &port).await;
    if !healthy {
        info!(%domain, "backend not healthy within startup grace; monitor takes over");
    }

    info!(%domain, %commit, "backend deploy succeeded");
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "deployed",
            "site": domain,
            "commit": commit,
            "container": container_name(&domain),
            "healthy": healthy,
        })),
    ))
}

async fn wait_for_startup(state: &AppState, jail_ip: &str, port: &str) -> bool {
    let address = format!("{jail_ip}:{port}");
    let path = state.registry.snapshot().health.health_path;
    for _ in 0..STARTUP_PROBE_ATTEMPTS {
        if http_probe(&address, &path, Duration::from_secs(2))
            .await
            .is_healthy()
        {
            return true;
        }
        tokio::time::sleep(STARTUP_PROBE_INTERVAL).await;
    }
    false
}
