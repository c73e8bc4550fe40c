//! Daemon wiring: config, logging, background tasks, HTTP server, and
//! graceful shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{watch, Notify};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use shipyard_api::{build_router, AppState};
use shipyard_config::{Registry, ServerConfig};
use shipyard_container::ContainerAdapter;
use shipyard_health::HealthMonitor;
use shipyard_logfan::{BroadcastLayer, LogHub};
use shipyard_nginx::NginxManager;
use shipyard_service::ServiceSupervisor;
use shipyard_tls::TlsProvisioner;
use shipyard_update::Updater;

use crate::pidfile::PidFile;

pub async fn run(config_path: PathBuf, version: &str, commit: &str) -> anyhow::Result<()> {
    let registry = Arc::new(Registry::load(&config_path)?);
    let config = registry.snapshot();

    let hub = LogHub::spawn();
    init_logging(&config.server, hub.clone())?;

    let updater = Updater::new(&config.self_update.binary_path);
    updater.warn_if_backup_present();

    // Single-instance enforcement; held until the process exits.
    let _pidfile = PidFile::create(&config.self_update.pid_file)?;

    // ── Component managers ─────────────────────────────────────
    let nginx = NginxManager::new(&config.nginx, config.acme.webroot.clone());
    let containers = ContainerAdapter::new(&config.jail);
    let pot_bin = if config.jail.binary_path.is_empty() {
        "pot".to_string()
    } else {
        config.jail.binary_path.clone()
    };
    let services = ServiceSupervisor::new("/usr/local/etc/rc.d", pot_bin);
    let tls = TlsProvisioner::new(&config.acme);
    let monitor = Arc::new(HealthMonitor::new(registry.clone(), services.clone()));

    // ── Background tasks ───────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(shutdown_rx).await }
    });

    // ── HTTP server ────────────────────────────────────────────
    let restart = Arc::new(Notify::new());
    let state = AppState {
        registry,
        nginx,
        containers,
        services,
        tls,
        updater,
        monitor,
        hub: hub.clone(),
        restart: Arc::clone(&restart),
        version: version.to_string(),
        commit: commit.to_string(),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("listen on {}", config.server.listen_addr))?;

    info!(
        version,
        commit,
        listen_addr = %config.server.listen_addr,
        "server starting"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            wait_for_shutdown(restart).await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // In-flight requests have drained; stop the background tasks.
    let _ = monitor_task.await;
    hub.stop().await;

    info!("shutdown complete");
    Ok(())
}

/// Block until SIGINT, SIGTERM, or a self-update restart request.
async fn wait_for_shutdown(restart: Arc<Notify>) {
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received interrupt, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = restart.notified() => info!("self-update triggered, shutting down for restart"),
    }
}

/// Primary JSON sink (stdout or the configured log file) plus the
/// broadcast layer feeding WebSocket subscribers.
fn init_logging(server: &ServerConfig, hub: LogHub) -> anyhow::Result<()> {
    let level = if server.log_level.is_empty() {
        "info"
    } else {
        &server.log_level
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let fmt_layer = if server.log_file.is_empty() {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&server.log_file)
            .with_context(|| format!("open log file {}", server.log_file))?;
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(Arc::new(file))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(BroadcastLayer::new(hub))
        .init();
    Ok(())
}
