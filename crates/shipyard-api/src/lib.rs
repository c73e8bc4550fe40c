//! shipyard-api — the authenticated HTTP surface.
//!
//! Handlers orchestrate the component managers into site lifecycle and
//! deploy operations. All state a handler needs travels in one [`AppState`]
//! bundle; each manager is a plain struct of paths plus whatever config
//! snapshot its operation needs.
//!
//! # Routes
//!
//! | Method | Path | Auth |
//! |---|---|---|
//! | GET | `/health` | none |
//! | GET | `/status/{site}` | none |
//! | GET | `/sites` | admin |
//! | POST | `/site/create` | admin |
//! | POST | `/site/init` | admin |
//! | POST | `/site/destroy` | admin |
//! | POST | `/deploy/frontend` | site or admin |
//! | POST | `/deploy/backend` | site or admin |
//! | POST | `/deploy/self` | admin |
//! | GET | `/site/logs` | admin |
//! | GET | `/nginx/example` | admin |
//! | WS | `/ws/logs?key=…` | admin (query param) |

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod multipart;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Notify;

use shipyard_config::Registry;
use shipyard_container::ContainerAdapter;
use shipyard_health::HealthMonitor;
use shipyard_logfan::LogHub;
use shipyard_nginx::NginxManager;
use shipyard_service::ServiceSupervisor;
use shipyard_tls::TlsProvisioner;
use shipyard_update::Updater;

/// Maximum request body size: 500 MiB.
pub const MAX_REQUEST_SIZE: usize = 500 << 20;

/// Dependency bundle handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub nginx: NginxManager,
    pub containers: ContainerAdapter,
    pub services: ServiceSupervisor,
    pub tls: TlsProvisioner,
    pub updater: Updater,
    pub monitor: Arc<HealthMonitor>,
    pub hub: LogHub,
    /// Fired by a successful self-update to request a graceful restart.
    pub restart: Arc<Notify>,
    pub version: String,
    pub commit: String,
}

/// Build the complete router with middleware stack.
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/sites", get(handlers::sites::list_sites))
        .route("/site/create", post(handlers::site_create::site_create))
        .route("/site/init", post(handlers::site_init::site_init))
        .route("/site/destroy", post(handlers::site_destroy::site_destroy))
        .route("/site/logs", get(handlers::logs::site_logs))
        .route("/nginx/example", get(handlers::nginx_example::nginx_example))
        .route("/deploy/self", post(handlers::deploy_self::deploy_self))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::admin_auth,
        ));

    // Deploy routes authenticate per site once the multipart `site` field
    // is known; `/ws/logs` checks the key query parameter itself.
    let open_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/status/{site}", get(handlers::health::site_status))
        .route("/deploy/frontend", post(handlers::deploy_frontend::deploy_frontend))
        .route("/deploy/backend", post(handlers::deploy_backend::deploy_backend))
        .route(
            "/ws/logs",
            get(handlers::ws_logs::ws_logs).route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                handlers::ws_logs::ws_auth,
            )),
        );

    Router::new()
        .merge(admin_routes)
        .merge(open_routes)
        .layer(axum::middleware::from_fn(middleware::request_context))
        .layer(axum::middleware::from_fn(middleware::cors))
        .layer(axum::middleware::from_fn(middleware::size_limit))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_SIZE))
        .with_state(state)
}
