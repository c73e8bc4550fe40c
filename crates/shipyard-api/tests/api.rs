//! End-to-end handler tests over the full router.
//!
//! External collaborators are stubbed at the binary level: `true` stands in
//! for nginx and pot (every invocation succeeds), `false` for a failing
//! validator, and a small shell script plays certbot by touching the
//! certificate files.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use shipyard_api::{build_router, AppState};
use shipyard_config::{BackendConfig, Config, Registry, SiteConfig};
use shipyard_container::ContainerAdapter;
use shipyard_health::HealthMonitor;
use shipyard_logfan::LogHub;
use shipyard_nginx::NginxManager;
use shipyard_service::ServiceSupervisor;
use shipyard_tls::TlsProvisioner;
use shipyard_update::Updater;

const ADMIN_KEY: &str = "sk-admin-test";
const SITE_KEY: &str = "sk-site-test";

struct Harness {
    dir: TempDir,
    state: AppState,
}

impl Harness {
    /// Full stack with a passing validator.
    fn new() -> Self {
        Self::with_nginx_binary("true")
    }

    fn with_nginx_binary(nginx_bin: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let mut config: Config = toml::from_str("").unwrap();
        config.admin_keys.push(ADMIN_KEY.to_string());
        config.jail.binary_path = "true".to_string();
        config.jail.base_dir = dir.path().join("jails").display().to_string();
        config.site.insert(
            "a.example.com".to_string(),
            SiteConfig {
                frontend_root: dir.path().join("www/a.example.com").display().to_string(),
                api_key: SITE_KEY.to_string(),
                ..Default::default()
            },
        );
        config.site.insert(
            "api-only.example.com".to_string(),
            SiteConfig {
                api_key: SITE_KEY.to_string(),
                backend: Some(BackendConfig {
                    jail_ip: "127.0.1.9".to_string(),
                    listen_port: 8099,
                    proxy_path: "/api".to_string(),
                    binary_name: "api-only".to_string(),
                }),
                ..Default::default()
            },
        );

        let live_root = dir.path().join("letsencrypt/live");
        let certbot = write_fake_certbot(dir.path(), &live_root);

        let registry = Arc::new(Registry::from_config(
            config,
            dir.path().join("shipyard.toml"),
        ));

        let acme = shipyard_config::AcmeConfig {
            binary_path: certbot,
            webroot: dir.path().join("acme").display().to_string(),
            live_root: live_root.display().to_string(),
        };

        let nginx = NginxManager::with_paths(nginx_bin, &dir.path().join("nginx"), &acme.webroot);
        let containers = ContainerAdapter::new(&registry.snapshot().jail);
        let services = ServiceSupervisor::new(dir.path().join("rc.d"), "true");
        let tls = TlsProvisioner::new(&acme);

        let binary_path = dir.path().join("shipyardd");
        fs::write(&binary_path, b"#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&binary_path, fs::Permissions::from_mode(0o755)).unwrap();

        let monitor = Arc::new(HealthMonitor::new(registry.clone(), services.clone()));

        let state = AppState {
            registry,
            nginx,
            containers,
            services,
            tls,
            updater: Updater::new(&binary_path),
            monitor,
            hub: LogHub::spawn(),
            restart: Arc::new(tokio::sync::Notify::new()),
            version: "0.3.0-test".to_string(),
            commit: "deadbeef".to_string(),
        };

        Self { dir, state }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    fn frontend_root(&self) -> std::path::PathBuf {
        self.dir.path().join("www/a.example.com")
    }

    fn nginx_root(&self) -> std::path::PathBuf {
        self.dir.path().join("nginx")
    }
}

/// A certbot stand-in that touches the expected certificate files for the
/// requested domain.
fn write_fake_certbot(dir: &Path, live_root: &Path) -> String {
    let script_path = dir.join("fake-certbot");
    let script = format!(
        "#!/bin/sh\n\
         domain=\"\"\n\
         prev=\"\"\n\
         for arg in \"$@\"; do\n\
         \tif [ \"$prev\" = \"-d\" ]; then domain=\"$arg\"; fi\n\
         \tprev=\"$arg\"\n\
         done\n\
         [ -n \"$domain\" ] || exit 0\n\
         mkdir -p \"{live}/$domain\"\n\
         touch \"{live}/$domain/fullchain.pem\" \"{live}/$domain/privkey.pem\"\n",
        live = live_root.display()
    );
    fs::write(&script_path, script).unwrap();
    fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();
    script_path.display().to_string()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 10 * 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut cursor);
    for (name, content) in files {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    cursor.into_inner()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

const BOUNDARY: &str = "shipyard-test-boundary";

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(path: &str, key: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(key) = key {
        builder = builder.header("X-Shipyard-Key", key);
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

// ── health and status ──────────────────────────────────────────

#[tokio::test]
async fn health_reports_version_and_commit() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], "0.3.0-test");
    assert_eq!(body["commit"], "deadbeef");
}

#[tokio::test]
async fn status_of_unknown_site_is_404() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::get("/status/nope.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "site_not_found");
}

#[tokio::test]
async fn status_of_backend_site_names_container() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::get("/status/api-only.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["backend"]["container"], "api-only-example-com");
    assert_eq!(body["backend"]["status"], "unknown");
}

// ── auth ───────────────────────────────────────────────────────

#[tokio::test]
async fn admin_route_requires_key() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(Request::get("/site/logs?site=a.example.com").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "missing_auth");
}

#[tokio::test]
async fn admin_route_rejects_wrong_key() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::get("/site/logs?site=a.example.com")
                .header("X-Shipyard-Key", "sk-admin-wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_key");
}

#[tokio::test]
async fn deploy_rejects_site_key_of_other_site() {
    let h = Harness::new();
    h.state
        .registry
        .add_site(
            "b.example.com",
            SiteConfig {
                frontend_root: h.dir.path().join("www/b").display().to_string(),
                api_key: "sk-site-other".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

    let zip = build_zip(&[("index.html", b"x")]);
    let response = h
        .router()
        .oneshot(multipart_request(
            "/deploy/frontend",
            Some("sk-site-other"),
            &[
                Part::Text("site", "a.example.com"),
                Part::Text("commit", "deadbee"),
                Part::File("artifact", "artifact.zip", &zip),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ── site lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn site_create_mints_key_and_persists() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::post("/site/create")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"domain":"new.example.com","ssl_enabled":false,"with_backend":false}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let api_key = body["api_key"].as_str().unwrap();
    assert!(api_key.starts_with("sk-site-"));
    assert_eq!(api_key.len(), "sk-site-".len() + 40);
    assert_eq!(body["frontend_root"], "/var/www/new.example.com");

    let site = h.state.registry.site("new.example.com").unwrap();
    assert_eq!(site.api_key, api_key);
    assert!(fs::read_to_string(h.state.registry.path())
        .unwrap()
        .contains("new.example.com"));
}

#[tokio::test]
async fn site_create_with_tls_issues_cert_and_serves_acme_config() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::post("/site/create")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"domain":"tls.example.com","ssl_enabled":true,"with_backend":false}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let live = h.dir.path().join("letsencrypt/live/tls.example.com");
    assert!(live.join("fullchain.pem").is_file());
    assert!(live.join("privkey.pem").is_file());

    let available = h.nginx_root().join("sites-available/tls.example.com.conf");
    let enabled = h.nginx_root().join("sites-enabled/tls.example.com.conf");
    assert!(available.is_file());
    assert_eq!(fs::read_link(&enabled).unwrap(), available);
    assert!(fs::read_to_string(&available)
        .unwrap()
        .contains(".well-known/acme-challenge"));
}

#[tokio::test]
async fn site_create_tls_failure_removes_temp_config() {
    let mut h = Harness::new();
    // Replace the ACME client with one that always fails.
    h.state.tls = TlsProvisioner::new(&shipyard_config::AcmeConfig {
        binary_path: "false".to_string(),
        webroot: h.dir.path().join("acme").display().to_string(),
        live_root: h.dir.path().join("letsencrypt/live").display().to_string(),
    });

    let response = h
        .router()
        .oneshot(
            Request::post("/site/create")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"domain":"fail.example.com","ssl_enabled":true,"with_backend":false}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "cert_generation_failed");

    // Site never committed; temporary config cleaned up.
    assert!(h.state.registry.site("fail.example.com").is_none());
    assert!(!h
        .nginx_root()
        .join("sites-available/fail.example.com.conf")
        .exists());
    assert!(!h
        .nginx_root()
        .join("sites-enabled/fail.example.com.conf")
        .exists());
}

#[tokio::test]
async fn site_create_duplicate_is_conflict() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::post("/site/create")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"domain":"a.example.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "site_exists");
}

#[tokio::test]
async fn site_create_rejects_bad_domain() {
    let h = Harness::new();
    for domain in ["Bad.Example.com", ".leading.dot", ""] {
        let body = format!(r#"{{"domain":"{domain}"}}"#);
        let response = h
            .router()
            .oneshot(
                Request::post("/site/create")
                    .header("X-Shipyard-Key", ADMIN_KEY)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "domain {domain:?}");
    }
}

#[tokio::test]
async fn site_create_backend_allocates_next_ip() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::post("/site/create")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"domain":"svc.example.com","with_backend":true,"backend_port":9001}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["has_backend"], true);
    assert_eq!(body["backend_only"], true);

    let site = h.state.registry.site("svc.example.com").unwrap();
    let backend = site.backend.unwrap();
    // api-only.example.com already holds .9.
    assert_eq!(backend.jail_ip, "127.0.1.10");
    assert_eq!(backend.listen_port, 9001);
}

#[tokio::test]
async fn site_init_reports_steps() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(multipart_request(
            "/site/init",
            Some(ADMIN_KEY),
            &[Part::Text("site", "a.example.com")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "initialized");
    assert_eq!(body["frontend_dir_created"], true);
    assert_eq!(body["nginx_reloaded"], true);
    assert!(h.frontend_root().is_dir());
}

#[tokio::test]
async fn site_init_is_retry_safe() {
    let h = Harness::new();
    for expect_created in [true, false] {
        let response = h
            .router()
            .oneshot(multipart_request(
                "/site/init",
                Some(ADMIN_KEY),
                &[Part::Text("site", "a.example.com")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["frontend_dir_created"], expect_created);
        assert_eq!(body["nginx_reloaded"], true);
    }
}

#[tokio::test]
async fn site_init_rejects_bad_template() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(multipart_request(
            "/site/init",
            Some(ADMIN_KEY),
            &[
                Part::Text("site", "a.example.com"),
                Part::Text("nginx_config", "server { <% .Broken }"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "nginx_template_error");
}

#[tokio::test]
async fn site_destroy_removes_everything() {
    let h = Harness::new();
    // Materialise the site first.
    h.router()
        .oneshot(multipart_request(
            "/site/init",
            Some(ADMIN_KEY),
            &[Part::Text("site", "a.example.com")],
        ))
        .await
        .unwrap();
    assert!(h.frontend_root().is_dir());

    let response = h
        .router()
        .oneshot(multipart_request(
            "/site/destroy",
            Some(ADMIN_KEY),
            &[Part::Text("site", "a.example.com")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "destroyed");
    assert_eq!(body["config_removed"], true);

    assert!(h.state.registry.site("a.example.com").is_none());
    assert!(!h.frontend_root().exists());
    assert!(!h
        .nginx_root()
        .join("sites-enabled/a.example.com.conf")
        .exists());
}

// ── frontend deploys ───────────────────────────────────────────

#[tokio::test]
async fn deploy_frontend_promotes_dist_subdir() {
    let h = Harness::new();
    let zip = build_zip(&[
        ("dist/index.html", b"<html>app</html>"),
        ("dist/app.js", b"console.log('app');"),
    ]);

    let response = h
        .router()
        .oneshot(multipart_request(
            "/deploy/frontend",
            Some(SITE_KEY),
            &[
                Part::Text("site", "a.example.com"),
                Part::Text("commit", "deadbee"),
                Part::Text("update_latest", "true"),
                Part::File("artifact", "artifact.zip", &zip),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "deployed");
    assert_eq!(body["nginx_reloaded"], true);
    assert_eq!(body["latest_updated"], true);

    let latest = fs::read_link(h.frontend_root().join("latest")).unwrap();
    assert_eq!(latest, std::path::PathBuf::from("deadbee/dist"));
    assert!(h.frontend_root().join("deadbee/dist/index.html").is_file());
}

#[tokio::test]
async fn deploy_frontend_without_update_latest_keeps_pointer() {
    let h = Harness::new();
    let zip = build_zip(&[("index.html", b"x")]);

    let response = h
        .router()
        .oneshot(multipart_request(
            "/deploy/frontend",
            Some(SITE_KEY),
            &[
                Part::Text("site", "a.example.com"),
                Part::Text("commit", "aaaaaaa"),
                Part::File("artifact", "artifact.zip", &zip),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.frontend_root().join("aaaaaaa").is_dir());
    assert!(!h.frontend_root().join("latest").exists());
}

#[tokio::test]
async fn deploy_frontend_is_idempotent_per_commit() {
    let h = Harness::new();
    let zip = build_zip(&[("dist/index.html", b"same")]);
    for _ in 0..2 {
        let response = h
            .router()
            .oneshot(multipart_request(
                "/deploy/frontend",
                Some(SITE_KEY),
                &[
                    Part::Text("site", "a.example.com"),
                    Part::Text("commit", "deadbee"),
                    Part::Text("update_latest", "true"),
                    Part::File("artifact", "artifact.zip", &zip),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(
        fs::read_link(h.frontend_root().join("latest")).unwrap(),
        std::path::PathBuf::from("deadbee/dist")
    );
}

#[tokio::test]
async fn deploy_frontend_rejects_zip_slip() {
    let h = Harness::new();
    let zip = build_zip(&[("../etc/passwd", b"malicious")]);

    let response = h
        .router()
        .oneshot(multipart_request(
            "/deploy/frontend",
            Some(SITE_KEY),
            &[
                Part::Text("site", "a.example.com"),
                Part::Text("commit", "deadbee"),
                Part::File("artifact", "artifact.zip", &zip),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("zip slip"));
    assert!(!h.dir.path().join("www/etc/passwd").exists());
}

#[tokio::test]
async fn deploy_frontend_commit_id_boundaries() {
    let h = Harness::new();
    let zip = build_zip(&[("index.html", b"x")]);

    for (commit, expected) in [
        ("abc1234", StatusCode::OK),
        ("latest", StatusCode::OK),
        ("abc123", StatusCode::BAD_REQUEST),
        ("ABC1234", StatusCode::BAD_REQUEST),
        (&"a".repeat(41), StatusCode::BAD_REQUEST),
    ] {
        let response = h
            .router()
            .oneshot(multipart_request(
                "/deploy/frontend",
                Some(SITE_KEY),
                &[
                    Part::Text("site", "a.example.com"),
                    Part::Text("commit", commit),
                    Part::File("artifact", "artifact.zip", &zip),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "commit {commit:?}");
    }
}

#[tokio::test]
async fn deploy_frontend_to_backend_only_site_is_rejected() {
    let h = Harness::new();
    let zip = build_zip(&[("index.html", b"x")]);

    let response = h
        .router()
        .oneshot(multipart_request(
            "/deploy/frontend",
            Some(SITE_KEY),
            &[
                Part::Text("site", "api-only.example.com"),
                Part::Text("commit", "deadbee"),
                Part::File("artifact", "artifact.zip", &zip),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "backend_only_site");
}

#[tokio::test]
async fn deploy_frontend_validation_failure_is_partial() {
    let h = Harness::with_nginx_binary("false");
    let zip = build_zip(&[("index.html", b"x")]);

    let response = h
        .router()
        .oneshot(multipart_request(
            "/deploy/frontend",
            Some(SITE_KEY),
            &[
                Part::Text("site", "a.example.com"),
                Part::Text("commit", "deadbee"),
                Part::Text("update_latest", "true"),
                Part::File("artifact", "artifact.zip", &zip),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["status"], "partially_deployed");
    assert_eq!(body["error"], "nginx_validation_failed");
    assert_eq!(body["commit_deployed"], true);
    assert_eq!(body["nginx_reloaded"], false);

    // Artifact committed, staging written, nothing enabled.
    assert!(h.frontend_root().join("deadbee/index.html").is_file());
    assert!(h
        .nginx_root()
        .join("sites-available/a.example.com.conf")
        .is_file());
    assert!(!h
        .nginx_root()
        .join("sites-enabled/a.example.com.conf")
        .exists());
}

#[tokio::test]
async fn deploy_backend_requires_backend_config() {
    let h = Harness::new();
    let zip = build_zip(&[("myapp", b"#!/bin/sh\nexit 0\n")]);

    let response = h
        .router()
        .oneshot(multipart_request(
            "/deploy/backend",
            Some(SITE_KEY),
            &[
                Part::Text("site", "a.example.com"),
                Part::Text("commit", "deadbee"),
                Part::File("artifact", "artifact.zip", &zip),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "site_has_no_backend");
}

#[tokio::test]
async fn deploy_backend_requires_artifact() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(multipart_request(
            "/deploy/backend",
            Some(SITE_KEY),
            &[
                Part::Text("site", "api-only.example.com"),
                Part::Text("commit", "deadbee"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "missing_artifact");
}

// ── self-update ────────────────────────────────────────────────

#[tokio::test]
async fn deploy_self_swaps_binary_and_requests_restart() {
    let h = Harness::new();
    let replacement = b"#!/bin/sh\n# v2\nexit 0\n".to_vec();

    let restart = h.state.restart.clone();
    let notified = tokio::spawn(async move {
        tokio::time::timeout(std::time::Duration::from_secs(2), restart.notified())
            .await
            .is_ok()
    });

    let response = h
        .router()
        .oneshot(
            Request::post("/deploy/self")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .body(Body::from(replacement.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "restarting");

    let binary = h.dir.path().join("shipyardd");
    assert_eq!(fs::read(&binary).unwrap(), replacement);
    assert!(h.dir.path().join("shipyardd.old").is_file());
    assert!(notified.await.unwrap(), "restart was not requested");
}

#[tokio::test]
async fn deploy_self_rejects_invalid_binary() {
    let h = Harness::new();
    let original = fs::read(h.dir.path().join("shipyardd")).unwrap();

    let response = h
        .router()
        .oneshot(
            Request::post("/deploy/self")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .body(Body::from(&b"#!/bin/sh\nexit 1\n"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "update_failed");

    assert_eq!(fs::read(h.dir.path().join("shipyardd")).unwrap(), original);
    assert!(!h.dir.path().join("shipyardd.old").exists());
    assert!(!h.dir.path().join("shipyardd.new").exists());
}

#[tokio::test]
async fn deploy_self_rejects_empty_body() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::post("/deploy/self")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ── misc ───────────────────────────────────────────────────────

#[tokio::test]
async fn oversized_request_is_rejected() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::post("/deploy/self")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .header(header::CONTENT_LENGTH, "600000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"], "request_too_large");
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/sites")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn responses_carry_request_id() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let request_id = response.headers().get("x-request-id").unwrap();
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn site_logs_missing_file_is_empty_list() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::get("/site/logs?site=api-only.example.com")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["lines"], serde_json::json!([]));
}

#[tokio::test]
async fn site_logs_tails_app_log() {
    let h = Harness::new();
    let log_dir = h
        .dir
        .path()
        .join("jails/api-only-example-com/m/var/log");
    fs::create_dir_all(&log_dir).unwrap();
    fs::write(log_dir.join("app.log"), "first\nsecond\nthird\n").unwrap();

    let response = h
        .router()
        .oneshot(
            Request::get("/site/logs?site=api-only.example.com&lines=2")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["lines"], serde_json::json!(["second", "third"]));
}

#[tokio::test]
async fn nginx_example_documents_variables() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::get("/nginx/example")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let example = body["example"].as_str().unwrap();
    assert!(example.contains("<%.Domain%>"));
    assert!(example.contains("Available template variables"));
}

#[tokio::test]
async fn nginx_example_renders_site_default() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::get("/nginx/example?site=a.example.com")
                .header("X-Shipyard-Key", ADMIN_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rendered = body["default"].as_str().unwrap();
    assert!(rendered.contains("server_name a.example.com;"));
    assert!(!rendered.contains("<%"));
}

#[tokio::test]
async fn ws_logs_requires_key() {
    let h = Harness::new();
    // Auth runs before the upgrade handshake, so a plain request is enough
    // to exercise it.
    let response = h
        .router()
        .oneshot(Request::get("/ws/logs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "missing_auth");

    let response = h
        .router()
        .oneshot(
            Request::get("/ws/logs?key=sk-admin-wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_key");
}
