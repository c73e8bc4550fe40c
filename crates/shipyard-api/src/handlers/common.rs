//! Validation and rendering helpers shared across handlers.

use std::sync::LazyLock;

use regex::Regex;

use shipyard_config::SiteConfig;
use shipyard_nginx::{default_template, render_user_config, RenderContext, TlsMode};

use crate::error::ApiError;
use crate::AppState;

static COMMIT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{7,40}$").expect("commit id regex"));

static DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.\-]*[a-z0-9]$").expect("domain regex"));

/// Commit ids are the literal `latest` or 7–40 lowercase hex chars.
pub fn is_valid_commit(id: &str) -> bool {
    id == "latest" || COMMIT_ID.is_match(id)
}

/// Domains are lowercase alphanumeric with interior dots and hyphens.
pub fn is_valid_domain(domain: &str) -> bool {
    DOMAIN.is_match(domain)
}

/// Render a site's nginx config from a user template (or the default for
/// the site's shape).
pub fn render_site_config(
    state: &AppState,
    domain: &str,
    site: &SiteConfig,
    user_template: Option<&str>,
) -> Result<String, ApiError> {
    let template = user_template.unwrap_or_else(|| default_template(site));
    let (cert_path, key_path) = state.tls.cert_paths(domain);
    let ctx = RenderContext {
        domain,
        site,
        acme_webroot: state.nginx.acme_webroot(),
        cert_path: cert_path.display().to_string(),
        key_path: key_path.display().to_string(),
    };
    render_user_config(template, &ctx).map_err(|e| {
        ApiError::with_detail(
            axum::http::StatusCode::BAD_REQUEST,
            "nginx_template_error",
            e.to_string(),
        )
    })
}

/// TLS activation mode for a site: the HTTPS transform when the site wants
/// TLS, plain HTTP otherwise.
pub fn tls_mode(state: &AppState, domain: &str, site: &SiteConfig) -> TlsMode {
    if site.ssl_enabled {
        let (cert_path, key_path) = state.tls.cert_paths(domain);
        TlsMode::Enabled {
            cert_path: cert_path.display().to_string(),
            key_path: key_path.display().to_string(),
        }
    } else {
        TlsMode::Disabled
    }
}
