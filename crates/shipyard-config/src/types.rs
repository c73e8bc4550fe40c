//! Typed view of the shipyard TOML configuration document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// The whole configuration document.
///
/// Field order matters: TOML requires plain values (`admin_keys`) to be
/// emitted before any table, and the `site` map must come last so each
/// `[site.<domain>]` table closes the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Admin credentials. Any of these passes the admin check and implicitly
    /// every per-site check.
    #[serde(default)]
    pub admin_keys: Vec<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub nginx: NginxConfig,
    #[serde(default)]
    pub jail: JailConfig,
    #[serde(default)]
    pub acme: AcmeConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(rename = "self", default)]
    pub self_update: SelfConfig,
    /// Managed sites, keyed by domain. A `BTreeMap` keeps iteration sorted
    /// by domain, which the override.conf generator relies on for
    /// byte-deterministic output.
    #[serde(default)]
    pub site: BTreeMap<String, SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_file: String,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8443".to_string(),
            log_file: String::new(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxConfig {
    /// Path to the nginx binary used for `-t` validation and `-s reload`.
    pub binary_path: String,
    pub main_conf_path: String,
    pub sites_available: String,
    pub sites_enabled: String,
    pub override_conf: String,
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            binary_path: "/usr/local/sbin/nginx".to_string(),
            main_conf_path: "/usr/local/etc/nginx/nginx.conf".to_string(),
            sites_available: "/usr/local/etc/nginx/sites-available".to_string(),
            sites_enabled: "/usr/local/etc/nginx/sites-enabled".to_string(),
            override_conf: "/usr/local/etc/nginx/override.conf".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JailConfig {
    /// Path to the pot binary; "pot" resolves via PATH.
    pub binary_path: String,
    pub base_dir: String,
    pub freebsd_version: String,
    /// First three octets of the /24 jail addresses are drawn from,
    /// e.g. "127.0.1".
    pub ip_base: String,
}

impl Default for JailConfig {
    fn default() -> Self {
        Self {
            binary_path: "pot".to_string(),
            base_dir: "/opt/pot/jails".to_string(),
            freebsd_version: "14.3-RELEASE".to_string(),
            ip_base: "127.0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmeConfig {
    /// Path to the certbot binary.
    pub binary_path: String,
    /// Directory the HTTP-only config serves `/.well-known/acme-challenge/`
    /// from.
    pub webroot: String,
    /// Directory certbot writes live certificates under
    /// (`<live_root>/<domain>/{fullchain,privkey}.pem`).
    pub live_root: String,
}

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            binary_path: "certbot".to_string(),
            webroot: "/var/www/acme".to_string(),
            live_root: "/usr/local/etc/letsencrypt/live".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub poll_interval_secs: u64,
    pub failure_threshold: u32,
    pub health_path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            failure_threshold: 3,
            health_path: "/health".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfConfig {
    /// The installed shipyardd binary, target of self-updates.
    pub binary_path: String,
    pub pid_file: String,
}

impl Default for SelfConfig {
    fn default() -> Self {
        Self {
            binary_path: "/usr/local/bin/shipyardd".to_string(),
            pid_file: "/var/run/shipyardd.pid".to_string(),
        }
    }
}

/// One managed site. The domain is the map key, not a field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Root of the commit-addressed frontend tree. Empty for backend-only
    /// sites.
    #[serde(default)]
    pub frontend_root: String,
    pub api_key: String,
    /// CIDRs (or bare addresses) allowed to request a non-latest frontend
    /// version via `?override=<commit>`.
    #[serde(default)]
    pub override_ips: Vec<String>,
    #[serde(default)]
    pub ssl_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,
}

impl SiteConfig {
    /// True when the site serves a frontend tree.
    pub fn has_frontend(&self) -> bool {
        !self.frontend_root.is_empty()
    }

    /// True when the site is a backend-only service with no frontend.
    pub fn is_backend_only(&self) -> bool {
        self.backend.is_some() && self.frontend_root.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Jail address drawn from the configured /24.
    pub jail_ip: String,
    pub listen_port: u16,
    /// URI prefix stripped before forwarding to the backend.
    pub proxy_path: String,
    /// Name of the binary installed at /usr/local/bin inside the jail.
    pub binary_name: String,
}

impl Config {
    /// Check that required fields are present and every site is coherent.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.listen_addr.is_empty() {
            return Err(ConfigError::Invalid("server.listen_addr is required".into()));
        }
        if self.admin_keys.is_empty() {
            return Err(ConfigError::Invalid("admin_keys must not be empty".into()));
        }
        if self.nginx.binary_path.is_empty()
            || self.nginx.main_conf_path.is_empty()
            || self.nginx.sites_available.is_empty()
            || self.nginx.sites_enabled.is_empty()
            || self.nginx.override_conf.is_empty()
        {
            return Err(ConfigError::Invalid("nginx config paths are required".into()));
        }
        if self.jail.base_dir.is_empty() {
            return Err(ConfigError::Invalid("jail.base_dir is required".into()));
        }
        for (domain, site) in &self.site {
            if site.frontend_root.is_empty() && site.backend.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "site {domain}: frontend_root is required (or configure a backend for backend-only mode)"
                )));
            }
            if site.api_key.is_empty() {
                return Err(ConfigError::Invalid(format!("site {domain}: api_key is required")));
            }
        }
        Ok(())
    }
}
