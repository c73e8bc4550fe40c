//! The write → validate → enable → reload transaction.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{info, warn};

use shipyard_config::{NginxConfig, SiteConfig};

use crate::error::{NginxError, NginxResult};
use crate::generate;

/// How a site config should be activated.
pub enum TlsMode {
    /// Serve plain HTTP: the rendered config is activated as-is.
    Disabled,
    /// Apply the HTTPS transform before activation.
    Enabled { cert_path: String, key_path: String },
}

/// Result of a deploy attempt. `reloaded == false` means validation failed:
/// the staged file exists but nothing was enabled and nginx still runs its
/// previous configuration.
#[derive(Debug)]
pub struct DeployOutcome {
    pub reloaded: bool,
    pub validation_error: Option<String>,
}

/// Owns the staging (`sites-available/`) and active (`sites-enabled/`)
/// trees plus `override.conf`. The single authoritative writer for all
/// three.
#[derive(Debug, Clone)]
pub struct NginxManager {
    binary_path: String,
    sites_available: PathBuf,
    sites_enabled: PathBuf,
    override_conf: PathBuf,
    acme_webroot: String,
}

impl NginxManager {
    pub fn new(nginx: &NginxConfig, acme_webroot: impl Into<String>) -> Self {
        Self {
            binary_path: nginx.binary_path.clone(),
            sites_available: PathBuf::from(&nginx.sites_available),
            sites_enabled: PathBuf::from(&nginx.sites_enabled),
            override_conf: PathBuf::from(&nginx.override_conf),
            acme_webroot: acme_webroot.into(),
        }
    }

    /// Deploy a rendered site config.
    ///
    /// Stages the config (applying the HTTPS transform when requested),
    /// regenerates `override.conf`, validates the whole tree, and only on a
    /// clean validation enables the symlink and reloads. Validation failure
    /// is not an `Err` — the caller decides how to report the partial
    /// state.
    pub async fn deploy_site(
        &self,
        domain: &str,
        rendered_config: &str,
        tls: TlsMode,
        sites: &BTreeMap<String, SiteConfig>,
    ) -> NginxResult<DeployOutcome> {
        let final_config = match tls {
            TlsMode::Disabled => rendered_config.to_string(),
            TlsMode::Enabled {
                cert_path,
                key_path,
            } => generate::transform_to_https(
                rendered_config,
                domain,
                &cert_path,
                &key_path,
                &self.acme_webroot,
            ),
        };

        fs::create_dir_all(&self.sites_available)?;
        fs::write(self.available_path(domain), final_config)?;
        self.write_override_conf(sites)?;

        let (valid, message) = self.validate().await?;
        if !valid {
            warn!(%domain, error = %message, "nginx validation failed");
            return Ok(DeployOutcome {
                reloaded: false,
                validation_error: Some(message),
            });
        }

        self.enable_symlink(domain)?;
        info!(%domain, "reloading nginx");
        self.reload().await?;

        Ok(DeployOutcome {
            reloaded: true,
            validation_error: None,
        })
    }

    /// Deploy the minimal ACME-challenge-only config for a domain. Used as
    /// the first step of the TLS bootstrap, before the site exists in the
    /// registry.
    ///
    /// On validation failure both staged and enabled files are removed and
    /// an error is returned.
    pub async fn deploy_http_only(&self, domain: &str) -> NginxResult<()> {
        fs::create_dir_all(&self.sites_available)?;
        fs::create_dir_all(&self.sites_enabled)?;

        // The main config includes override.conf unconditionally; make
        // sure one exists before the first site ever deploys.
        if !self.override_conf.exists() {
            self.write_override_conf(&BTreeMap::new())?;
        }

        let config = generate::http_only_config(domain, &self.acme_webroot);
        fs::write(self.available_path(domain), config)?;
        self.enable_symlink(domain)?;

        let (valid, message) = self.validate().await?;
        if !valid {
            let _ = fs::remove_file(self.enabled_path(domain));
            let _ = fs::remove_file(self.available_path(domain));
            return Err(NginxError::Validation(message));
        }

        self.reload().await?;
        Ok(())
    }

    /// Remove a site's config from both trees, regenerate `override.conf`
    /// without it, validate, and reload.
    ///
    /// A validation failure after removal is reported but the files stay
    /// gone — only a later reload would propagate broken state, and the
    /// next validation is cheap.
    pub async fn remove_site(
        &self,
        domain: &str,
        remaining_sites: &BTreeMap<String, SiteConfig>,
    ) -> NginxResult<()> {
        let _ = fs::remove_file(self.enabled_path(domain));
        let _ = fs::remove_file(self.available_path(domain));
        self.write_override_conf(remaining_sites)?;

        let (valid, message) = self.validate().await?;
        if !valid {
            return Err(NginxError::Validation(message));
        }

        self.reload().await?;
        Ok(())
    }

    /// Remove a domain's config files without touching `override.conf` or
    /// consulting the registry. Cleanup path for a failed TLS bootstrap,
    /// where the site was never added.
    pub async fn remove_site_files(&self, domain: &str) {
        let _ = fs::remove_file(self.enabled_path(domain));
        let _ = fs::remove_file(self.available_path(domain));
        // Best-effort: bring nginx back to the surviving tree.
        let _ = self.reload().await;
    }

    /// Run `nginx -t` against the live tree. Returns `(false, output)` on a
    /// validation failure; `Err` only when the validator cannot be spawned.
    pub async fn validate(&self) -> NginxResult<(bool, String)> {
        let output = Command::new(&self.binary_path)
            .arg("-t")
            .output()
            .await
            .map_err(|source| NginxError::Spawn {
                binary: self.binary_path.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok((true, String::new()));
        }
        // nginx -t reports on stderr.
        let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if message.is_empty() {
            message = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        Ok((false, message))
    }

    /// Signal the running nginx to reload its configuration.
    pub async fn reload(&self) -> NginxResult<()> {
        let output = Command::new(&self.binary_path)
            .args(["-s", "reload"])
            .output()
            .await
            .map_err(|source| NginxError::Spawn {
                binary: self.binary_path.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(NginxError::Reload(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    fn write_override_conf(&self, sites: &BTreeMap<String, SiteConfig>) -> NginxResult<()> {
        if let Some(parent) = self.override_conf.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.override_conf, generate::override_conf(sites))?;
        Ok(())
    }

    /// `enabled/<domain>.conf` → `available/<domain>.conf`. Replaces any
    /// existing link.
    fn enable_symlink(&self, domain: &str) -> NginxResult<()> {
        fs::create_dir_all(&self.sites_enabled)?;
        let enabled = self.enabled_path(domain);
        let _ = fs::remove_file(&enabled);
        std::os::unix::fs::symlink(self.available_path(domain), &enabled)?;
        Ok(())
    }

    fn available_path(&self, domain: &str) -> PathBuf {
        self.sites_available.join(format!("{domain}.conf"))
    }

    fn enabled_path(&self, domain: &str) -> PathBuf {
        self.sites_enabled.join(format!("{domain}.conf"))
    }

    /// Directory the HTTP-only config serves ACME challenges from.
    pub fn acme_webroot(&self) -> &str {
        &self.acme_webroot
    }

    /// Staging path for a domain (exposed for status reporting and tests).
    pub fn staged_config_path(&self, domain: &str) -> PathBuf {
        self.available_path(domain)
    }

    /// Active path for a domain.
    pub fn enabled_config_path(&self, domain: &str) -> PathBuf {
        self.enabled_path(domain)
    }
}

impl NginxManager {
    /// Test constructor over explicit paths.
    #[doc(hidden)]
    pub fn with_paths(
        binary_path: impl Into<String>,
        root: &Path,
        acme_webroot: impl Into<String>,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            sites_available: root.join("sites-available"),
            sites_enabled: root.join("sites-enabled"),
            override_conf: root.join("override.conf"),
            acme_webroot: acme_webroot.into(),
        }
    }
}
