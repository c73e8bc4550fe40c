//! Single-writer configuration registry.
//!
//! Wraps the parsed [`Config`] behind an `RwLock`. Readers take cheap cloned
//! snapshots; mutators hold the write lock for the whole mutate-and-persist
//! sequence, so the on-disk document and the in-memory state cannot be
//! observed out of sync.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, SiteConfig};

/// Process-wide configuration state with TOML persistence.
pub struct Registry {
    path: PathBuf,
    inner: RwLock<Config>,
}

impl Registry {
    /// Read, parse, and validate the config file at `path`.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let data = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&data)?;
        config.validate()?;
        debug!(path = %path.display(), sites = config.site.len(), "config loaded");
        Ok(Self {
            path,
            inner: RwLock::new(config),
        })
    }

    /// Build a registry from an already-constructed config. The document is
    /// not written until the first mutation.
    pub fn from_config(config: Config, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: RwLock::new(config),
        }
    }

    /// Path of the backing TOML document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cloned snapshot of the whole document.
    pub fn snapshot(&self) -> Config {
        self.inner.read().expect("config lock poisoned").clone()
    }

    /// Snapshot of a single site.
    pub fn site(&self, domain: &str) -> Option<SiteConfig> {
        self.inner
            .read()
            .expect("config lock poisoned")
            .site
            .get(domain)
            .cloned()
    }

    /// Snapshot of a single site, or `SiteNotFound`.
    pub fn require_site(&self, domain: &str) -> ConfigResult<SiteConfig> {
        self.site(domain)
            .ok_or_else(|| ConfigError::SiteNotFound(domain.to_string()))
    }

    /// Snapshot of a site that must have a backend configured.
    pub fn require_backend_site(&self, domain: &str) -> ConfigResult<SiteConfig> {
        let site = self.require_site(domain)?;
        if site.backend.is_none() {
            return Err(ConfigError::NoBackend(domain.to_string()));
        }
        Ok(site)
    }

    /// Add a new site and persist. Fails on a duplicate domain or a backend
    /// address already allocated to another site.
    pub fn add_site(&self, domain: &str, site: SiteConfig) -> ConfigResult<()> {
        let mut cfg = self.inner.write().expect("config lock poisoned");
        if cfg.site.contains_key(domain) {
            return Err(ConfigError::SiteExists(domain.to_string()));
        }
        if let Some(ref backend) = site.backend {
            let clash = cfg.site.iter().any(|(_, s)| {
                s.backend
                    .as_ref()
                    .is_some_and(|b| b.jail_ip == backend.jail_ip)
            });
            if clash {
                return Err(ConfigError::Invalid(format!(
                    "jail ip {} already allocated",
                    backend.jail_ip
                )));
            }
        }
        cfg.site.insert(domain.to_string(), site);
        self.persist(&cfg)?;
        debug!(%domain, "site added");
        Ok(())
    }

    /// Remove a site and persist.
    pub fn remove_site(&self, domain: &str) -> ConfigResult<()> {
        let mut cfg = self.inner.write().expect("config lock poisoned");
        if cfg.site.remove(domain).is_none() {
            return Err(ConfigError::SiteNotFound(domain.to_string()));
        }
        self.persist(&cfg)?;
        debug!(%domain, "site removed");
        Ok(())
    }

    /// Mutate an existing site in place and persist.
    pub fn update_site(
        &self,
        domain: &str,
        mutate: impl FnOnce(&mut SiteConfig),
    ) -> ConfigResult<()> {
        let mut cfg = self.inner.write().expect("config lock poisoned");
        let site = cfg
            .site
            .get_mut(domain)
            .ok_or_else(|| ConfigError::SiteNotFound(domain.to_string()))?;
        mutate(site);
        self.persist(&cfg)?;
        Ok(())
    }

    /// Allocate the next jail address on the configured /24: the highest
    /// last octet in use, plus one.
    pub fn next_jail_ip(&self) -> String {
        let cfg = self.inner.read().expect("config lock poisoned");
        let base = if cfg.jail.ip_base.is_empty() {
            "127.0.1"
        } else {
            cfg.jail.ip_base.as_str()
        };
        let max = cfg
            .site
            .values()
            .filter_map(|s| s.backend.as_ref())
            .filter_map(|b| b.jail_ip.rsplit('.').next())
            .filter_map(|octet| octet.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{base}.{}", max + 1)
    }

    /// Write the document to disk. Called with the write lock held.
    fn persist(&self, cfg: &Config) -> ConfigResult<()> {
        let doc = toml::to_string_pretty(cfg)?;
        fs::write(&self.path, doc).map_err(|source| ConfigError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}
