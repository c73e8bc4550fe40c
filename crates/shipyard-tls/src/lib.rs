//! shipyard-tls — certificate provisioning through an external ACME client.
//!
//! Drives certbot in webroot mode: the proxy serves
//! `/.well-known/acme-challenge/` from a fixed directory while certbot
//! completes the challenge. Presence of the issued files on disk is the
//! source of truth — expiry tracking belongs to certbot's own renewal
//! machinery.

use std::fs;
use std::path::PathBuf;

use tokio::process::Command;
use tracing::info;

pub mod error;

pub use error::{TlsError, TlsResult};

/// Drives the external ACME client. A plain struct of paths snapshotting
/// the `[acme]` config section.
#[derive(Debug, Clone)]
pub struct TlsProvisioner {
    certbot_bin: String,
    webroot: PathBuf,
    live_root: PathBuf,
}

impl TlsProvisioner {
    pub fn new(acme: &shipyard_config::AcmeConfig) -> Self {
        Self {
            certbot_bin: acme.binary_path.clone(),
            webroot: PathBuf::from(&acme.webroot),
            live_root: PathBuf::from(&acme.live_root),
        }
    }

    /// Conventional certificate and key locations for a domain.
    pub fn cert_paths(&self, domain: &str) -> (PathBuf, PathBuf) {
        let base = self.live_root.join(domain);
        (base.join("fullchain.pem"), base.join("privkey.pem"))
    }

    /// Both certificate files exist on disk.
    pub fn has_valid_cert(&self, domain: &str) -> bool {
        let (cert, key) = self.cert_paths(domain);
        cert.is_file() && key.is_file()
    }

    /// The challenge directory the HTTP-only proxy config serves from.
    pub fn webroot(&self) -> &std::path::Path {
        &self.webroot
    }

    /// Obtain a certificate via the webroot flow. Idempotent: returns
    /// immediately when the files already exist.
    ///
    /// The proxy must already be serving the challenge path for this
    /// domain.
    pub async fn obtain(&self, domain: &str) -> TlsResult<()> {
        if self.has_valid_cert(domain) {
            return Ok(());
        }

        let challenge_dir = self.webroot.join(".well-known").join("acme-challenge");
        fs::create_dir_all(&challenge_dir)?;

        info!(%domain, "requesting certificate");
        let output = Command::new(&self.certbot_bin)
            .args([
                "certonly",
                "--webroot",
                "--webroot-path",
                &self.webroot.display().to_string(),
                "--non-interactive",
                "--agree-tos",
                "--register-unsafely-without-email",
                "-d",
                domain,
            ])
            .output()
            .await
            .map_err(|source| TlsError::Spawn {
                binary: self.certbot_bin.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TlsError::Acme {
                domain: domain.to_string(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // certbot exiting zero without producing files would leave the site
        // half-provisioned; surface that as a failure.
        if !self.has_valid_cert(domain) {
            return Err(TlsError::MissingAfterIssue(domain.to_string()));
        }

        info!(%domain, "certificate obtained");
        Ok(())
    }

    /// One-shot renewal of everything close to expiry.
    pub async fn renew_all(&self) -> TlsResult<()> {
        let output = Command::new(&self.certbot_bin)
            .args([
                "renew",
                "--webroot",
                "--webroot-path",
                &self.webroot.display().to_string(),
                "--quiet",
            ])
            .output()
            .await
            .map_err(|source| TlsError::Spawn {
                binary: self.certbot_bin.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TlsError::Renew(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}
