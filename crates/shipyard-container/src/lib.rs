//! shipyard-container — typed wrapper around the `pot` jail CLI.
//!
//! Every backend runs inside a pot named after its domain
//! ([`naming::container_name`]). Pots are created with `-N inherit` so the
//! jail shares the host network stack and its service is reachable on
//! loopback. All operations shell out to the configured pot binary and
//! capture combined output into the error on failure.
//!
//! [`naming::container_name`]: shipyard_config::naming::container_name

use std::path::PathBuf;
use std::process::Output;

use tokio::process::Command;
use tracing::{debug, info};

use shipyard_config::naming::container_name;
use shipyard_config::JailConfig;

pub mod error;

pub use error::{ContainerError, ContainerResult};

/// Adapter over the pot CLI. A plain struct of paths — snapshots the jail
/// section of the config at construction.
#[derive(Debug, Clone)]
pub struct ContainerAdapter {
    pot_bin: String,
    freebsd_version: String,
    base_dir: String,
}

impl ContainerAdapter {
    pub fn new(jail: &JailConfig) -> Self {
        let pot_bin = if jail.binary_path.is_empty() {
            "pot".to_string()
        } else {
            jail.binary_path.clone()
        };
        Self {
            pot_bin,
            freebsd_version: jail.freebsd_version.clone(),
            base_dir: jail.base_dir.clone(),
        }
    }

    /// Create the pot for `domain` unless it already exists. Idempotent.
    pub async fn ensure(&self, domain: &str) -> ContainerResult<()> {
        let name = container_name(domain);
        if self.exists(&name).await {
            return Ok(());
        }
        info!(%domain, pot = %name, "creating pot");
        // -t single: one ZFS dataset; -N inherit: share the host network.
        self.run(&[
            "create",
            "-p",
            &name,
            "-t",
            "single",
            "-b",
            &self.freebsd_version,
            "-N",
            "inherit",
        ])
        .await?;
        Ok(())
    }

    /// Probe for the pot by name.
    async fn exists(&self, name: &str) -> bool {
        Command::new(&self.pot_bin)
            .args(["info", "-p", name])
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    pub async fn start(&self, domain: &str) -> ContainerResult<()> {
        let name = container_name(domain);
        info!(%domain, pot = %name, "starting pot");
        self.run(&["start", "-p", &name]).await?;
        Ok(())
    }

    /// Best-effort stop. A pot that is not running is not an error.
    pub async fn stop(&self, domain: &str) {
        let name = container_name(domain);
        debug!(%domain, pot = %name, "stopping pot");
        let result = Command::new(&self.pot_bin)
            .args(["stop", "-p", &name])
            .output()
            .await;
        if let Ok(out) = result {
            if !out.status.success() {
                debug!(%domain, "pot stop failed (may not be running)");
            }
        }
    }

    /// Stop then destroy the pot.
    pub async fn destroy(&self, domain: &str) -> ContainerResult<()> {
        let name = container_name(domain);
        info!(%domain, pot = %name, "destroying pot");
        self.stop(domain).await;
        self.run(&["destroy", "-p", &name]).await?;
        Ok(())
    }

    /// Run a command inside the pot.
    pub async fn exec(&self, domain: &str, argv: &[&str]) -> ContainerResult<()> {
        let name = container_name(domain);
        let mut args = vec!["exec", "-p", name.as_str()];
        args.extend_from_slice(argv);
        self.run(&args).await?;
        Ok(())
    }

    /// Copy a host file into a (running) pot. `-F` permits copying into a
    /// started pot.
    pub async fn copy_in(
        &self,
        domain: &str,
        host_path: &str,
        container_path: &str,
    ) -> ContainerResult<()> {
        let name = container_name(domain);
        self.run(&[
            "copy-in",
            "-p",
            &name,
            "-F",
            "-s",
            host_path,
            "-d",
            container_path,
        ])
        .await?;
        Ok(())
    }

    /// Whether the pot appears in `pot ps -q`.
    pub async fn is_running(&self, domain: &str) -> bool {
        let name = container_name(domain);
        let Ok(out) = Command::new(&self.pot_bin).args(["ps", "-q"]).output().await else {
            return false;
        };
        if !out.status.success() {
            return false;
        }
        String::from_utf8_lossy(&out.stdout)
            .lines()
            .any(|line| line.trim() == name)
    }

    /// Filesystem root of the pot's state, used for log tailing.
    ///
    /// Parses `pot-path:` out of `pot info -E`; falls back to the
    /// conventional location under the configured base dir.
    pub async fn path(&self, domain: &str) -> PathBuf {
        let name = container_name(domain);
        if let Ok(out) = Command::new(&self.pot_bin)
            .args(["info", "-p", &name, "-E"])
            .output()
            .await
        {
            if out.status.success() {
                let stdout = String::from_utf8_lossy(&out.stdout);
                for line in stdout.lines() {
                    if let Some(rest) = line.strip_prefix("pot-path:") {
                        return PathBuf::from(rest.trim());
                    }
                }
            }
        }
        PathBuf::from(&self.base_dir).join(&name)
    }

    async fn run(&self, args: &[&str]) -> ContainerResult<Output> {
        let action = args.first().copied().unwrap_or("pot");
        let output = Command::new(&self.pot_bin)
            .args(args)
            .output()
            .await
            .map_err(|source| ContainerError::Spawn {
                binary: self.pot_bin.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(ContainerError::Command {
                action: action.to_string(),
                output: combined_output(&output),
            });
        }
        Ok(output)
    }
}

/// stdout and stderr concatenated for error reporting.
fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr);
    }
    text
}
