//! shipyardd — the deployment control plane daemon.
//!
//! Receives packaged frontend and backend artifacts over an authenticated
//! HTTP API and renders them live on this host: static trees under
//! commit-addressed directories with an atomically swapped `latest`
//! pointer, backend binaries supervised inside pot jails, and nginx
//! reconfigured, validated, and reloaded in lockstep. It can also replace
//! its own binary and restart under the external supervisor.
//!
//! # Usage
//!
//! ```text
//! shipyardd serve [--config /usr/local/etc/shipyard/shipyard.toml]
//! shipyardd version
//! shipyardd rollback
//! shipyardd bootstrap
//! ```

mod bootstrap;
mod pidfile;
mod serve;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use shipyard_config::Registry;
use shipyard_update::Updater;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build commit, injected by the release pipeline.
const COMMIT: &str = match option_env!("SHIPYARD_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

#[derive(Parser)]
#[command(name = "shipyardd", about = "Single-host deployment control plane")]
struct Cli {
    /// Configuration file (default: /usr/local/etc/shipyard/shipyard.toml,
    /// falling back to ./shipyard.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve,
    /// Print version info.
    ///
    /// The exact output line is the self-update validation contract.
    Version,
    /// Restore the previous binary after a failed update.
    Rollback,
    /// One-shot renewal of all certificates close to expiry.
    RenewCerts,
    /// Set shipyardd up on a fresh host.
    Bootstrap,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("shipyardd version {VERSION} (commit {COMMIT})");
            Ok(())
        }
        Command::Serve => serve::run(resolve_config_path(cli.config), VERSION, COMMIT).await,
        Command::Rollback => rollback(resolve_config_path(cli.config)),
        Command::RenewCerts => renew_certs(resolve_config_path(cli.config)).await,
        Command::Bootstrap => bootstrap::run(VERSION, COMMIT),
    }
}

async fn renew_certs(config_path: PathBuf) -> anyhow::Result<()> {
    let registry = Registry::load(&config_path)?;
    let tls = shipyard_tls::TlsProvisioner::new(&registry.snapshot().acme);
    tls.renew_all().await?;
    println!("Certificate renewal complete.");
    Ok(())
}

/// The system config location, or `./shipyard.toml` for development.
fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    let system = PathBuf::from("/usr/local/etc/shipyard/shipyard.toml");
    if system.exists() {
        system
    } else {
        PathBuf::from("shipyard.toml")
    }
}

fn rollback(config_path: PathBuf) -> anyhow::Result<()> {
    let registry = Registry::load(&config_path)?;
    let binary_path = registry.snapshot().self_update.binary_path;
    let updater = Updater::new(&binary_path);

    if !updater.has_backup() {
        bail!("no backup binary found at {binary_path}.old");
    }

    updater.rollback()?;
    println!("Rollback successful!");
    println!("Note: restart the shipyardd service for the change to take effect:");
    println!("  service shipyardd restart");
    Ok(())
}
