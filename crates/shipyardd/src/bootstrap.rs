//! One-shot host setup: binary install, example config, nginx main
//! config, and the daemon's own rc.d script.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::{info, warn};

use shipyard_config::Config;

const BINARY_PATH: &str = "/usr/local/bin/shipyardd";
const CONFIG_DIR: &str = "/usr/local/etc/shipyard";
const RCD_PATH: &str = "/usr/local/etc/rc.d/shipyardd";

/// rc.d script supervising the daemon under daemon(8); a crash or a
/// self-update restart brings it back within 5 seconds.
const RCD_SCRIPT: &str = r#"#!/bin/sh
# PROVIDE: shipyardd
# REQUIRE: NETWORKING syslog
# KEYWORD: shutdown
#
# MANAGED BY SHIPYARD BOOTSTRAP

. /etc/rc.subr

name="shipyardd"
rcvar="${name}_enable"
pidfile="/var/run/shipyardd-daemon.pid"

command="/usr/sbin/daemon"
command_args="-P ${pidfile} -r -R 5 -f -l daemon -T shipyardd /usr/local/bin/shipyardd serve"

load_rc_config $name
: ${shipyardd_enable:=NO}

run_rc_command "$1"
"#;

pub fn run(version: &str, commit: &str) -> anyhow::Result<()> {
    // Bootstrap logs before serve's logging stack exists.
    tracing_subscriber::fmt().init();
    info!(version, commit, "starting bootstrap");

    install_binary();

    fs::create_dir_all(CONFIG_DIR)?;
    let config_path = Path::new(CONFIG_DIR).join("shipyard.toml");
    if config_path.exists() {
        info!(path = %config_path.display(), "config exists, leaving it alone");
    } else {
        fs::write(&config_path, example_config()?)?;
        info!(path = %config_path.display(), "example config written");
    }

    let main_conf = Path::new("/usr/local/etc/nginx/nginx.conf");
    if main_conf.exists() {
        info!(path = %main_conf.display(), "nginx main config exists, leaving it alone");
    } else if let Some(parent) = main_conf.parent() {
        fs::create_dir_all(parent)?;
        fs::write(main_conf, shipyard_nginx::main_conf())?;
        info!(path = %main_conf.display(), "nginx main config written");
    }

    // The main config includes override.conf; seed an empty one so nginx
    // validates before the first site exists.
    let override_conf = Path::new("/usr/local/etc/nginx/override.conf");
    if !override_conf.exists() {
        fs::write(override_conf, shipyard_nginx::override_conf(&Default::default()))?;
        info!(path = %override_conf.display(), "override config seeded");
    }

    fs::write(RCD_PATH, RCD_SCRIPT)?;
    fs::set_permissions(RCD_PATH, fs::Permissions::from_mode(0o755))?;
    info!(path = RCD_PATH, "rc.d script written");

    println!("\nNext steps:");
    println!("1. Edit the configuration: vi {}", config_path.display());
    println!("2. Enable shipyardd: sysrc shipyardd_enable=YES");
    println!("3. Start shipyardd: service shipyardd start");
    Ok(())
}

/// Copy the running executable into place. Non-fatal: on a dev box this
/// usually fails on permissions.
fn install_binary() {
    let result = std::env::current_exe()
        .and_then(|exe| fs::copy(&exe, BINARY_PATH))
        .and_then(|_| fs::set_permissions(BINARY_PATH, fs::Permissions::from_mode(0o755)));
    match result {
        Ok(()) => info!(path = BINARY_PATH, "binary installed"),
        Err(e) => warn!(path = BINARY_PATH, error = %e, "skipped binary install"),
    }
}

/// A fresh config document with placeholder credentials, serialized from
/// the real types so it is guaranteed to parse back.
fn example_config() -> anyhow::Result<String> {
    let mut config: Config = toml::from_str("")?;
    config
        .admin_keys
        .push("sk-admin-change-me-to-a-real-key".to_string());
    config.server.log_file = "/var/log/shipyard/shipyardd.log".to_string();
    Ok(toml::to_string_pretty(&config)?)
}
