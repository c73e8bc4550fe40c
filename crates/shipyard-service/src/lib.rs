//! shipyard-service — rc.d supervision for jailed backends.
//!
//! Each backend gets an rc.d script under `/usr/local/etc/rc.d/` that runs
//! the deployed binary inside its pot under `daemon -r` (restart on exit).
//! Enable/disable goes through `sysrc`, start/stop/restart/status through
//! `service(8)`.
//!
//! The OS integration is a build-time split: on FreeBSD the [`platform`]
//! module shells out; everywhere else it is a set of no-ops that return
//! success, so tests never spawn real services.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tracing::info;

use shipyard_config::naming::{container_name, service_name};
use shipyard_config::BackendConfig;

pub mod error;
mod platform;

pub use error::{ServiceError, ServiceResult};

/// rc.d script skeleton. Placeholders are substituted by
/// [`render_rcd_script`].
const RCD_TEMPLATE: &str = r#"#!/bin/sh
# PROVIDE: <%service%>
# REQUIRE: NETWORKING
# KEYWORD: shutdown
#
# MANAGED BY SHIPYARD

. /etc/rc.subr

name="<%service%>"
rcvar="${name}_enable"

start_cmd="<%service%>_start"
stop_cmd="<%service%>_stop"
status_cmd="<%service%>_status"

<%service%>_start()
{
    <%pot%> exec -p <%pot_name%> env PORT=<%port%> HOST=0.0.0.0 \
        /usr/sbin/daemon -r -R 5 -o /var/log/app.log -f <%binary%>
}

<%service%>_stop()
{
    <%pot%> stop -p <%pot_name%>
}

<%service%>_status()
{
    <%pot%> ps -q | grep -qx <%pot_name%>
}

load_rc_config $name
run_rc_command "$1"
"#;

/// Writes and removes per-site rc.d scripts and drives the OS service
/// manager. A plain struct of paths.
#[derive(Debug, Clone)]
pub struct ServiceSupervisor {
    rcd_dir: PathBuf,
    pot_bin: String,
}

impl ServiceSupervisor {
    pub fn new(rcd_dir: impl Into<PathBuf>, pot_bin: impl Into<String>) -> Self {
        Self {
            rcd_dir: rcd_dir.into(),
            pot_bin: pot_bin.into(),
        }
    }

    /// Conventional location on FreeBSD.
    pub fn system() -> Self {
        Self::new("/usr/local/etc/rc.d", "pot")
    }

    /// Render and install the rc.d script for a backend site.
    pub fn create(&self, domain: &str, backend: &BackendConfig) -> ServiceResult<()> {
        let script = render_rcd_script(domain, &self.pot_bin, backend);
        let path = self.rcd_dir.join(service_name(domain));
        fs::create_dir_all(&self.rcd_dir)?;
        fs::write(&path, script)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        info!(%domain, path = %path.display(), "rc.d script written");
        Ok(())
    }

    /// Remove the rc.d script. Missing script is not an error.
    pub fn remove(&self, domain: &str) {
        let _ = fs::remove_file(self.rcd_dir.join(service_name(domain)));
    }

    pub async fn enable(&self, domain: &str) -> ServiceResult<()> {
        info!(%domain, "enabling service");
        platform::enable(&service_name(domain)).await
    }

    pub async fn disable(&self, domain: &str) -> ServiceResult<()> {
        info!(%domain, "disabling service");
        platform::disable(&service_name(domain)).await
    }

    pub async fn start(&self, domain: &str) -> ServiceResult<()> {
        info!(%domain, "starting service");
        platform::start(&service_name(domain)).await
    }

    /// Best-effort stop; a service that is not running is not an error.
    pub async fn stop(&self, domain: &str) {
        info!(%domain, "stopping service");
        platform::stop(&service_name(domain)).await;
    }

    pub async fn restart(&self, domain: &str) -> ServiceResult<()> {
        info!(%domain, "restarting service");
        platform::restart(&service_name(domain)).await
    }

    pub async fn status(&self, domain: &str) -> bool {
        platform::status(&service_name(domain)).await
    }
}

/// Substitute the per-site values into the rc.d skeleton.
fn render_rcd_script(domain: &str, pot_bin: &str, backend: &BackendConfig) -> String {
    let binary_path = format!("/usr/local/bin/{}", backend.binary_name);
    RCD_TEMPLATE
        .replace("<%service%>", &service_name(domain))
        .replace("<%pot_name%>", &container_name(domain))
        .replace("<%pot%>", pot_bin)
        .replace("<%binary%>", &binary_path)
        .replace("<%port%>", &backend.listen_port.to_string())
}
