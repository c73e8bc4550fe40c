//! OS service manager integration, selected at build time.

#[cfg(target_os = "freebsd")]
pub use freebsd::*;

#[cfg(not(target_os = "freebsd"))]
pub use noop::*;

#[cfg(target_os = "freebsd")]
mod freebsd {
    use tokio::process::Command;

    use crate::error::{ServiceError, ServiceResult};

    pub async fn enable(name: &str) -> ServiceResult<()> {
        run("sysrc", &[&format!("{name}_enable=YES")], "enable").await
    }

    pub async fn disable(name: &str) -> ServiceResult<()> {
        run("sysrc", &[&format!("{name}_enable=NO")], "disable").await
    }

    pub async fn start(name: &str) -> ServiceResult<()> {
        run("service", &[name, "start"], "start").await
    }

    pub async fn stop(name: &str) {
        // Ignore failures — the service might not be running.
        let _ = Command::new("service").args([name, "stop"]).output().await;
    }

    pub async fn restart(name: &str) -> ServiceResult<()> {
        run("service", &[name, "restart"], "restart").await
    }

    pub async fn status(name: &str) -> bool {
        Command::new("service")
            .args([name, "status"])
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn run(binary: &str, args: &[&str], action: &str) -> ServiceResult<()> {
        let output = Command::new(binary)
            .args(args)
            .output()
            .await
            .map_err(|source| ServiceError::Spawn {
                binary: binary.to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(ServiceError::Command {
                action: action.to_string(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(not(target_os = "freebsd"))]
mod noop {
    use crate::error::ServiceResult;

    pub async fn enable(_name: &str) -> ServiceResult<()> {
        Ok(())
    }

    pub async fn disable(_name: &str) -> ServiceResult<()> {
        Ok(())
    }

    pub async fn start(_name: &str) -> ServiceResult<()> {
        Ok(())
    }

    pub async fn stop(_name: &str) {}

    pub async fn restart(_name: &str) -> ServiceResult<()> {
        Ok(())
    }

    pub async fn status(_name: &str) -> bool {
        true
    }
}
