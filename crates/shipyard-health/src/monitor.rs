//! The monitor loop: one ticker over all backend sites.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use shipyard_config::Registry;
use shipyard_service::ServiceSupervisor;

use crate::probe::{http_probe, ProbeResult};

/// Probe timeout per backend.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-backend monitoring record.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub last_check: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub healthy: bool,
}

/// Polls every backend site and restarts services that fail the
/// consecutive-failure threshold. Owns the status map; readers get cloned
/// snapshots.
pub struct HealthMonitor {
    registry: Arc<Registry>,
    supervisor: ServiceSupervisor,
    status: RwLock<HashMap<String, ServiceStatus>>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<Registry>, supervisor: ServiceSupervisor) -> Self {
        Self {
            registry,
            supervisor,
            status: RwLock::new(HashMap::new()),
        }
    }

    /// Run the poll loop until the shutdown channel flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval_secs = self.registry.snapshot().health.poll_interval_secs.max(1);
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // The immediate first tick would probe services that are still
        // starting alongside us.
        interval.tick().await;

        debug!(interval_secs, "health monitor started");
        loop {
            tokio::select! {
                _ = interval.tick() => self.check_all().await,
                _ = shutdown.changed() => {
                    debug!("health monitor stopping");
                    break;
                }
            }
        }
    }

    /// One sweep over every backend site.
    async fn check_all(&self) {
        let config = self.registry.snapshot();
        for (domain, site) in &config.site {
            let Some(backend) = &site.backend else {
                continue;
            };
            let address = format!("{}:{}", backend.jail_ip, backend.listen_port);
            let result = http_probe(&address, &config.health.health_path, PROBE_TIMEOUT).await;
            let restart = self.record(domain, result, config.health.failure_threshold);
            if restart {
                warn!(
                    %domain,
                    threshold = config.health.failure_threshold,
                    "health check threshold reached, restarting service"
                );
                if let Err(e) = self.supervisor.restart(domain).await {
                    warn!(%domain, error = %e, "service restart failed");
                }
            }
        }
    }

    /// Fold a probe result into the status map. Returns true when the
    /// failure threshold was hit (and resets the counter).
    fn record(&self, domain: &str, result: ProbeResult, threshold: u32) -> bool {
        let healthy = result.is_healthy();
        let mut map = self.status.write().expect("status lock poisoned");
        let status = map.entry(domain.to_string()).or_insert(ServiceStatus {
            last_check: Utc::now(),
            consecutive_failures: 0,
            healthy,
        });
        status.last_check = Utc::now();
        status.healthy = healthy;

        if healthy {
            status.consecutive_failures = 0;
            return false;
        }

        status.consecutive_failures += 1;
        if status.consecutive_failures >= threshold.max(1) {
            status.consecutive_failures = 0;
            return true;
        }
        false
    }

    /// Immutable snapshot of all statuses.
    pub fn status(&self) -> HashMap<String, ServiceStatus> {
        self.status.read().expect("status lock poisoned").clone()
    }

    /// Snapshot for one site.
    pub fn status_for(&self, domain: &str) -> Option<ServiceStatus> {
        self.status
            .read()
            .expect("status lock poisoned")
            .get(domain)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_config::Config;

    fn monitor() -> HealthMonitor {
        let dir = tempfile::tempdir().unwrap();
        let mut config: Config = toml::from_str("").unwrap();
        config.admin_keys.push("sk-admin-test".to_string());
        let registry = Arc::new(Registry::from_config(
            config,
            dir.path().join("shipyard.toml"),
        ));
        let supervisor = ServiceSupervisor::new(dir.path().join("rc.d"), "pot");
        HealthMonitor::new(registry, supervisor)
    }

    #[test]
    fn success_resets_failure_count() {
        let m = monitor();
        m.record("a.example.com", ProbeResult::Failed, 3);
        m.record("a.example.com", ProbeResult::Failed, 3);
        assert_eq!(
            m.status_for("a.example.com").unwrap().consecutive_failures,
            2
        );

        m.record("a.example.com", ProbeResult::Healthy, 3);
        let status = m.status_for("a.example.com").unwrap();
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.healthy);
    }

    #[test]
    fn threshold_triggers_restart_and_resets() {
        let m = monitor();
        assert!(!m.record("a.example.com", ProbeResult::Failed, 3));
        assert!(!m.record("a.example.com", ProbeResult::Unhealthy, 3));
        assert!(m.record("a.example.com", ProbeResult::Failed, 3));

        // Counter reset after the restart decision.
        assert_eq!(
            m.status_for("a.example.com").unwrap().consecutive_failures,
            0
        );
        assert!(!m.record("a.example.com", ProbeResult::Failed, 3));
    }

    #[test]
    fn status_snapshot_is_independent() {
        let m = monitor();
        m.record("a.example.com", ProbeResult::Healthy, 3);
        let snapshot = m.status();
        m.record("a.example.com", ProbeResult::Failed, 3);
        assert!(snapshot["a.example.com"].healthy);
    }

    #[test]
    fn unknown_site_has_no_status() {
        let m = monitor();
        assert!(m.status_for("nope.example.com").is_none());
    }
}
