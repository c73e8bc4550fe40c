//! shipyard-health — periodic in-jail backend probing.
//!
//! A single ticker walks every backend site, issues an HTTP GET against
//! `http://<jail_ip>:<listen_port><health_path>`, and tracks consecutive
//! failures per site. Hitting the threshold triggers one service restart
//! and resets the counter, so a wedged backend is bounced at a bounded
//! rate rather than hammered.

pub mod monitor;
pub mod probe;

pub use monitor::{HealthMonitor, ServiceStatus};
pub use probe::{http_probe, ProbeResult};
