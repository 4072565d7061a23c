use serde::Serialize;
use std::time::{Duration, Instant};

use crate::metrics::MetricsSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HealthMetrics {
	pub uptime_seconds: f64,
	pub is_running: bool,
	pub has_recent_errors: bool,
	pub uptime_increasing: bool,
}

impl HealthMetrics {
	/// Overall verdict handed to the host.
	///
	/// A non-increasing uptime alone never fails it once any uptime has been
	/// reported.
	pub fn verdict(&self) -> bool {
		self.is_running
			&& !self.has_recent_errors
			&& (self.uptime_increasing || self.uptime_seconds > 0.0)
	}

	/// Verdict while the child is inside its startup grace period, where a
	/// missing uptime line is tolerated and only liveness and errors count.
	pub fn verdict_in_grace(&self) -> bool {
		self.is_running && !self.has_recent_errors
	}
}

#[derive(Debug, Clone, Copy)]
pub struct HealthSnapshot {
	/// Child the metrics were taken from.
	pub pid: u32,
	pub metrics: HealthMetrics,
	pub captured_at: Instant,
}

impl HealthSnapshot {
	pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
		now.saturating_duration_since(self.captured_at) < ttl
	}

	/// Fresh and taken from the same child.
	pub fn serves(&self, pid: u32, now: Instant, ttl: Duration) -> bool {
		self.pid == pid && self.is_fresh(now, ttl)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	Stopped,
	Starting,
	Running,
	Unhealthy,
	Restarting,
	/// Restart attempts exhausted; needs an explicit stop/start.
	Failed,
}

impl Phase {
	pub fn wants_child(&self) -> bool {
		matches!(
			self,
			Phase::Starting | Phase::Running | Phase::Unhealthy | Phase::Restarting
		)
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
	pub phase: Phase,
	pub alive: bool,
	pub pid: Option<u32>,
	pub uptime_seconds: f64,
	pub restart_count: u32,
	pub healthy: bool,
	pub metrics: MetricsSnapshot,
}

/// Result of the `install_secrets` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
	pub success: bool,
	/// Whether a credential was pre-installed through the injection step.
	pub secret_installed: bool,
}
