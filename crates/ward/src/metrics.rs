use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{Pid, System};

/// Restart timestamps kept for the heartbeat.
const MAX_RESTART_TIMESTAMPS: usize = 32;

/// Read-only copy of the counters, as handed to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
	pub health_checks: u64,
	pub last_health_check_ms: f64,
	pub avg_health_check_ms: f64,
	/// Resident set size of the child at the last health check.
	pub memory_rss_bytes: Option<u64>,
	pub spawns: u64,
	pub restarts: u64,
	/// Unix millis of the most recent restart attempts, oldest first.
	pub restart_timestamps: VecDeque<u64>,
	pub forced_kills: u64,
	pub credential_rejections: u64,
}

/// Running counters shared by the supervisor and the health evaluator.
#[derive(Clone, Default)]
pub struct Metrics {
	inner: Arc<Mutex<MetricsSnapshot>>,
	system: Arc<Mutex<System>>,
}

impl Metrics {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
		// Counters stay usable even if a holder panicked mid-update.
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn reset(&self) {
		*self.lock() = MetricsSnapshot::default();
	}

	pub fn snapshot(&self) -> MetricsSnapshot {
		self.lock().clone()
	}

	pub fn record_health_check(&self, took: Duration, memory_rss_bytes: Option<u64>) {
		let ms = took.as_secs_f64() * 1000.0;
		let mut m = self.lock();
		m.health_checks += 1;
		m.last_health_check_ms = ms;
		m.avg_health_check_ms += (ms - m.avg_health_check_ms) / m.health_checks as f64;
		if memory_rss_bytes.is_some() {
			m.memory_rss_bytes = memory_rss_bytes;
		}
	}

	/// Resident memory of `pid` in bytes, `None` once the process is gone.
	pub fn sample_memory(&self, pid: u32) -> Option<u64> {
		let pid = Pid::from_u32(pid);
		let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
		if !system.refresh_process(pid) {
			return None;
		}
		system.process(pid).map(|p| p.memory())
	}

	pub fn record_spawn(&self) {
		self.lock().spawns += 1;
	}

	pub fn record_restart(&self) {
		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis() as u64)
			.unwrap_or(0);
		let mut m = self.lock();
		m.restarts += 1;
		if m.restart_timestamps.len() >= MAX_RESTART_TIMESTAMPS {
			m.restart_timestamps.pop_front();
		}
		m.restart_timestamps.push_back(now);
	}

	pub fn record_forced_kill(&self) {
		self.lock().forced_kills += 1;
	}

	pub fn record_credential_rejection(&self) {
		self.lock().credential_rejections += 1;
	}
}
