//! Health inference for a child with no health API.
//!
//! A verdict combines three signals: the PID still answers a null signal, the
//! uptime reported in recent output keeps growing, and no recent line carries
//! an error keyword. Results are memoized for a short TTL so a host polling
//! aggressively costs at most one probe and one scan per window.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::metrics::Metrics;
use crate::output::RingLogBuffer;
use crate::types::{HealthMetrics, HealthSnapshot};
use crate::uptime::UptimeExtractor;

/// Lines examined for uptime and errors.
pub const SCAN_WINDOW: usize = 50;

pub const ERROR_KEYWORDS: &[&str] = &["error", "exception", "failed", "critical", "fatal"];

pub trait LivenessProbe: Send + Sync {
	/// `Ok(false)` when the process is gone or cannot be signalled.
	fn probe(&self, pid: u32) -> Result<bool, Errno>;
}

/// `kill(pid, 0)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalProbe;

impl LivenessProbe for SignalProbe {
	fn probe(&self, pid: u32) -> Result<bool, Errno> {
		// 0 and negative values address process groups, not a pid.
		if pid == 0 || pid > i32::MAX as u32 {
			return Ok(false);
		}
		match kill(Pid::from_raw(pid as i32), None::<Signal>) {
			Ok(()) => Ok(true),
			Err(Errno::ESRCH) | Err(Errno::EPERM) => Ok(false),
			Err(e) => Err(e),
		}
	}
}

/// The child a health check looks at.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTarget {
	pub pid: u32,
	pub started_at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthSettings {
	pub cache_ttl: Duration,
	pub startup_grace: Duration,
}

#[derive(Default)]
struct EvalState {
	snapshot: Option<HealthSnapshot>,
	last_uptime: f64,
	/// Bumped by `invalidate` and `reset`; an evaluation that straddles a bump
	/// does not store its result.
	epoch: u64,
}

pub struct HealthEvaluator {
	probe: Arc<dyn LivenessProbe>,
	extractor: UptimeExtractor,
	state: Mutex<EvalState>,
}

impl HealthEvaluator {
	pub fn new(probe: Arc<dyn LivenessProbe>, extractor: UptimeExtractor) -> Self {
		Self {
			probe,
			extractor,
			state: Mutex::new(EvalState::default()),
		}
	}

	fn lock(&self) -> MutexGuard<'_, EvalState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub async fn evaluate(
		&self,
		now: Instant,
		target: Option<ProbeTarget>,
		settings: HealthSettings,
		logs: &RingLogBuffer,
		metrics: &Metrics,
	) -> HealthMetrics {
		let Some(target) = target else {
			return HealthMetrics::default();
		};

		let epoch = {
			let state = self.lock();
			if let Some(snapshot) = state.snapshot {
				if snapshot.serves(target.pid, now, settings.cache_ttl) {
					return snapshot.metrics;
				}
			}
			state.epoch
		};

		let began = Instant::now();
		if !self.is_alive(target.pid) {
			return HealthMetrics::default();
		}

		let lines = logs.recent(SCAN_WINDOW).await;
		let uptime_seconds = self.extractor.extract(&lines);
		let has_recent_errors = contains_error(&lines);

		let uptime_increasing = {
			let mut state = self.lock();
			let increasing = uptime_seconds > state.last_uptime;
			if increasing && state.epoch == epoch {
				state.last_uptime = uptime_seconds;
			}
			increasing
		};

		if !uptime_increasing {
			let elapsed = now.saturating_duration_since(target.started_at);
			if elapsed > settings.startup_grace {
				warn!(pid = target.pid, uptime_seconds, ?elapsed, "uptime not increasing");
			} else {
				debug!(pid = target.pid, uptime_seconds, "no uptime progress yet, within grace");
			}
		}

		let result = HealthMetrics {
			uptime_seconds,
			is_running: true,
			has_recent_errors,
			uptime_increasing,
		};

		{
			let mut state = self.lock();
			if state.epoch == epoch {
				state.snapshot = Some(HealthSnapshot {
					pid: target.pid,
					metrics: result,
					captured_at: now,
				});
			}
		}
		metrics.record_health_check(began.elapsed(), metrics.sample_memory(target.pid));
		result
	}

	/// Liveness and reported uptime, leaving the cache and trend untouched.
	pub async fn peek(&self, target: Option<ProbeTarget>, logs: &RingLogBuffer) -> (bool, f64) {
		let alive = target.map(|t| self.is_alive(t.pid)).unwrap_or(false);
		let lines = logs.recent(SCAN_WINDOW).await;
		(alive, self.extractor.extract(&lines))
	}

	/// Drops the cached snapshot; the next evaluation recomputes.
	pub fn invalidate(&self) {
		let mut state = self.lock();
		state.snapshot = None;
		state.epoch += 1;
	}

	/// Drops the snapshot and forgets the last observed uptime.
	pub fn reset(&self) {
		let mut state = self.lock();
		let epoch = state.epoch + 1;
		*state = EvalState {
			epoch,
			..EvalState::default()
		};
	}

	pub fn last_uptime(&self) -> f64 {
		self.lock().last_uptime
	}

	fn is_alive(&self, pid: u32) -> bool {
		match self.probe.probe(pid) {
			Ok(alive) => alive,
			Err(e) => {
				warn!(pid, error = %e, "liveness probe failed");
				false
			}
		}
	}
}

pub fn contains_error<S: AsRef<str>>(lines: &[S]) -> bool {
	lines.iter().any(|line| {
		let lower = line.as_ref().to_lowercase();
		ERROR_KEYWORDS.iter().any(|k| lower.contains(k))
	})
}
