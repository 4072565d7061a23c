use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::{Secret, WardConfig};
use crate::error::{Result, WardError};
use crate::health::{HealthEvaluator, HealthSettings, LivenessProbe, ProbeTarget, SignalProbe};
use crate::metrics::Metrics;
use crate::output::{RingLogBuffer, STDERR_TAG, WARD_TAG};
use crate::policy::{JitterSource, ThreadRngJitter};
use crate::types::*;
use crate::uptime::UptimeExtractor;

/// How often `stop` checks whether the child is gone.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const SPAWN_BUSY_RETRIES: u32 = 5;

pub struct Supervisor {
	state: RwLock<SupervisorState>,
	/// Serializes `start` and `stop`.
	ops: Mutex<()>,
	logs: RingLogBuffer,
	metrics: Metrics,
	evaluator: HealthEvaluator,
	jitter: Arc<dyn JitterSource>,
}

struct SupervisorState {
	phase: Phase,
	child: Option<ChildHandle>,
	started_at: Option<Instant>,
	healthy: bool,
	restart_count: u32,
	last_restart: Option<RestartAttempt>,
	/// Bumped on every spawn and stop. A monitor whose generation is no longer
	/// current must not touch the child slot.
	generation: u64,
	config: WardConfig,
	launch: Option<LaunchSpec>,
	wrapper: Option<PathBuf>,
	cancel: Option<watch::Sender<bool>>,
}

#[derive(Debug, Clone, Copy)]
struct ChildHandle {
	pid: u32,
	generation: u64,
}

/// A scheduled restart: attempt index and the backoff waited before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartAttempt {
	pub attempt: u32,
	pub delay: Duration,
}

/// Everything needed to spawn the child again with the same parameters.
#[derive(Clone)]
struct LaunchSpec {
	program: PathBuf,
	args: Vec<String>,
	env: HashMap<String, String>,
	secret: Option<(String, Secret)>,
}

enum Respawn {
	Spawned { child: Child, generation: u64 },
	/// A stop or a new start superseded this monitor.
	Stale,
	Failed,
}

impl Supervisor {
	pub fn new() -> Arc<Self> {
		Self::with_parts(Arc::new(SignalProbe), Arc::new(ThreadRngJitter))
	}

	/// Supervisor with an explicit liveness probe and jitter source.
	pub fn with_parts(probe: Arc<dyn LivenessProbe>, jitter: Arc<dyn JitterSource>) -> Arc<Self> {
		let config = WardConfig::default();
		Arc::new(Self {
			logs: RingLogBuffer::new(config.max_log_lines),
			state: RwLock::new(SupervisorState {
				phase: Phase::Stopped,
				child: None,
				started_at: None,
				healthy: false,
				restart_count: 0,
				last_restart: None,
				generation: 0,
				config,
				launch: None,
				wrapper: None,
				cancel: None,
			}),
			ops: Mutex::new(()),
			metrics: Metrics::new(),
			evaluator: HealthEvaluator::new(probe, UptimeExtractor::default()),
			jitter,
		})
	}

	pub fn logs(&self) -> &RingLogBuffer {
		&self.logs
	}

	pub fn metrics(&self) -> &Metrics {
		&self.metrics
	}

	pub fn evaluator(&self) -> &HealthEvaluator {
		&self.evaluator
	}

	pub async fn phase(&self) -> Phase {
		self.state.read().await.phase
	}

	pub async fn pid(&self) -> Option<u32> {
		self.state.read().await.child.map(|c| c.pid)
	}

	pub async fn restart_count(&self) -> u32 {
		self.state.read().await.restart_count
	}

	pub async fn last_restart(&self) -> Option<RestartAttempt> {
		self.state.read().await.last_restart
	}

	pub async fn is_healthy(&self) -> bool {
		self.state.read().await.healthy
	}

	/// Ephemeral wrapper script in use when credentials are auto-injected.
	pub async fn wrapper(&self) -> Option<PathBuf> {
		self.state.read().await.wrapper.clone()
	}

	pub(crate) async fn launch(self: &Arc<Self>, config: WardConfig) -> Result<()> {
		let _ops = self.ops.lock().await;

		let (generation, stale_wrapper) = {
			let mut state = self.state.write().await;
			if let Some(child) = state.child {
				return Err(WardError::AlreadyRunning { pid: child.pid });
			}
			if let Some(cancel) = state.cancel.take() {
				let _ = cancel.send(true);
			}
			state.generation += 1;
			state.phase = Phase::Starting;
			state.started_at = None;
			state.healthy = false;
			state.restart_count = 0;
			state.last_restart = None;
			state.launch = None;
			state.config = config.clone();
			(state.generation, state.wrapper.take())
		};
		if let Some(wrapper) = stale_wrapper {
			remove_wrapper(&wrapper, &config.binary);
		}
		self.evaluator.reset();
		self.logs.reset(config.max_log_lines).await;
		self.metrics.reset();

		let prepared = match self.prepare(&config).await {
			Ok(prepared) => prepared,
			Err(e) => {
				self.state.write().await.phase = Phase::Stopped;
				return Err(e);
			}
		};
		let (launch, wrapper) = prepared;

		let (mut child, pid) = match spawn_child(&launch).await {
			Ok(spawned) => spawned,
			Err(e) => {
				if let Some(wrapper) = &wrapper {
					remove_wrapper(wrapper, &config.binary);
				}
				self.state.write().await.phase = Phase::Stopped;
				return Err(e);
			}
		};
		self.metrics.record_spawn();
		self.attach_streams(&mut child, pid);

		let cancel_rx = {
			let mut state = self.state.write().await;
			let (cancel_tx, cancel_rx) = watch::channel(false);
			state.cancel = Some(cancel_tx);
			state.child = Some(ChildHandle { pid, generation });
			state.started_at = Some(Instant::now());
			state.phase = Phase::Running;
			state.launch = Some(launch);
			state.wrapper = wrapper;
			cancel_rx
		};
		self.logs.push(format!("{}started pid {}", WARD_TAG, pid)).await;
		info!(pid, binary = %config.binary.display(), "child started");

		let sup = Arc::clone(self);
		tokio::spawn(async move {
			sup.monitor(child, generation).await;
		});

		self.schedule_initial_check(config.startup_grace(), cancel_rx);
		Ok(())
	}

	/// Verifies the binary and resolves credential injection into a launch spec.
	async fn prepare(&self, config: &WardConfig) -> Result<(LaunchSpec, Option<PathBuf>)> {
		ensure_executable(&config.binary)?;

		let secret = config
			.secret()
			.map(|s| (config.secret_env.clone(), s.clone()));
		let mut launch = LaunchSpec {
			program: config.binary.clone(),
			args: config.args.clone(),
			env: config.env.clone(),
			secret,
		};

		let wrapper = match config.secret() {
			Some(_) if config.auto_inject => {
				let wrapper = write_wrapper(&config.binary, &config.inject_args)?;
				debug!(wrapper = %wrapper.display(), "credential injection folded into wrapper");
				launch.program = wrapper.clone();
				Some(wrapper)
			}
			Some(secret) => {
				inject_secret(config, secret).await?;
				None
			}
			None => None,
		};
		Ok((launch, wrapper))
	}

	fn schedule_initial_check(self: &Arc<Self>, grace: Duration, mut cancel: watch::Receiver<bool>) {
		let sup = Arc::clone(self);
		tokio::spawn(async move {
			tokio::select! {
				_ = tokio::time::sleep(grace) => {}
				_ = cancel.changed() => return,
			}
			if sup.check_health().await {
				info!("initial health check passed");
			} else {
				warn!("initial health check did not pass");
			}
		});
	}

	fn attach_streams(self: &Arc<Self>, child: &mut Child, pid: u32) {
		if let Some(stdout) = child.stdout.take() {
			let logs = self.logs.clone();
			tokio::spawn(async move {
				let mut reader = BufReader::new(stdout);
				let mut buf = Vec::new();
				while let Some(line) = read_line_lossy(&mut reader, &mut buf).await {
					debug!(pid, "stdout: {}", line);
					logs.push(line).await;
				}
			});
		}
		if let Some(stderr) = child.stderr.take() {
			let sup = Arc::clone(self);
			tokio::spawn(async move {
				sup.read_stderr(stderr, pid).await;
			});
		}
	}

	async fn read_stderr<R: AsyncRead + Unpin>(&self, stderr: R, pid: u32) {
		let mut reader = BufReader::new(stderr);
		let mut buf = Vec::new();
		while let Some(line) = read_line_lossy(&mut reader, &mut buf).await {
			debug!(pid, "stderr: {}", line);
			let rejected = is_credential_rejection(&line);
			self.logs.push(format!("{}{}", STDERR_TAG, line)).await;
			if rejected {
				warn!(pid, "child rejected its credentials, terminating");
				self.metrics.record_credential_rejection();
				if let Err(e) = signal_child(pid, Signal::SIGTERM) {
					warn!(pid, error = %e, "could not terminate child after credential rejection");
				}
			}
		}
	}

	/// Owns the child: waits for it to exit and runs the restart loop.
	async fn monitor(self: Arc<Self>, mut child: Child, mut generation: u64) {
		loop {
			let status = child.wait().await;
			if !self.observe_exit(generation, &status).await {
				return;
			}

			loop {
				let Some((delay, mut cancel)) = self.plan_restart(generation).await else {
					return;
				};
				tokio::select! {
					_ = tokio::time::sleep(delay) => {}
					_ = cancel.changed() => return,
				}
				match self.respawn(generation).await {
					Respawn::Spawned { child: next, generation: next_generation } => {
						child = next;
						generation = next_generation;
						break;
					}
					Respawn::Stale => return,
					Respawn::Failed => continue,
				}
			}
		}
	}

	/// Records an exit. Returns whether the exit was unexpected.
	async fn observe_exit(&self, generation: u64, status: &std::io::Result<ExitStatus>) -> bool {
		let mut state = self.state.write().await;
		if state.generation != generation || !state.phase.wants_child() {
			debug!(generation, "exit of a child that is no longer wanted");
			return false;
		}
		let pid = state.child.map(|c| c.pid);
		state.child = None;
		state.healthy = false;
		drop(state);

		match status {
			Ok(status) => {
				warn!(pid, %status, "child exited unexpectedly");
				self.logs.push(format!("{}child exited ({})", WARD_TAG, status)).await;
			}
			Err(e) => error!(pid, error = %e, "lost track of child"),
		}
		self.evaluator.invalidate();
		true
	}

	async fn plan_restart(&self, generation: u64) -> Option<(Duration, watch::Receiver<bool>)> {
		let mut state = self.state.write().await;
		if state.generation != generation || !state.phase.wants_child() {
			return None;
		}
		let policy = state.config.restart_policy();
		if !policy.allows(state.restart_count) {
			state.phase = Phase::Failed;
			error!(
				restarts = state.restart_count,
				max = policy.max_attempts,
				"restart attempts exhausted, giving up"
			);
			return None;
		}
		let cancel = state.cancel.as_ref()?.subscribe();

		let attempt = state.restart_count;
		let delay = policy.delay(attempt, self.jitter.as_ref());
		state.restart_count += 1;
		state.phase = Phase::Restarting;
		state.last_restart = Some(RestartAttempt { attempt, delay });
		self.metrics.record_restart();
		info!(
			attempt = attempt + 1,
			max = policy.max_attempts,
			?delay,
			"restart scheduled"
		);
		Some((delay, cancel))
	}

	async fn respawn(self: &Arc<Self>, generation: u64) -> Respawn {
		let mut state = self.state.write().await;
		if state.generation != generation || state.phase != Phase::Restarting {
			return Respawn::Stale;
		}
		let Some(launch) = state.launch.clone() else {
			return Respawn::Stale;
		};

		self.logs.clear().await;
		// The new child counts its uptime from zero again.
		self.evaluator.reset();
		match spawn_child(&launch).await {
			Ok((mut child, pid)) => {
				state.generation += 1;
				let generation = state.generation;
				state.child = Some(ChildHandle { pid, generation });
				state.started_at = Some(Instant::now());
				state.phase = Phase::Running;
				let restarts = state.restart_count;
				drop(state);

				self.metrics.record_spawn();
				self.attach_streams(&mut child, pid);
				self.logs.push(format!("{}restarted as pid {}", WARD_TAG, pid)).await;
				info!(pid, restarts, "child respawned");
				Respawn::Spawned { child, generation }
			}
			Err(e) => {
				error!(error = %e, "respawn did not succeed");
				Respawn::Failed
			}
		}
	}

	pub(crate) async fn check_health(&self) -> bool {
		let (target, settings, in_grace) = {
			let state = self.state.read().await;
			let target = match (state.child, state.started_at) {
				(Some(child), Some(started_at)) => Some(ProbeTarget {
					pid: child.pid,
					started_at,
				}),
				_ => None,
			};
			let grace = state.config.startup_grace();
			let in_grace = state
				.started_at
				.map(|t| t.elapsed() <= grace)
				.unwrap_or(false);
			let settings = HealthSettings {
				cache_ttl: state.config.health_cache_ttl(),
				startup_grace: grace,
			};
			(target, settings, in_grace)
		};
		let Some(target) = target else {
			return false;
		};

		let metrics = self
			.evaluator
			.evaluate(Instant::now(), Some(target), settings, &self.logs, &self.metrics)
			.await;
		let healthy = if in_grace {
			metrics.verdict_in_grace()
		} else {
			metrics.verdict()
		};

		let mut state = self.state.write().await;
		if state.child.map(|c| c.pid) != Some(target.pid) {
			debug!("child changed during the health check");
			return false;
		}
		state.healthy = healthy;
		if matches!(state.phase, Phase::Running | Phase::Unhealthy) {
			state.phase = if healthy { Phase::Running } else { Phase::Unhealthy };
		}
		if !healthy {
			debug!(?metrics, in_grace, "health check negative");
		}
		healthy
	}

	pub(crate) async fn heartbeat_snapshot(&self) -> Heartbeat {
		let (target, phase, restart_count, healthy) = {
			let state = self.state.read().await;
			let target = match (state.child, state.started_at) {
				(Some(child), Some(started_at)) => Some(ProbeTarget {
					pid: child.pid,
					started_at,
				}),
				_ => None,
			};
			(target, state.phase, state.restart_count, state.healthy)
		};
		let (alive, uptime_seconds) = self.evaluator.peek(target, &self.logs).await;
		Heartbeat {
			phase,
			alive,
			pid: target.map(|t| t.pid),
			uptime_seconds,
			restart_count,
			healthy,
			metrics: self.metrics.snapshot(),
		}
	}

	pub(crate) async fn shutdown(&self) -> Result<()> {
		let _ops = self.ops.lock().await;

		let (child, wrapper, binary, timeout) = {
			let mut state = self.state.write().await;
			state.generation += 1;
			if let Some(cancel) = state.cancel.take() {
				let _ = cancel.send(true);
			}
			state.phase = Phase::Stopped;
			(
				state.child.take(),
				state.wrapper.take(),
				state.config.binary.clone(),
				state.config.shutdown_timeout(),
			)
		};

		let outcome = match child {
			Some(child) => {
				info!(pid = child.pid, ?timeout, "stopping child");
				terminate(child.pid, timeout).await.map(|forced| {
					if forced {
						self.metrics.record_forced_kill();
					}
				})
			}
			None => Ok(()),
		};

		if let Some(wrapper) = wrapper {
			remove_wrapper(&wrapper, &binary);
		}

		{
			let mut state = self.state.write().await;
			state.phase = Phase::Stopped;
			state.started_at = None;
			state.healthy = false;
			state.launch = None;
		}
		self.logs.clear().await;
		self.evaluator.reset();
		info!("supervisor stopped");
		outcome
	}
}

pub(crate) fn ensure_executable(path: &Path) -> Result<()> {
	let meta = match std::fs::metadata(path) {
		Ok(meta) => meta,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			return Err(WardError::BinaryMissing { path: path.to_path_buf() });
		}
		Err(_) => return Err(WardError::NotExecutable { path: path.to_path_buf() }),
	};
	if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
		return Err(WardError::NotExecutable { path: path.to_path_buf() });
	}
	Ok(())
}

/// Runs `<binary> <inject args>` with the secret in the environment.
pub(crate) async fn inject_secret(config: &WardConfig, secret: &Secret) -> Result<()> {
	info!(binary = %config.binary.display(), "installing credentials");
	let mut cmd = Command::new(&config.binary);
	cmd.args(&config.inject_args)
		.envs(&config.env)
		.env(&config.secret_env, secret.expose())
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped());
	let child = spawn_retrying(&mut cmd).await.map_err(WardError::CredentialIo)?;
	let output = child
		.wait_with_output()
		.await
		.map_err(WardError::CredentialIo)?;

	if output.status.success() {
		return Ok(());
	}
	let stderr = String::from_utf8_lossy(&output.stderr);
	warn!(
		code = ?output.status.code(),
		stderr = %stderr.trim(),
		"credential injection exited non-zero"
	);
	Err(WardError::CredentialRejected {
		code: output.status.code(),
	})
}

/// Shell wrapper that injects credentials, then `exec`s the binary so the
/// child keeps the wrapper's pid.
fn write_wrapper(binary: &Path, inject_args: &[String]) -> Result<PathBuf> {
	let binary = shell_quote(&binary.to_string_lossy());
	let inject: Vec<String> = inject_args.iter().map(|a| shell_quote(a)).collect();
	let script = format!(
		"#!/bin/sh\n{} {} || exit $?\nexec {} \"$@\"\n",
		binary,
		inject.join(" "),
		binary
	);

	let mut file = tempfile::Builder::new()
		.prefix("ward-wrapper-")
		.suffix(".sh")
		.permissions(std::fs::Permissions::from_mode(0o700))
		.tempfile()
		.map_err(WardError::CredentialIo)?;
	file.write_all(script.as_bytes()).map_err(WardError::CredentialIo)?;
	file.into_temp_path()
		.keep()
		.map_err(|e| WardError::CredentialIo(e.error))
}

fn remove_wrapper(wrapper: &Path, binary: &Path) {
	if wrapper == binary {
		return;
	}
	if let Err(e) = std::fs::remove_file(wrapper) {
		warn!(wrapper = %wrapper.display(), error = %e, "could not remove wrapper script");
	}
}

fn shell_quote(s: &str) -> String {
	format!("'{}'", s.replace('\'', r"'\''"))
}

async fn spawn_child(launch: &LaunchSpec) -> Result<(Child, u32)> {
	let mut cmd = Command::new(&launch.program);
	cmd.args(&launch.args)
		.envs(&launch.env)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.process_group(0);
	if let Some((name, secret)) = &launch.secret {
		cmd.env(name, secret.expose());
	}

	let child = spawn_retrying(&mut cmd)
		.await
		.map_err(|source| WardError::Spawn {
			program: launch.program.clone(),
			source,
		})?;
	let pid = child.id().ok_or(WardError::NoPid)?;
	Ok((child, pid))
}

/// A freshly written script can still be open in a concurrently forked
/// process, which makes exec fail with ETXTBSY for a moment.
async fn spawn_retrying(cmd: &mut Command) -> std::io::Result<Child> {
	let mut attempt = 0;
	loop {
		match cmd.spawn() {
			Err(e) if e.raw_os_error() == Some(Errno::ETXTBSY as i32) && attempt < SPAWN_BUSY_RETRIES => {
				attempt += 1;
				tokio::time::sleep(Duration::from_millis(20)).await;
			}
			result => return result,
		}
	}
}

/// Next line of child output without its line ending. Bytes that are not
/// UTF-8 are replaced, so arbitrary output never closes the pipe early.
async fn read_line_lossy<R: AsyncRead + Unpin>(
	reader: &mut BufReader<R>,
	buf: &mut Vec<u8>,
) -> Option<String> {
	buf.clear();
	match reader.read_until(b'\n', buf).await {
		Ok(0) => None,
		Ok(_) => {
			if buf.last() == Some(&b'\n') {
				buf.pop();
				if buf.last() == Some(&b'\r') {
					buf.pop();
				}
			}
			Some(String::from_utf8_lossy(buf).into_owned())
		}
		Err(e) => {
			debug!(error = %e, "output stream closed");
			None
		}
	}
}

/// Matches the child's "invalid secret" complaint on stderr.
pub fn is_credential_rejection(line: &str) -> bool {
	let lower = line.to_lowercase();
	lower.contains("invalid") && lower.contains("secret")
}

/// Signals the child's process group, falling back to the pid alone.
fn signal_child(pid: u32, signal: Signal) -> Result<()> {
	let target = Pid::from_raw(pid as i32);
	match killpg(target, signal) {
		Ok(()) => Ok(()),
		Err(Errno::ESRCH) => match kill(target, signal) {
			Ok(()) | Err(Errno::ESRCH) => Ok(()),
			Err(source) => Err(WardError::Signal { pid, source }),
		},
		Err(source) => Err(WardError::Signal { pid, source }),
	}
}

/// SIGTERM, poll until gone or `timeout`, then SIGKILL. Returns whether the
/// kill was needed.
async fn terminate(pid: u32, timeout: Duration) -> Result<bool> {
	signal_child(pid, Signal::SIGTERM)?;

	let deadline = Instant::now() + timeout;
	loop {
		if !process_exists(pid) {
			return Ok(false);
		}
		let now = Instant::now();
		if now >= deadline {
			break;
		}
		tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
	}

	warn!(pid, ?timeout, "child ignored SIGTERM, sending SIGKILL");
	signal_child(pid, Signal::SIGKILL)?;
	Ok(true)
}

fn process_exists(pid: u32) -> bool {
	SignalProbe.probe(pid).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credential_rejection_phrase() {
		assert!(is_credential_rejection("Error: invalid secret provided"));
		assert!(is_credential_rejection("SECRET key is INVALID"));
		assert!(!is_credential_rejection("invalid request"));
		assert!(!is_credential_rejection("secret rotated"));
	}

	#[test]
	fn quoting() {
		assert_eq!(shell_quote("/usr/bin/x"), "'/usr/bin/x'");
		assert_eq!(shell_quote("it's"), r"'it'\''s'");
	}

	#[test]
	fn executable_checks() {
		assert!(ensure_executable(Path::new("/bin/sh")).is_ok());
		assert!(matches!(
			ensure_executable(Path::new("/definitely/not/here")),
			Err(WardError::BinaryMissing { .. })
		));
		assert!(matches!(
			ensure_executable(Path::new("/tmp")),
			Err(WardError::NotExecutable { .. })
		));

		let file = std::env::temp_dir().join(format!("ward-noexec-{}", std::process::id()));
		std::fs::write(&file, "data").unwrap();
		std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();
		assert!(matches!(
			ensure_executable(&file),
			Err(WardError::NotExecutable { .. })
		));
		let _ = std::fs::remove_file(&file);
	}

	#[test]
	fn wrapper_script_injects_then_execs() {
		let wrapper = write_wrapper(Path::new("/opt/bin/svc"), &["install-secret".into()]).unwrap();
		let script = std::fs::read_to_string(&wrapper).unwrap();
		assert!(script.starts_with("#!/bin/sh\n"));
		assert!(script.contains("'/opt/bin/svc' 'install-secret' || exit $?"));
		assert!(script.contains("exec '/opt/bin/svc' \"$@\""));
		let mode = std::fs::metadata(&wrapper).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o700);

		remove_wrapper(&wrapper, Path::new("/opt/bin/svc"));
		assert!(!wrapper.exists());
	}

	#[test]
	fn wrappers_get_distinct_paths() {
		let first = write_wrapper(Path::new("/opt/bin/svc"), &[]).unwrap();
		let second = write_wrapper(Path::new("/opt/bin/svc"), &[]).unwrap();
		assert_ne!(first, second);
		let name = first.file_name().unwrap().to_string_lossy().into_owned();
		assert!(name.starts_with("ward-wrapper-") && name.ends_with(".sh"), "{}", name);
		remove_wrapper(&first, Path::new("/opt/bin/svc"));
		remove_wrapper(&second, Path::new("/opt/bin/svc"));
	}

	#[tokio::test]
	async fn lines_survive_invalid_utf8() {
		let input: &[u8] = b"boot \xff\xfe\nuptime: 1 seconds\r\n\nlast";
		let mut reader = BufReader::new(input);
		let mut buf = Vec::new();
		let mut lines = Vec::new();
		while let Some(line) = read_line_lossy(&mut reader, &mut buf).await {
			lines.push(line);
		}
		assert_eq!(lines, vec!["boot \u{FFFD}\u{FFFD}", "uptime: 1 seconds", "", "last"]);
	}

	#[test]
	fn wrapper_equal_to_binary_is_kept() {
		let file = std::env::temp_dir().join(format!("ward-keep-{}", std::process::id()));
		std::fs::write(&file, "#!/bin/sh\n").unwrap();
		remove_wrapper(&file, &file);
		assert!(file.exists());
		let _ = std::fs::remove_file(&file);
	}

	#[tokio::test]
	async fn terminate_gone_process() {
		let mut child = std::process::Command::new("true").spawn().unwrap();
		let pid = child.id();
		child.wait().unwrap();
		let forced = terminate(pid, Duration::from_millis(200)).await.unwrap();
		assert!(!forced);
	}
}
