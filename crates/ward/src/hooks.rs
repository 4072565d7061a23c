//! Entry points invoked by the host's process-lifecycle framework.
//!
//! Each hook receives the environment the host wants applied and logs through
//! `tracing` inside a `hook` span; the host owns the subscriber.

use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::config::{Env, WardConfig};
use crate::error::Result;
use crate::supervisor::{ensure_executable, inject_secret, Supervisor};
use crate::types::{Heartbeat, InstallOutcome};

impl Supervisor {
	/// Verifies the binary and, when a secret is configured without
	/// auto-injection, installs it once ahead of `start`.
	pub async fn install_secrets(&self, env: &Env) -> Result<InstallOutcome> {
		async move {
			let config = WardConfig::from_env(env)?;
			ensure_executable(&config.binary)?;

			let secret_installed = match config.secret() {
				Some(secret) if !config.auto_inject => {
					inject_secret(&config, secret).await?;
					true
				}
				_ => false,
			};
			info!(binary = %config.binary.display(), secret_installed, "binary verified");
			Ok(InstallOutcome {
				success: true,
				secret_installed,
			})
		}
		.instrument(info_span!("hook", name = "install_secrets"))
		.await
	}

	/// Resets the supervisor and spawns the child. Fails on startup and
	/// credential errors; those are not retried.
	pub async fn start(self: &Arc<Self>, env: &Env) -> Result<()> {
		async move {
			let config = WardConfig::from_env(env)?;
			self.launch(config).await
		}
		.instrument(info_span!("hook", name = "start"))
		.await
	}

	/// Current verdict. Never fails; anything that goes wrong reads as unhealthy.
	pub async fn health(&self) -> bool {
		self.check_health()
			.instrument(info_span!("hook", name = "health"))
			.await
	}

	/// SIGTERM, then SIGKILL after the shutdown timeout. Only unexpected
	/// signalling errors are returned; the state is reset either way.
	pub async fn stop(&self) -> Result<()> {
		self.shutdown()
			.instrument(info_span!("hook", name = "stop"))
			.await
	}

	/// Point-in-time read that leaves the health cache untouched.
	pub async fn heartbeat(&self) -> Heartbeat {
		self.heartbeat_snapshot().await
	}
}
