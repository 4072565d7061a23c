//! Errors surfaced to the host through the lifecycle hooks.
//!
//! Health checks never produce one of these: evaluation failures degrade to an
//! unhealthy verdict. Everything else the host can observe is a [`WardError`].

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WardError>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WardError {
	/// The configured binary does not exist.
	#[error("supervised binary not found at {}", .path.display())]
	BinaryMissing { path: PathBuf },

	/// The configured binary exists but is not an executable file.
	#[error("supervised binary at {} is not executable", .path.display())]
	NotExecutable { path: PathBuf },

	#[error("failed to spawn {}: {source}", .program.display())]
	Spawn {
		program: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The OS accepted the spawn but handed back no process id.
	#[error("spawned child has no pid")]
	NoPid,

	/// The credential injection step exited non-zero.
	#[error("credential injection rejected (exit {})", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
	CredentialRejected { code: Option<i32> },

	#[error("credential injection failed: {0}")]
	CredentialIo(#[source] std::io::Error),

	#[error("a supervised child is already running (pid {pid})")]
	AlreadyRunning { pid: u32 },

	#[error("invalid value {value:?} for {key}: {reason}")]
	InvalidConfig {
		key: &'static str,
		value: String,
		reason: String,
	},

	#[error("failed to load config file {}: {reason}", .path.display())]
	ConfigFile { path: PathBuf, reason: String },

	#[error("failed to signal pid {pid}: {source}")]
	Signal {
		pid: u32,
		#[source]
		source: nix::Error,
	},
}

impl WardError {
	/// Short stable label for log fields.
	pub fn as_label(&self) -> &'static str {
		match self {
			WardError::BinaryMissing { .. } => "binary_missing",
			WardError::NotExecutable { .. } => "binary_not_executable",
			WardError::Spawn { .. } => "spawn_failed",
			WardError::NoPid => "no_pid",
			WardError::CredentialRejected { .. } => "credential_rejected",
			WardError::CredentialIo(_) => "credential_io",
			WardError::AlreadyRunning { .. } => "already_running",
			WardError::InvalidConfig { .. } => "invalid_config",
			WardError::ConfigFile { .. } => "config_file",
			WardError::Signal { .. } => "signal_failed",
		}
	}

	/// Startup and credential failures reject `start`; they are never retried
	/// by the supervisor itself.
	pub fn is_startup_failure(&self) -> bool {
		matches!(
			self,
			WardError::BinaryMissing { .. }
				| WardError::NotExecutable { .. }
				| WardError::Spawn { .. }
				| WardError::NoPid
				| WardError::CredentialRejected { .. }
				| WardError::CredentialIo(_)
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn labels_are_stable() {
		let err = WardError::CredentialRejected { code: Some(2) };
		assert_eq!(err.as_label(), "credential_rejected");
		assert_eq!(err.to_string(), "credential injection rejected (exit 2)");

		let err = WardError::CredentialRejected { code: None };
		assert_eq!(err.to_string(), "credential injection rejected (exit signal)");
	}

	#[test]
	fn startup_failures() {
		assert!(WardError::NoPid.is_startup_failure());
		assert!(WardError::BinaryMissing { path: "/nope".into() }.is_startup_failure());
		assert!(!WardError::AlreadyRunning { pid: 1 }.is_startup_failure());
	}
}
