use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, WardError};
use crate::policy::RestartPolicy;

/// Environment handed to every hook by the host.
pub type Env = HashMap<String, String>;

/// Names a TOML file providing base values; environment variables win.
pub const CONFIG_FILE_VAR: &str = "WARD_CONFIG";

pub const BINARY_VAR: &str = "WARD_BINARY";
pub const ARGS_VAR: &str = "WARD_ARGS";
pub const SECRET_VAR: &str = "WARD_SECRET";
pub const SECRET_ENV_VAR: &str = "WARD_SECRET_ENV";
pub const INJECT_ARGS_VAR: &str = "WARD_INJECT_ARGS";
pub const AUTO_INJECT_VAR: &str = "WARD_AUTO_INJECT";
pub const HEALTH_INTERVAL_VAR: &str = "WARD_HEALTH_INTERVAL_MS";
pub const STARTUP_GRACE_VAR: &str = "WARD_STARTUP_GRACE_MS";
pub const MAX_RESTARTS_VAR: &str = "WARD_MAX_RESTARTS";
pub const RESTART_BASE_VAR: &str = "WARD_RESTART_BASE_MS";
pub const RESTART_MAX_VAR: &str = "WARD_RESTART_MAX_MS";
pub const HEALTH_CACHE_TTL_VAR: &str = "WARD_HEALTH_CACHE_TTL_MS";
pub const MAX_LOG_LINES_VAR: &str = "WARD_MAX_LOG_LINES";
pub const SHUTDOWN_TIMEOUT_VAR: &str = "WARD_SHUTDOWN_TIMEOUT_MS";

/// Secret value handed to the child. Never printed.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for Secret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Secret(***)")
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct WardConfig {
	#[serde(default = "default_binary")]
	pub binary: PathBuf,
	#[serde(default)]
	pub args: Vec<String>,
	#[serde(default)]
	pub secret: Option<Secret>,
	#[serde(default = "default_secret_env")]
	pub secret_env: String,
	#[serde(default = "default_inject_args")]
	pub inject_args: Vec<String>,
	#[serde(default)]
	pub auto_inject: bool,
	#[serde(default = "default_health_interval")]
	pub health_interval_ms: u64,
	#[serde(default = "default_startup_grace")]
	pub startup_grace_ms: u64,
	#[serde(default = "default_max_restarts")]
	pub max_restarts: u32,
	#[serde(default = "default_restart_base")]
	pub restart_base_ms: u64,
	#[serde(default = "default_restart_max")]
	pub restart_max_ms: u64,
	#[serde(default = "default_health_cache_ttl")]
	pub health_cache_ttl_ms: u64,
	#[serde(default = "default_max_log_lines")]
	pub max_log_lines: usize,
	#[serde(default = "default_shutdown_timeout")]
	pub shutdown_timeout_ms: u64,
	/// Extra variables set on the child on top of the inherited environment.
	#[serde(default)]
	pub env: HashMap<String, String>,
}

impl Default for WardConfig {
	fn default() -> Self {
		Self {
			binary: default_binary(),
			args: Vec::new(),
			secret: None,
			secret_env: default_secret_env(),
			inject_args: default_inject_args(),
			auto_inject: false,
			health_interval_ms: default_health_interval(),
			startup_grace_ms: default_startup_grace(),
			max_restarts: default_max_restarts(),
			restart_base_ms: default_restart_base(),
			restart_max_ms: default_restart_max(),
			health_cache_ttl_ms: default_health_cache_ttl(),
			max_log_lines: default_max_log_lines(),
			shutdown_timeout_ms: default_shutdown_timeout(),
			env: HashMap::new(),
		}
	}
}

fn default_binary() -> PathBuf {
	PathBuf::from("./supervised")
}

fn default_secret_env() -> String {
	"SUPERVISED_SECRET".into()
}

fn default_inject_args() -> Vec<String> {
	vec!["install-secret".into()]
}

fn default_health_interval() -> u64 {
	5_000
}

fn default_startup_grace() -> u64 {
	10_000
}

fn default_max_restarts() -> u32 {
	5
}

fn default_restart_base() -> u64 {
	1_000
}

fn default_restart_max() -> u64 {
	30_000
}

fn default_health_cache_ttl() -> u64 {
	2_000
}

fn default_max_log_lines() -> usize {
	1_000
}

fn default_shutdown_timeout() -> u64 {
	10_000
}

impl WardConfig {
	/// Builds the configuration from the hook environment: optional TOML file
	/// named by `WARD_CONFIG`, then one override per `WARD_*` variable.
	pub fn from_env(env: &Env) -> Result<Self> {
		let mut config = match env.get(CONFIG_FILE_VAR).filter(|p| !p.trim().is_empty()) {
			Some(path) => Self::load_file(Path::new(path.trim()))?,
			None => Self::default(),
		};
		config.apply_env(env)?;
		config.validate()?;
		Ok(config)
	}

	pub fn load_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| WardError::ConfigFile {
			path: path.to_path_buf(),
			reason: e.to_string(),
		})?;
		toml::from_str(&content).map_err(|e| WardError::ConfigFile {
			path: path.to_path_buf(),
			reason: e.to_string(),
		})
	}

	fn apply_env(&mut self, env: &Env) -> Result<()> {
		if let Some(binary) = non_empty(env, BINARY_VAR) {
			self.binary = PathBuf::from(binary);
		}
		if let Some(args) = non_empty(env, ARGS_VAR) {
			self.args = split_args(args);
		}
		if let Some(secret) = non_empty(env, SECRET_VAR) {
			self.secret = Some(Secret::new(secret));
		}
		if let Some(name) = non_empty(env, SECRET_ENV_VAR) {
			self.secret_env = name.to_string();
		}
		if let Some(args) = non_empty(env, INJECT_ARGS_VAR) {
			self.inject_args = split_args(args);
		}
		if let Some(flag) = parse_bool(env, AUTO_INJECT_VAR)? {
			self.auto_inject = flag;
		}
		if let Some(v) = parsed(env, HEALTH_INTERVAL_VAR)? {
			self.health_interval_ms = v;
		}
		if let Some(v) = parsed(env, STARTUP_GRACE_VAR)? {
			self.startup_grace_ms = v;
		}
		if let Some(v) = parsed(env, MAX_RESTARTS_VAR)? {
			self.max_restarts = v;
		}
		if let Some(v) = parsed(env, RESTART_BASE_VAR)? {
			self.restart_base_ms = v;
		}
		if let Some(v) = parsed(env, RESTART_MAX_VAR)? {
			self.restart_max_ms = v;
		}
		if let Some(v) = parsed(env, HEALTH_CACHE_TTL_VAR)? {
			self.health_cache_ttl_ms = v;
		}
		if let Some(v) = parsed(env, MAX_LOG_LINES_VAR)? {
			self.max_log_lines = v;
		}
		if let Some(v) = parsed(env, SHUTDOWN_TIMEOUT_VAR)? {
			self.shutdown_timeout_ms = v;
		}
		Ok(())
	}

	fn validate(&self) -> Result<()> {
		if self.max_log_lines == 0 {
			return Err(WardError::InvalidConfig {
				key: MAX_LOG_LINES_VAR,
				value: "0".into(),
				reason: "ring buffer needs room for at least one line".into(),
			});
		}
		if self.secret_env.is_empty() || self.secret_env.contains('=') {
			return Err(WardError::InvalidConfig {
				key: SECRET_ENV_VAR,
				value: self.secret_env.clone(),
				reason: "not a valid environment variable name".into(),
			});
		}
		Ok(())
	}

	/// Secret to inject, ignoring an empty value.
	pub fn secret(&self) -> Option<&Secret> {
		self.secret.as_ref().filter(|s| !s.expose().is_empty())
	}

	pub fn health_interval(&self) -> Duration {
		Duration::from_millis(self.health_interval_ms)
	}

	pub fn startup_grace(&self) -> Duration {
		Duration::from_millis(self.startup_grace_ms)
	}

	pub fn health_cache_ttl(&self) -> Duration {
		Duration::from_millis(self.health_cache_ttl_ms)
	}

	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_timeout_ms)
	}

	pub fn restart_policy(&self) -> RestartPolicy {
		RestartPolicy {
			base: Duration::from_millis(self.restart_base_ms),
			max: Duration::from_millis(self.restart_max_ms),
			max_attempts: self.max_restarts,
		}
	}
}

fn non_empty<'a>(env: &'a Env, key: &str) -> Option<&'a str> {
	env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn split_args(raw: &str) -> Vec<String> {
	raw.split_whitespace().map(str::to_string).collect()
}

fn parsed<T>(env: &Env, key: &'static str) -> Result<Option<T>>
where
	T: FromStr,
	T::Err: fmt::Display,
{
	match non_empty(env, key) {
		None => Ok(None),
		Some(raw) => raw.parse::<T>().map(Some).map_err(|e| WardError::InvalidConfig {
			key,
			value: raw.to_string(),
			reason: e.to_string(),
		}),
	}
}

fn parse_bool(env: &Env, key: &'static str) -> Result<Option<bool>> {
	match non_empty(env, key) {
		None => Ok(None),
		Some(raw) => match raw.to_ascii_lowercase().as_str() {
			"1" | "true" | "yes" | "on" => Ok(Some(true)),
			"0" | "false" | "no" | "off" => Ok(Some(false)),
			_ => Err(WardError::InvalidConfig {
				key,
				value: raw.to_string(),
				reason: "expected true/false".into(),
			}),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn env(pairs: &[(&str, &str)]) -> Env {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn defaults_without_env() {
		let config = WardConfig::from_env(&Env::new()).unwrap();
		assert_eq!(config.binary, PathBuf::from("./supervised"));
		assert_eq!(config.max_restarts, 5);
		assert_eq!(config.max_log_lines, 1000);
		assert_eq!(config.health_cache_ttl(), Duration::from_secs(2));
		assert!(!config.auto_inject);
		assert!(config.secret().is_none());
	}

	#[test]
	fn env_overrides_each_key() {
		let config = WardConfig::from_env(&env(&[
			(BINARY_VAR, "/bin/sh"),
			(ARGS_VAR, "-c  'true'"),
			(SECRET_VAR, "hunter2"),
			(AUTO_INJECT_VAR, "yes"),
			(MAX_RESTARTS_VAR, "2"),
			(RESTART_BASE_VAR, "50"),
			(MAX_LOG_LINES_VAR, "10"),
			(SHUTDOWN_TIMEOUT_VAR, "300"),
		]))
		.unwrap();
		assert_eq!(config.binary, PathBuf::from("/bin/sh"));
		assert_eq!(config.args, vec!["-c", "'true'"]);
		assert_eq!(config.secret().map(Secret::expose), Some("hunter2"));
		assert!(config.auto_inject);
		assert_eq!(config.max_restarts, 2);
		assert_eq!(config.restart_policy().base, Duration::from_millis(50));
		assert_eq!(config.max_log_lines, 10);
		assert_eq!(config.shutdown_timeout(), Duration::from_millis(300));
	}

	#[test]
	fn invalid_number_is_rejected() {
		let err = WardConfig::from_env(&env(&[(MAX_RESTARTS_VAR, "lots")])).unwrap_err();
		assert!(matches!(err, WardError::InvalidConfig { key: MAX_RESTARTS_VAR, .. }));
	}

	#[test]
	fn invalid_bool_is_rejected() {
		let err = WardConfig::from_env(&env(&[(AUTO_INJECT_VAR, "maybe")])).unwrap_err();
		assert_eq!(err.as_label(), "invalid_config");
	}

	#[test]
	fn zero_log_lines_is_rejected() {
		assert!(WardConfig::from_env(&env(&[(MAX_LOG_LINES_VAR, "0")])).is_err());
	}

	#[test]
	fn secret_is_redacted() {
		let config = WardConfig::from_env(&env(&[(SECRET_VAR, "hunter2")])).unwrap();
		let printed = format!("{:?}", config);
		assert!(!printed.contains("hunter2"));
		assert!(printed.contains("Secret(***)"));
	}

	#[test]
	fn file_then_env() {
		let dir = std::env::temp_dir().join(format!("ward-config-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("ward.toml");
		std::fs::write(
			&path,
			"binary = \"/usr/bin/env\"\nmax_restarts = 9\nshutdown_timeout_ms = 42\n",
		)
		.unwrap();

		let config = WardConfig::from_env(&env(&[
			(CONFIG_FILE_VAR, path.to_str().unwrap()),
			(MAX_RESTARTS_VAR, "1"),
		]))
		.unwrap();
		assert_eq!(config.binary, PathBuf::from("/usr/bin/env"));
		assert_eq!(config.max_restarts, 1);
		assert_eq!(config.shutdown_timeout_ms, 42);
		assert_eq!(config.max_log_lines, 1000);

		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn missing_file_is_reported() {
		let err = WardConfig::from_env(&env(&[(CONFIG_FILE_VAR, "/nonexistent/ward.toml")]))
			.unwrap_err();
		assert!(matches!(err, WardError::ConfigFile { .. }));
	}
}
