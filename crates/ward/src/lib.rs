//! # ward
//!
//! Supervisor for a single opaque child process.
//!
//! Spawns the child (optionally installing credentials first), infers its
//! health from free-text output, restarts it with bounded exponential backoff
//! and stops it with SIGTERM followed by SIGKILL. A host drives it through
//! four hooks: `install_secrets`, `start`, `health` and `stop`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ward::{Env, Supervisor};
//!
//! # #[tokio::main]
//! # async fn main() -> ward::Result<()> {
//! let mut env = Env::new();
//! env.insert("WARD_BINARY".into(), "/usr/local/bin/worker".into());
//! env.insert("WARD_MAX_RESTARTS".into(), "3".into());
//!
//! let sup = Supervisor::new();
//! sup.install_secrets(&env).await?;
//! sup.start(&env).await?;
//!
//! if !sup.health().await {
//!     eprintln!("worker unhealthy: {:?}", sup.heartbeat().await);
//! }
//! sup.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod health;
mod hooks;
pub mod metrics;
pub mod output;
pub mod policy;
pub mod supervisor;
pub mod types;
pub mod uptime;

pub use config::{Env, Secret, WardConfig};
pub use error::{Result, WardError};
pub use health::{HealthEvaluator, LivenessProbe, SignalProbe};
pub use metrics::{Metrics, MetricsSnapshot};
pub use output::RingLogBuffer;
pub use policy::{backoff, JitterSource, NoJitter, RestartPolicy, ThreadRngJitter};
pub use supervisor::{RestartAttempt, Supervisor};
pub use types::*;
pub use uptime::{UptimeExtractor, UptimeMatcher};
