mod api;

use owo_colors::OwoColorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use ward::{Env, Heartbeat, Supervisor, WardConfig};

const MIN_HEALTH_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args: Vec<String> = std::env::args().skip(1).collect();
	let port = match parse_http_port(&args) {
		Ok(port) => port,
		Err(msg) => {
			eprintln!("{} {}", "error:".red(), msg);
			eprintln!("usage: ward [--http <port>]");
			return ExitCode::from(2);
		}
	};

	let env: Env = std::env::vars().collect();
	let config = match WardConfig::from_env(&env) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("{} {}", "error:".red(), e);
			return ExitCode::FAILURE;
		}
	};

	let sup = Supervisor::new();
	match sup.install_secrets(&env).await {
		Ok(outcome) if outcome.secret_installed => println!("{} credentials installed", "ok".green()),
		Ok(_) => {}
		Err(e) => {
			eprintln!("{} {}", "error:".red(), e);
			return ExitCode::FAILURE;
		}
	}
	if let Err(e) = sup.start(&env).await {
		eprintln!("{} {}", "error:".red(), e);
		return ExitCode::FAILURE;
	}
	println!(
		"{} supervising {}",
		"ward".bold(),
		config.binary.display().to_string().cyan()
	);

	let http = port.map(|port| {
		let sup = Arc::clone(&sup);
		tokio::spawn(async move {
			api::serve(sup, port).await;
		})
	});

	let mut ticker = tokio::time::interval(config.health_interval().max(MIN_HEALTH_INTERVAL));
	ticker.tick().await;
	loop {
		tokio::select! {
			_ = ticker.tick() => {
				let healthy = sup.health().await;
				print_status(healthy, &sup.heartbeat().await);
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("shutting down");
				break;
			}
		}
	}

	if let Some(handle) = http {
		handle.abort();
	}
	if let Err(e) = sup.stop().await {
		eprintln!("{} {}", "error:".red(), e);
		return ExitCode::FAILURE;
	}
	ExitCode::SUCCESS
}

fn parse_http_port(args: &[String]) -> Result<Option<u16>, String> {
	let mut iter = args.iter();
	let mut port = None;
	while let Some(arg) = iter.next() {
		match arg.as_str() {
			"--http" => {
				let value = iter.next().ok_or("--http needs a port")?;
				port = Some(
					value
						.parse::<u16>()
						.map_err(|_| format!("invalid port: {}", value))?,
				);
			}
			other => return Err(format!("unknown argument: {}", other)),
		}
	}
	Ok(port)
}

fn print_status(healthy: bool, hb: &Heartbeat) {
	let verdict = if healthy {
		"healthy".green().to_string()
	} else {
		"unhealthy".red().to_string()
	};
	let pid = hb
		.pid
		.map(|p| p.to_string())
		.unwrap_or_else(|| "-".to_string());
	println!(
		"{:<10} pid {:<7} uptime {:>8.1}s  restarts {}  {}",
		verdict,
		pid,
		hb.uptime_seconds,
		hb.restart_count,
		format!("{:?}", hb.phase).to_lowercase().dimmed()
	);
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn http_port_flag() {
		assert_eq!(parse_http_port(&args(&[])), Ok(None));
		assert_eq!(parse_http_port(&args(&["--http", "8080"])), Ok(Some(8080)));
		assert!(parse_http_port(&args(&["--http"])).is_err());
		assert!(parse_http_port(&args(&["--http", "nope"])).is_err());
		assert!(parse_http_port(&args(&["--verbose"])).is_err());
	}
}
