use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use ward::{Heartbeat, Supervisor};

#[derive(Clone)]
pub struct AppState {
	pub supervisor: Arc<Supervisor>,
}

pub fn router(supervisor: Arc<Supervisor>) -> Router {
	let state = AppState { supervisor };

	Router::new()
		.route("/health", get(health))
		.route("/heartbeat", get(heartbeat))
		.layer(CorsLayer::permissive())
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
	if state.supervisor.health().await {
		(StatusCode::OK, "healthy")
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
	}
}

async fn heartbeat(State(state): State<AppState>) -> Json<Heartbeat> {
	Json(state.supervisor.heartbeat().await)
}

pub async fn serve(supervisor: Arc<Supervisor>, port: u16) {
	let addr = SocketAddr::from(([127, 0, 0, 1], port));
	let listener = match tokio::net::TcpListener::bind(addr).await {
		Ok(l) => l,
		Err(e) => {
			tracing::error!("failed to bind HTTP server on {}: {}", addr, e);
			return;
		}
	};
	tracing::info!("HTTP server on {}", addr);
	if let Err(e) = axum::serve(listener, router(supervisor)).await {
		tracing::error!("HTTP server error: {}", e);
	}
}
