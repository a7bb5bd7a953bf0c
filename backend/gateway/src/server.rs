//! Main HTTP Gateway Server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use courier_supervisor::Supervisor;

use crate::api;
use crate::ws_server;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub supervisor: Arc<Supervisor>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self {
            supervisor,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/tasks", get(api::list_tasks).post(api::submit_task))
        .route("/api/tasks/:id", get(api::get_task))
        .route("/api/tasks/:id/stop", post(api::stop_task))
        .route("/api/ws", get(ws_server::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
#[instrument(skip(state, shutdown))]
pub async fn start_server(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Gateway HTTP server stopped");
    Ok(())
}
