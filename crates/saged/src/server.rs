//! HTTP server for saged

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::Router;
use sage_common::ProgressEngine;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes;

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<ProgressEngine>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: ProgressEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            start_time: Instant::now(),
        }
    }
}

/// Router with every route mounted; used by `run` and by the route tests
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::catalog_routes())
        .merge(routes::progress_routes())
        .merge(routes::leaderboard_routes())
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until ctrl-c
pub async fn run(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down gracefully");
        })
        .await?;
    Ok(())
}
