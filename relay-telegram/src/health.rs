//! Liveness endpoint for external uptime checks: `GET /` answers 200 with a static body.

use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use tracing::info;

pub const LIVENESS_BODY: &str = "Bot running";

async fn liveness() -> (StatusCode, &'static str) {
    (StatusCode::OK, LIVENESS_BODY)
}

pub fn liveness_router() -> Router {
    Router::new().route("/", get(liveness))
}

/// Serves the liveness router on `0.0.0.0:port` until the task is dropped.
pub async fn serve_liveness(port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind liveness port {}", port))?;
    info!(port, "Liveness endpoint listening");
    axum::serve(listener, liveness_router())
        .await
        .context("Liveness server failed")?;
    Ok(())
}
