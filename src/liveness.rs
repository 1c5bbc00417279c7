//! Keep-alive HTTP endpoint for hosting platforms.
//!
//! Answers every request on every path with `200 OK` so that platform health
//! checks see the process as alive. Holds no state and never touches the bot.

use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use tracing::info;

/// Static body returned by every liveness request
pub const LIVENESS_BODY: &str = "Bot is running";

async fn alive() -> (StatusCode, &'static str) {
    (StatusCode::OK, LIVENESS_BODY)
}

/// Router answering `200 OK` on `/` and on any other path, for any method
pub fn router() -> Router {
    Router::new().route("/", any(alive)).fallback(alive)
}

/// Binds `0.0.0.0:port` and serves until the process exits.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(port: u16) -> Result<(), anyhow::Error> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind liveness endpoint to port {port}: {e}"))?;

    info!("Liveness endpoint listening on http://0.0.0.0:{port}/");

    axum::serve(listener, router())
        .await
        .map_err(|e| anyhow::anyhow!("Liveness endpoint error: {e}"))?;

    Ok(())
}
