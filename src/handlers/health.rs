//! Health check endpoint handler.

use axum::http::StatusCode;
use tracing::{debug, instrument};

/// Handler for the /healthz endpoint. Always healthy.
#[instrument]
pub async fn health_handler() -> (StatusCode, &'static str) {
    debug!("Processing /healthz request");
    (StatusCode::OK, "OK")
}
