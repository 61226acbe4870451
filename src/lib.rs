//! Speedtest Prometheus Exporter Library
//!
//! Runs a network speed test against the nearest speedtest.net server on every
//! `/metrics` scrape and exposes the results as Prometheus gauges.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use speedtest_exporter::{build_router, AppState, HttpSpeedtestClient, SpeedtestConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpSpeedtestClient::new(&SpeedtestConfig::default())?;
//! let state = Arc::new(AppState::new(Arc::new(client), true)?);
//! let app = build_router(state, true);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9516").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod scrape;
pub mod speedtest;
pub mod state;

use axum::{routing::get, Router};

// Re-export main types for convenience
pub use config::{Config, SpeedtestConfig};
pub use error::{ScrapeError, SpeedtestError};
pub use metrics::{ExporterTelemetry, SpeedtestMetrics};
pub use scrape::{run_speedtest, select_nearest, TestOutcome};
pub use speedtest::{HttpSpeedtestClient, PingStats, Server, ServerList, SpeedtestClient, UserInfo};
pub use state::{AppState, SharedState};

/// Builds the HTTP router serving `/`, `/metrics` and, if enabled, `/healthz`.
pub fn build_router(state: SharedState, enable_health: bool) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::root_handler))
        .route("/metrics", get(handlers::metrics_handler));

    if enable_health {
        app = app.route("/healthz", get(handlers::health_handler));
    }

    app.with_state(state)
}
