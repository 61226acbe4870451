//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs a full speed test. On success the gauges are updated and
//! the registry is rendered; on failure the error text is returned with status
//! 500 and the gauges keep their previous values.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error, instrument};

use crate::scrape::run_speedtest;
use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 4 * 1024;

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Response {
    debug!("Processing /metrics request");

    if let Some(telemetry) = &state.telemetry {
        telemetry.scrapes_total.inc();
    }

    let outcome = match run_speedtest(state.client.as_ref()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let msg = e.to_string();
            error!(stage = e.stage(), "{}", msg);
            if let Some(telemetry) = &state.telemetry {
                telemetry.record_failure(e.stage());
            }
            return (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response();
        }
    };

    state.metrics.record(&outcome);

    let families = state.registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);

    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!("Failed to encode Prometheus metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to encode metrics",
        )
            .into_response();
    }

    debug!("Metrics request completed: {} bytes", buffer.len());

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
