//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::{ExporterTelemetry, SpeedtestMetrics};
use crate::speedtest::SpeedtestClient;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub metrics: SpeedtestMetrics,
    /// Internal counters, `None` when telemetry is disabled.
    pub telemetry: Option<ExporterTelemetry>,
    pub client: Arc<dyn SpeedtestClient>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates a fresh registry with all gauges registered.
    pub fn new(
        client: Arc<dyn SpeedtestClient>,
        enable_telemetry: bool,
    ) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = SpeedtestMetrics::new(&registry)?;
        let telemetry = if enable_telemetry {
            Some(ExporterTelemetry::new(&registry)?)
        } else {
            None
        };

        Ok(Self {
            registry,
            metrics,
            telemetry,
            client,
            start_time: Instant::now(),
        })
    }
}
