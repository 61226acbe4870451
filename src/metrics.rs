//! Prometheus metrics definitions for speedtest-exporter.
//!
//! The gauge names are unprefixed so dashboards built for the existing
//! speedtest exporters keep working.

use prometheus::{Gauge, IntCounter, IntCounterVec, Opts, Registry};

use crate::scrape::TestOutcome;

/// Multiplier from the client's megabits per second to bits per second.
pub const MEGABIT: f64 = 1_000_000.0;

/// Gauges holding the result of the most recent successful speed test.
#[derive(Clone)]
pub struct SpeedtestMetrics {
    pub download_speed_bps: Gauge,
    pub upload_speed_bps: Gauge,
    pub ping_seconds: Gauge,
    pub jitter_seconds: Gauge,
    pub result_valid: Gauge,
    pub test_duration_seconds: Gauge,
}

impl SpeedtestMetrics {
    /// Creates and registers all speed test gauges with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let download_speed_bps = Gauge::new("download_speed_bps", "Download speed (bit/s)")?;
        let upload_speed_bps = Gauge::new("upload_speed_bps", "Upload speed (bit/s)")?;
        let ping_seconds = Gauge::new("ping_seconds", "Latency (seconds)")?;
        let jitter_seconds = Gauge::new("jitter_seconds", "Jitter (seconds)")?;
        let result_valid = Gauge::new(
            "result_valid",
            "Indicates if the result is logical given UL and DL speed (0 when one exceeds the other by more than 100x)",
        )?;
        let test_duration_seconds =
            Gauge::new("test_duration_seconds", "Duration of the test (seconds)")?;

        registry.register(Box::new(download_speed_bps.clone()))?;
        registry.register(Box::new(upload_speed_bps.clone()))?;
        registry.register(Box::new(ping_seconds.clone()))?;
        registry.register(Box::new(jitter_seconds.clone()))?;
        registry.register(Box::new(result_valid.clone()))?;
        registry.register(Box::new(test_duration_seconds.clone()))?;

        Ok(Self {
            download_speed_bps,
            upload_speed_bps,
            ping_seconds,
            jitter_seconds,
            result_valid,
            test_duration_seconds,
        })
    }

    /// Writes a completed test into the gauges.
    pub fn record(&self, outcome: &TestOutcome) {
        self.ping_seconds.set(outcome.latency.as_secs_f64());
        self.jitter_seconds.set(outcome.jitter.as_secs_f64());
        self.download_speed_bps.set(outcome.download_mbps * MEGABIT);
        self.upload_speed_bps.set(outcome.upload_mbps * MEGABIT);
        self.result_valid
            .set(if outcome.result_valid { 1.0 } else { 0.0 });
        self.test_duration_seconds
            .set(outcome.duration.as_secs_f64());
    }
}

/// Internal exporter counters (`enable_telemetry`).
#[derive(Clone)]
pub struct ExporterTelemetry {
    pub scrapes_total: IntCounter,
    pub scrape_failures_total: IntCounterVec, // labels: stage
}

impl ExporterTelemetry {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let scrapes_total = IntCounter::new(
            "speedtest_exporter_scrapes_total",
            "Number of /metrics requests that started a speed test",
        )?;
        let scrape_failures_total = IntCounterVec::new(
            Opts::new(
                "speedtest_exporter_scrape_failures_total",
                "Number of failed speed tests by failing stage",
            ),
            &["stage"],
        )?;

        registry.register(Box::new(scrapes_total.clone()))?;
        registry.register(Box::new(scrape_failures_total.clone()))?;

        Ok(Self {
            scrapes_total,
            scrape_failures_total,
        })
    }

    pub fn record_failure(&self, stage: &str) {
        self.scrape_failures_total.with_label_values(&[stage]).inc();
    }
}
