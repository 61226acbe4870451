//! One full speed test cycle.
//!
//! `run_speedtest` drives a `SpeedtestClient` through discovery, server
//! selection and the three measurements, stopping at the first failure.

use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::speedtest::{result_valid, Server, SpeedtestClient};

/// Result of a completed ping/download/upload sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub server: Server,
    pub latency: Duration,
    pub jitter: Duration,
    /// Megabits per second as reported by the client.
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub result_valid: bool,
    /// Wall-clock time of the ping, download and upload tests.
    pub duration: Duration,
}

/// Returns the candidate with the smallest distance.
///
/// Ties go to the earliest candidate and a NaN distance ranks as infinitely
/// far. An empty slice yields `ScrapeError::NoServer`.
pub fn select_nearest(candidates: &[Server]) -> Result<&Server, ScrapeError> {
    let mut nearest: Option<&Server> = None;
    for candidate in candidates {
        match nearest {
            Some(best) if !distance_key(candidate).total_cmp(&distance_key(best)).is_lt() => {}
            _ => nearest = Some(candidate),
        }
    }
    nearest.ok_or(ScrapeError::NoServer)
}

fn distance_key(server: &Server) -> f64 {
    if server.distance_km.is_nan() {
        f64::INFINITY
    } else {
        server.distance_km
    }
}

/// Runs one complete speed test against the nearest available server.
pub async fn run_speedtest(client: &dyn SpeedtestClient) -> Result<TestOutcome, ScrapeError> {
    let user = client
        .fetch_user_info()
        .await
        .map_err(ScrapeError::UserInfo)?;
    debug!(ip = %user.ip, isp = %user.isp, "Fetched user info");

    let servers = client
        .fetch_servers(&user)
        .await
        .map_err(ScrapeError::ServerList)?;

    let available = servers.available();
    debug!(
        total = servers.len(),
        available = available.len(),
        "Fetched server list"
    );

    let target = select_nearest(&available)?.clone();
    info!(
        server_id = %target.id,
        server = %target.name,
        sponsor = %target.sponsor,
        distance_km = target.distance_km,
        "Selected test server"
    );

    let start = Instant::now();

    let ping = client
        .ping_test(&target)
        .await
        .map_err(ScrapeError::Ping)?;

    let download_mbps = client
        .download_test(&target)
        .await
        .map_err(ScrapeError::Download)?;

    let upload_mbps = client
        .upload_test(&target)
        .await
        .map_err(ScrapeError::Upload)?;

    let duration = start.elapsed();

    info!(
        latency_ms = ping.latency.as_secs_f64() * 1000.0,
        jitter_ms = ping.jitter.as_secs_f64() * 1000.0,
        download_mbps,
        upload_mbps,
        duration_s = duration.as_secs_f64(),
        "Speed test completed"
    );

    Ok(TestOutcome {
        server: target,
        latency: ping.latency,
        jitter: ping.jitter,
        download_mbps,
        upload_mbps,
        result_valid: result_valid(download_mbps, upload_mbps),
        duration,
    })
}
