//! Measurement arithmetic: latency statistics, throughput, plausibility and
//! great-circle distance.

use std::time::Duration;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Speeds that differ by more than this factor are not plausible.
const MAX_SPEED_RATIO: f64 = 100.0;

/// Latency summary of a ping test.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PingStats {
    /// Mean round trip.
    pub latency: Duration,
    /// Population standard deviation of the round trips.
    pub jitter: Duration,
}

/// Mean and standard deviation of the given round trips.
///
/// Returns `None` for an empty sample set.
pub fn ping_stats(samples: &[Duration]) -> Option<PingStats> {
    if samples.is_empty() {
        return None;
    }

    let n = samples.len() as f64;
    let secs: Vec<f64> = samples.iter().map(Duration::as_secs_f64).collect();
    let mean = secs.iter().sum::<f64>() / n;
    let variance = secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

    Some(PingStats {
        latency: Duration::from_secs_f64(mean),
        jitter: Duration::from_secs_f64(variance.sqrt()),
    })
}

/// Throughput in megabits per second for `bytes` moved in `elapsed`.
pub fn megabits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

/// Whether download and upload speeds are consistent with each other.
///
/// A result is rejected when either direction is more than a hundred times
/// faster than the other.
pub fn result_valid(download_mbps: f64, upload_mbps: f64) -> bool {
    !(download_mbps * MAX_SPEED_RATIO < upload_mbps)
        && !(download_mbps > upload_mbps * MAX_SPEED_RATIO)
}

/// Great-circle distance between two coordinates in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}
