//! Speed test client abstraction.
//!
//! This module provides the `SpeedtestClient` trait used by the scrape
//! pipeline, the data types it exchanges, and the speedtest.net HTTP
//! implementation (`HttpSpeedtestClient`).

pub mod client;
pub mod stats;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SpeedtestError;

pub use client::HttpSpeedtestClient;
pub use stats::{haversine_km, megabits_per_second, ping_stats, result_valid, PingStats};

/// Caller identity and location as seen by the speed test provider.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub ip: String,
    pub isp: String,
    pub lat: f64,
    pub lon: f64,
}

/// A candidate test server.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub sponsor: String,
    pub country: String,
    pub host: String,
    /// Upload endpoint; the other test resources live next to it.
    pub url: String,
    pub lat: f64,
    pub lon: f64,
    /// Distance from the caller in kilometres.
    pub distance_km: f64,
    /// Round trip of the reachability probe, `None` if the probe failed.
    pub probe_latency: Option<Duration>,
}

impl Server {
    pub fn is_available(&self) -> bool {
        self.probe_latency.is_some()
    }
}

/// Servers returned by one discovery call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerList(pub Vec<Server>);

impl ServerList {
    /// Servers whose reachability probe succeeded, in discovery order.
    pub fn available(&self) -> Vec<Server> {
        self.0.iter().filter(|s| s.is_available()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All servers ordered by distance, closest first.
    pub fn sorted_by_distance(&self) -> Vec<Server> {
        let mut servers = self.0.clone();
        servers.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        servers
    }
}

impl From<Vec<Server>> for ServerList {
    fn from(servers: Vec<Server>) -> Self {
        Self(servers)
    }
}

/// Operations the scrape pipeline needs from a speed test provider.
///
/// Throughput is reported in megabits per second (10^6 bit/s).
#[async_trait]
pub trait SpeedtestClient: Send + Sync {
    async fn fetch_user_info(&self) -> Result<UserInfo, SpeedtestError>;

    async fn fetch_servers(&self, user: &UserInfo) -> Result<ServerList, SpeedtestError>;

    async fn ping_test(&self, server: &Server) -> Result<PingStats, SpeedtestError>;

    async fn download_test(&self, server: &Server) -> Result<f64, SpeedtestError>;

    async fn upload_test(&self, server: &Server) -> Result<f64, SpeedtestError>;
}
