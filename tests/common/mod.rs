//! Shared helpers for integration tests: an in-memory speed test client and
//! a server factory.

#![allow(dead_code)]

use async_trait::async_trait;
use speedtest_exporter::{
    build_router, AppState, PingStats, Server, ServerList, SharedState, SpeedtestClient,
    SpeedtestError, UserInfo,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Speed test client returning canned results.
///
/// Every call is recorded by stage name; `fail_at` makes the named stage
/// return an error.
pub struct StubClient {
    pub servers: Vec<Server>,
    pub ping: PingStats,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    fail_at: Mutex<Option<&'static str>>,
    calls: Mutex<Vec<&'static str>>,
}

impl StubClient {
    pub fn new(servers: Vec<Server>) -> Self {
        Self {
            servers,
            ping: PingStats {
                latency: Duration::from_millis(12),
                jitter: Duration::from_millis(2),
            },
            download_mbps: 12.5,
            upload_mbps: 4.0,
            fail_at: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_at(&self, stage: Option<&'static str>) {
        *self.fail_at.lock().unwrap() = stage;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, stage: &'static str) -> Result<(), SpeedtestError> {
        self.calls.lock().unwrap().push(stage);
        if *self.fail_at.lock().unwrap() == Some(stage) {
            return Err(SpeedtestError::other(format!("stubbed {stage} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeedtestClient for StubClient {
    async fn fetch_user_info(&self) -> Result<UserInfo, SpeedtestError> {
        self.enter("user_info")?;
        Ok(UserInfo {
            ip: "198.51.100.20".into(),
            isp: "Stub ISP".into(),
            lat: 52.37,
            lon: 4.89,
        })
    }

    async fn fetch_servers(&self, _user: &UserInfo) -> Result<ServerList, SpeedtestError> {
        self.enter("server_list")?;
        Ok(ServerList(self.servers.clone()))
    }

    async fn ping_test(&self, _server: &Server) -> Result<PingStats, SpeedtestError> {
        self.enter("ping")?;
        Ok(self.ping)
    }

    async fn download_test(&self, _server: &Server) -> Result<f64, SpeedtestError> {
        self.enter("download")?;
        Ok(self.download_mbps)
    }

    async fn upload_test(&self, _server: &Server) -> Result<f64, SpeedtestError> {
        self.enter("upload")?;
        Ok(self.upload_mbps)
    }
}

/// Reachable server at the given distance.
pub fn server(id: &str, distance_km: f64) -> Server {
    Server {
        id: id.to_string(),
        name: format!("City {id}"),
        sponsor: format!("Sponsor {id}"),
        country: "Netherlands".into(),
        host: format!("{id}.example.invalid:8080"),
        url: format!("http://{id}.example.invalid:8080/speedtest/upload.php"),
        lat: 52.0,
        lon: 5.0,
        distance_km,
        probe_latency: Some(Duration::from_millis(5)),
    }
}

/// Server whose reachability probe failed.
pub fn unreachable_server(id: &str, distance_km: f64) -> Server {
    Server {
        probe_latency: None,
        ..server(id, distance_km)
    }
}

/// Serves the exporter on an ephemeral port and returns its base URL.
pub async fn spawn_app(client: Arc<StubClient>, enable_health: bool) -> (String, SharedState) {
    let state = Arc::new(AppState::new(client, true).expect("metrics register"));
    let app = build_router(state.clone(), enable_health);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });

    (format!("http://{}", addr), state)
}

/// Value of the first sample line starting with `series` in a text exposition.
pub fn sample_value(body: &str, series: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let rest = line.strip_prefix(series)?;
            rest.strip_prefix(' ')?.trim().parse().ok()
        })
}
