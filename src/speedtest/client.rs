//! speedtest.net HTTP client.
//!
//! Talks to the public speedtest.net infrastructure:
//! - the client configuration document for the caller's IP and location,
//! - the JSON server list for candidate servers,
//! - `latency.txt`, `random{N}x{N}.jpg` and `upload.php` on the chosen server.

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{join_all, try_join_all};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::stats::{haversine_km, megabits_per_second, ping_stats, PingStats};
use super::{Server, ServerList, SpeedtestClient, UserInfo};
use crate::config::SpeedtestConfig;
use crate::error::SpeedtestError;

/// Image sizes served by every speedtest.net server, cycled during downloads.
const DOWNLOAD_SIZES: [u32; 10] = [350, 500, 750, 1000, 1500, 2000, 2500, 3000, 3500, 4000];

const LATENCY_RESOURCE: &str = "latency.txt";

static CLIENT_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<client\s([^>]*)>").expect("client element regex is valid"));

static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_]+)="([^"]*)""#).expect("attribute regex is valid"));

/// Entry of the speedtest.net server list. Coordinates and ids arrive as
/// strings or numbers depending on the endpoint version.
#[derive(Debug, Deserialize)]
struct RawServer {
    url: String,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lon: Value,
    #[serde(default)]
    id: Value,
    #[serde(default)]
    distance: Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    sponsor: String,
    #[serde(default)]
    host: String,
}

/// Finite number from a JSON number or numeric string.
fn value_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

fn value_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Extracts the caller's details from the `<client .../>` element of the
/// speedtest.net configuration document.
pub fn parse_user_info(document: &str) -> Result<UserInfo, SpeedtestError> {
    let attrs = CLIENT_ELEMENT
        .captures(document)
        .and_then(|c| c.get(1))
        .ok_or_else(|| SpeedtestError::parse("user info", "no <client> element in configuration"))?
        .as_str();

    let mut ip = None;
    let mut isp = String::new();
    let mut lat = None;
    let mut lon = None;

    for cap in ATTRIBUTE.captures_iter(attrs) {
        let value = &cap[2];
        match &cap[1] {
            "ip" => ip = Some(value.to_string()),
            "isp" => isp = value.to_string(),
            "lat" => lat = value.trim().parse::<f64>().ok(),
            "lon" => lon = value.trim().parse::<f64>().ok(),
            _ => {}
        }
    }

    match (ip, lat, lon) {
        (Some(ip), Some(lat), Some(lon)) => Ok(UserInfo { ip, isp, lat, lon }),
        _ => Err(SpeedtestError::parse(
            "user info",
            "<client> element lacks ip, lat or lon",
        )),
    }
}

/// Converts server list JSON into servers, computing distances from `user`.
///
/// Entries without a usable URL are skipped. Probe latency is left unset.
/// A server without usable coordinates or distance is placed at infinity.
pub fn parse_servers(json: &str, user: &UserInfo) -> Result<Vec<Server>, SpeedtestError> {
    let raw: Vec<RawServer> =
        serde_json::from_str(json).map_err(|e| SpeedtestError::parse("server list", e.to_string()))?;

    let mut servers = Vec::with_capacity(raw.len());
    for entry in raw {
        if Url::parse(&entry.url).is_err() {
            warn!("Skipping server {} with invalid URL '{}'", value_string(&entry.id), entry.url);
            continue;
        }

        let lat = value_f64(&entry.lat);
        let lon = value_f64(&entry.lon);
        let distance_km = match (lat, lon) {
            (Some(lat), Some(lon)) => Some(haversine_km(user.lat, user.lon, lat, lon)),
            _ => value_f64(&entry.distance),
        }
        .filter(|d| d.is_finite())
        .unwrap_or(f64::INFINITY);

        servers.push(Server {
            id: value_string(&entry.id),
            name: entry.name,
            sponsor: entry.sponsor,
            country: entry.country,
            host: entry.host,
            url: entry.url,
            lat: lat.unwrap_or_default(),
            lon: lon.unwrap_or_default(),
            distance_km,
            probe_latency: None,
        });
    }

    Ok(servers)
}

/// URL of a test resource living next to the server's upload endpoint.
fn resource_url(server: &Server, resource: &str) -> Result<Url, SpeedtestError> {
    Url::parse(&server.url)
        .and_then(|base| base.join(resource))
        .map_err(|e| SpeedtestError::parse("server URL", format!("{}: {}", server.url, e)))
}

/// Upload payload in the form expected by `upload.php`.
fn upload_payload(size_kb: usize) -> Bytes {
    let mut payload = b"content1=".to_vec();
    payload.resize(payload.len() + size_kb * 1024, b'0');
    Bytes::from(payload)
}

/// `SpeedtestClient` backed by the speedtest.net HTTP protocol.
pub struct HttpSpeedtestClient {
    http: Client,
    config: SpeedtestConfig,
}

impl HttpSpeedtestClient {
    pub fn new(config: &SpeedtestConfig) -> Result<Self, SpeedtestError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(SpeedtestError::ClientBuild)?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Sends a request and rejects non-success statuses.
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, SpeedtestError> {
        let response = request.send().await.map_err(|source| SpeedtestError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeedtestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// One timed round trip to the server's latency resource.
    async fn round_trip(&self, url: &Url) -> Result<Duration, SpeedtestError> {
        let start = Instant::now();
        let response = self.send(self.http.get(url.clone()), url.as_str()).await?;
        response.bytes().await.map_err(|source| SpeedtestError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(start.elapsed())
    }

    /// Reachability probe; failures mark the server unavailable.
    async fn probe(&self, server: &Server) -> Option<Duration> {
        let url = resource_url(server, LATENCY_RESOURCE).ok()?;
        match self.round_trip(&url).await {
            Ok(rtt) => Some(rtt),
            Err(e) => {
                debug!("Server {} ({}) unreachable: {}", server.id, server.host, e);
                None
            }
        }
    }

    async fn download_worker(
        &self,
        urls: &[Url],
        offset: usize,
        deadline: Instant,
    ) -> Result<u64, SpeedtestError> {
        let mut total = 0u64;
        let mut next = offset;

        'transfer: while Instant::now() < deadline {
            let url = &urls[next % urls.len()];
            next += 1;

            let response = match self.send(self.http.get(url.clone()), url.as_str()).await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    debug!("Download worker {} timed out, keeping {} bytes", offset, total);
                    break;
                }
                Err(e) => return Err(e),
            };
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(source) if source.is_timeout() => {
                        debug!("Download worker {} timed out, keeping {} bytes", offset, total);
                        break 'transfer;
                    }
                    Err(source) => {
                        return Err(SpeedtestError::Http {
                            url: url.to_string(),
                            source,
                        })
                    }
                };
                total += chunk.len() as u64;
                if Instant::now() >= deadline {
                    break;
                }
            }
        }

        Ok(total)
    }

    /// Posts `payload` until `deadline`. A request that times out ends the
    /// worker with the bytes of the requests completed before it.
    async fn upload_worker(
        &self,
        url: &Url,
        payload: &Bytes,
        deadline: Instant,
    ) -> Result<u64, SpeedtestError> {
        let mut total = 0u64;

        while Instant::now() < deadline {
            let request = self
                .http
                .post(url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(payload.clone());
            let completed = match self.send(request, url.as_str()).await {
                Ok(response) => response.bytes().await.map_err(|source| SpeedtestError::Http {
                    url: url.to_string(),
                    source,
                }),
                Err(e) => Err(e),
            };
            match completed {
                Ok(_) => total += payload.len() as u64,
                Err(e) if e.is_timeout() => {
                    debug!("Upload worker timed out, keeping {} bytes", total);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(total)
    }
}

#[async_trait]
impl SpeedtestClient for HttpSpeedtestClient {
    #[instrument(skip(self))]
    async fn fetch_user_info(&self) -> Result<UserInfo, SpeedtestError> {
        let url = &self.config.config_url;
        let response = self.send(self.http.get(url), url).await?;
        let document = response.text().await.map_err(|source| SpeedtestError::Http {
            url: url.clone(),
            source,
        })?;
        parse_user_info(&document)
    }

    #[instrument(skip(self, user))]
    async fn fetch_servers(&self, user: &UserInfo) -> Result<ServerList, SpeedtestError> {
        let url = &self.config.servers_url;
        let request = self.http.get(url).query(&[
            ("limit", self.config.server_limit.to_string()),
            ("lat", user.lat.to_string()),
            ("lon", user.lon.to_string()),
        ]);
        let response = self.send(request, url).await?;
        let body = response.text().await.map_err(|source| SpeedtestError::Http {
            url: url.clone(),
            source,
        })?;

        let mut servers = parse_servers(&body, user)?;

        let probes = join_all(servers.iter().map(|s| self.probe(s))).await;
        for (server, latency) in servers.iter_mut().zip(probes) {
            server.probe_latency = latency;
        }

        Ok(ServerList(servers))
    }

    #[instrument(skip(self, server), fields(server = %server.id))]
    async fn ping_test(&self, server: &Server) -> Result<PingStats, SpeedtestError> {
        let url = resource_url(server, LATENCY_RESOURCE)?;

        let mut samples = Vec::with_capacity(self.config.ping_count);
        for _ in 0..self.config.ping_count {
            samples.push(self.round_trip(&url).await?);
        }

        ping_stats(&samples).ok_or_else(|| SpeedtestError::other("ping test took no samples"))
    }

    #[instrument(skip(self, server), fields(server = %server.id))]
    async fn download_test(&self, server: &Server) -> Result<f64, SpeedtestError> {
        let urls = DOWNLOAD_SIZES
            .iter()
            .map(|n| resource_url(server, &format!("random{n}x{n}.jpg")))
            .collect::<Result<Vec<_>, _>>()?;

        let start = Instant::now();
        let deadline = start + self.config.test_duration();
        let workers = (0..self.config.concurrency).map(|w| self.download_worker(&urls, w, deadline));
        let bytes: u64 = try_join_all(workers).await?.into_iter().sum();
        let elapsed = start.elapsed();

        if bytes == 0 {
            return Err(SpeedtestError::NoData("download"));
        }
        debug!("Downloaded {} bytes in {:.2}s", bytes, elapsed.as_secs_f64());
        Ok(megabits_per_second(bytes, elapsed))
    }

    #[instrument(skip(self, server), fields(server = %server.id))]
    async fn upload_test(&self, server: &Server) -> Result<f64, SpeedtestError> {
        let url = Url::parse(&server.url)
            .map_err(|e| SpeedtestError::parse("server URL", format!("{}: {}", server.url, e)))?;
        let payload = upload_payload(self.config.upload_chunk_kb);

        let start = Instant::now();
        let deadline = start + self.config.test_duration();
        let workers =
            (0..self.config.concurrency).map(|_| self.upload_worker(&url, &payload, deadline));
        let bytes: u64 = try_join_all(workers).await?.into_iter().sum();
        let elapsed = start.elapsed();

        if bytes == 0 {
            return Err(SpeedtestError::NoData("upload"));
        }
        debug!("Uploaded {} bytes in {:.2}s", bytes, elapsed.as_secs_f64());
        Ok(megabits_per_second(bytes, elapsed))
    }
}
