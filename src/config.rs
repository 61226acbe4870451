//! Configuration management for speedtest-exporter.
//!
//! This module handles loading, merging, and validating configuration from files,
//! the `PORT` environment variable and CLI arguments. It supports YAML, JSON, and
//! TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9516;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";

pub const DEFAULT_CONFIG_URL: &str = "https://www.speedtest.net/speedtest-config.php";
pub const DEFAULT_SERVERS_URL: &str = "https://www.speedtest.net/api/js/servers?engine=js";

/// Speed test client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedtestConfig {
    /// Client configuration document carrying the caller's IP and location
    #[serde(default = "default_config_url")]
    pub config_url: String,

    /// Server discovery endpoint (JSON)
    #[serde(default = "default_servers_url")]
    pub servers_url: String,

    /// Number of candidate servers requested (default: 10)
    #[serde(default = "default_server_limit")]
    pub server_limit: usize,

    /// Round trips measured per ping test (default: 10)
    #[serde(default = "default_ping_count")]
    pub ping_count: usize,

    /// Parallel transfers during download/upload tests (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Duration of each throughput test in seconds (default: 10)
    #[serde(default = "default_test_duration_secs")]
    pub test_duration_secs: u64,

    /// Timeout of a single HTTP request in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Size of one upload payload in KiB (default: 512)
    #[serde(default = "default_upload_chunk_kb")]
    pub upload_chunk_kb: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_config_url() -> String {
    DEFAULT_CONFIG_URL.to_string()
}
fn default_servers_url() -> String {
    DEFAULT_SERVERS_URL.to_string()
}
fn default_server_limit() -> usize {
    10
}
fn default_ping_count() -> usize {
    10
}
fn default_concurrency() -> usize {
    4
}
fn default_test_duration_secs() -> u64 {
    10
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_upload_chunk_kb() -> usize {
    512
}
fn default_user_agent() -> String {
    format!("speedtest-exporter/{}", env!("CARGO_PKG_VERSION"))
}

impl SpeedtestConfig {
    pub fn test_duration(&self) -> Duration {
        Duration::from_secs(self.test_duration_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SpeedtestConfig {
    fn default() -> Self {
        Self {
            config_url: default_config_url(),
            servers_url: default_servers_url(),
            server_limit: default_server_limit(),
            ping_count: default_ping_count(),
            concurrency: default_concurrency(),
            test_duration_secs: default_test_duration_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            upload_chunk_kb: default_upload_chunk_kb(),
            user_agent: default_user_agent(),
        }
    }
}

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    #[serde(default)]
    pub speedtest: SpeedtestConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            speedtest: SpeedtestConfig::default(),
        }
    }
}

impl Config {
    /// Effective log level (config value, then info).
    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::from_name)
            .unwrap_or(LogLevel::Info)
    }
}

/// Interprets the raw value of `$PORT`.
///
/// Unset or empty means "not configured"; anything else must be a valid port.
pub fn port_from_env(value: Option<&str>) -> Result<Option<u16>, Box<dyn std::error::Error>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<u16>()
            .map(Some)
            .map_err(|e| format!("Invalid {} value '{}': {}", PORT_ENV, raw, e).into()),
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_name(level).is_none() {
            return Err(format!(
                "Invalid log_level '{}', expected one of off/error/warn/info/debug/trace",
                level
            )
            .into());
        }
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    validate_speedtest_config(&cfg.speedtest)?;

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn validate_speedtest_config(st: &SpeedtestConfig) -> Result<(), Box<dyn std::error::Error>> {
    let positive = [
        ("server_limit", st.server_limit as u64),
        ("ping_count", st.ping_count as u64),
        ("concurrency", st.concurrency as u64),
        ("test_duration_secs", st.test_duration_secs),
        ("request_timeout_secs", st.request_timeout_secs),
        ("upload_chunk_kb", st.upload_chunk_kb as u64),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(format!("speedtest.{} must be greater than 0", name).into());
        }
    }

    if st.test_duration_secs >= st.request_timeout_secs {
        return Err(format!(
            "speedtest.test_duration_secs ({}) must be less than speedtest.request_timeout_secs ({})",
            st.test_duration_secs, st.request_timeout_secs
        )
        .into());
    }

    for (name, url) in [
        ("config_url", &st.config_url),
        ("servers_url", &st.servers_url),
    ] {
        if let Err(e) = reqwest::Url::parse(url) {
            return Err(format!("speedtest.{} '{}' is not a valid URL: {}", name, url, e).into());
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(format!("TLS {} file not found: {}", what, path).into());
    }
    match fs::metadata(p) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Err(e) => {
            Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into())
        }
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, `$PORT`, config file, and defaults.
/// This enforces precedence: CLI (if provided) > environment > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let env_port = std::env::var(PORT_ENV).ok();
    resolve_config_with_env(args, env_port.as_deref())
}

/// Same as [`resolve_config`] with the `$PORT` value passed in explicitly.
pub fn resolve_config_with_env(
    args: &Args,
    env_port: Option<&str>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(port) = port_from_env(env_port)? {
        config.port = Some(port);
    }

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/speedtest-exporter/config.yaml",
                "/etc/speedtest-exporter/config.yml",
                "/etc/speedtest-exporter/config.json",
                "./speedtest-exporter.yaml",
                "./speedtest-exporter.yml",
                "./speedtest-exporter.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
