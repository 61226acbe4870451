//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use speedtest_exporter::cli::ConfigFormat;
use speedtest_exporter::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("speedtest-exporter.yaml"));

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Speedtest Exporter Configuration
# =================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9516                   # HTTP port ($PORT overrides, --port overrides both)
#
# Feature Flags
# -------------
# enable_health: true          # Enable /healthz endpoint
# enable_telemetry: true       # Enable speedtest_exporter_* metrics
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
#
# Speed Test
# ----------
# speedtest:
#   config_url: ...            # speedtest.net client configuration (caller IP/location)
#   servers_url: ...           # speedtest.net server list (JSON)
#   server_limit: 10           # Candidate servers requested per scrape
#   ping_count: 10             # Round trips per latency test
#   concurrency: 4             # Parallel transfers for download/upload
#   test_duration_secs: 10     # Length of each throughput test (< request_timeout_secs)
#   request_timeout_secs: 30   # Timeout of a single HTTP request
#   upload_chunk_kb: 512       # Size of one upload request body
"#;

    format!("{comments}\n{yaml}")
}
