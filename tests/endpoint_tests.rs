//! HTTP-level tests for /metrics, /healthz and / using a stubbed speed test client.

mod common;

use common::{sample_value, server, spawn_app, StubClient};
use std::sync::Arc;

#[tokio::test]
async fn test_healthz_ok_before_any_scrape() {
    let client = Arc::new(StubClient::new(vec![server("a", 1.0)]));
    let (base, _state) = spawn_app(client.clone(), true).await;

    let response = reqwest::get(format!("{base}/healthz")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_healthz_ok_while_metrics_failing() {
    let client = Arc::new(StubClient::new(Vec::new()));
    let (base, _state) = spawn_app(client, true).await;

    let metrics = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(metrics.status(), 500);

    let health = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_healthz_can_be_disabled() {
    let client = Arc::new(StubClient::new(vec![server("a", 1.0)]));
    let (base, _state) = spawn_app(client, false).await;

    let response = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_success_exposes_gauges() {
    let client = Arc::new(StubClient::new(vec![server("a", 40.0), server("b", 4.0)]));
    let (base, _state) = spawn_app(client, true).await;

    let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(response.status(), 200);

    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"), "{content_type}");

    let body = response.text().await.unwrap();
    assert!(body.contains("# TYPE download_speed_bps gauge"));
    assert_eq!(sample_value(&body, "download_speed_bps"), Some(12_500_000.0));
    assert_eq!(sample_value(&body, "upload_speed_bps"), Some(4_000_000.0));
    assert_eq!(sample_value(&body, "ping_seconds"), Some(0.012));
    assert_eq!(sample_value(&body, "jitter_seconds"), Some(0.002));
    assert_eq!(sample_value(&body, "result_valid"), Some(1.0));
    assert!(sample_value(&body, "test_duration_seconds").is_some());
    assert_eq!(sample_value(&body, "speedtest_exporter_scrapes_total"), Some(1.0));
}

#[tokio::test]
async fn test_metrics_download_failure_returns_500_and_keeps_gauges() {
    let client = Arc::new(StubClient::new(vec![server("a", 1.0)]));
    client.fail_at(Some("download"));
    let (base, state) = spawn_app(client.clone(), true).await;

    let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(response.status(), 500);

    let body = response.text().await.unwrap();
    assert!(
        body.contains("failed to run download test"),
        "unexpected body: {body}"
    );

    assert!(!client.calls().contains(&"upload"));
    assert_eq!(state.metrics.ping_seconds.get(), 0.0);
    assert_eq!(state.metrics.jitter_seconds.get(), 0.0);
    assert_eq!(state.metrics.download_speed_bps.get(), 0.0);
}

#[tokio::test]
async fn test_failed_scrape_leaves_previous_values() {
    let client = Arc::new(StubClient::new(vec![server("a", 1.0)]));
    let (base, state) = spawn_app(client.clone(), true).await;

    let ok = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(ok.status(), 200);

    client.fail_at(Some("upload"));
    let failed = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(failed.status(), 500);
    assert_eq!(
        failed.text().await.unwrap(),
        "failed to run upload test: stubbed upload failure"
    );

    assert_eq!(state.metrics.download_speed_bps.get(), 12_500_000.0);
    assert_eq!(state.metrics.upload_speed_bps.get(), 4_000_000.0);
    assert_eq!(state.metrics.result_valid.get(), 1.0);

    client.fail_at(None);
    let body = reqwest::get(format!("{base}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(
        sample_value(
            &body,
            "speedtest_exporter_scrape_failures_total{stage=\"upload\"}"
        ),
        Some(1.0)
    );
    assert_eq!(sample_value(&body, "speedtest_exporter_scrapes_total"), Some(3.0));
}

#[tokio::test]
async fn test_no_server_failure_message() {
    let client = Arc::new(StubClient::new(Vec::new()));
    let (base, _state) = spawn_app(client.clone(), true).await;

    let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(
        response.text().await.unwrap(),
        "failed to find available server: no available server found"
    );
    assert_eq!(client.calls(), vec!["user_info", "server_list"]);
}

#[tokio::test]
async fn test_concurrent_scrapes_all_succeed() {
    const REQUESTS: usize = 16;

    let client = Arc::new(StubClient::new(vec![server("a", 1.0), server("b", 2.0)]));
    let (base, _state) = spawn_app(client.clone(), true).await;
    let http = reqwest::Client::new();

    let requests = (0..REQUESTS).map(|_| http.get(format!("{base}/metrics")).send());
    let responses = futures::future::join_all(requests).await;

    let successes = responses
        .into_iter()
        .filter(|r| r.as_ref().is_ok_and(|r| r.status() == 200))
        .count();
    assert_eq!(successes, REQUESTS);

    let uploads = client.calls().iter().filter(|c| **c == "upload").count();
    assert_eq!(uploads, REQUESTS);
}

#[tokio::test]
async fn test_root_page_links_endpoints() {
    let client = Arc::new(StubClient::new(vec![server("a", 1.0)]));
    let (base, _state) = spawn_app(client.clone(), true).await;

    let response = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert!(body.contains("/metrics"));
    assert!(body.contains("/healthz"));
    assert!(client.calls().is_empty());
}
