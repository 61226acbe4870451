//! Test command implementation.
//!
//! Runs speed tests from the terminal and displays results.

use speedtest_exporter::cli::OutputFormat;
use speedtest_exporter::config::Config;
use speedtest_exporter::metrics::MEGABIT;
use speedtest_exporter::scrape::{run_speedtest, TestOutcome};
use speedtest_exporter::speedtest::HttpSpeedtestClient;

/// Runs `iterations` speed tests with the configured client.
pub async fn command_test(
    iterations: usize,
    format: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = HttpSpeedtestClient::new(&config.speedtest)?;

    if matches!(format, OutputFormat::Text) {
        println!("🧪 Speedtest Exporter - Test Mode");
        println!("=================================");
    }

    for iteration in 1..=iterations {
        if matches!(format, OutputFormat::Text) {
            println!("\n🔄 Iteration {}/{}:", iteration, iterations);
        }

        let outcome = run_speedtest(&client).await?;

        match format {
            OutputFormat::Text => print_text(&outcome),
            OutputFormat::Json => println!("{}", serde_json::to_string(&to_json(&outcome))?),
        }
    }

    if matches!(format, OutputFormat::Text) {
        println!("\n✅ Test completed successfully");
    }
    Ok(())
}

fn print_text(outcome: &TestOutcome) {
    let server = &outcome.server;
    println!(
        "   🌐 Server: {} - {} ({}) [id {}, {:.1} km]",
        server.sponsor, server.name, server.country, server.id, server.distance_km
    );
    println!(
        "   ⏱️  Latency: {:.2} ms (jitter {:.2} ms)",
        outcome.latency.as_secs_f64() * 1000.0,
        outcome.jitter.as_secs_f64() * 1000.0
    );
    println!("   ⬇️  Download: {:.2} Mbit/s", outcome.download_mbps);
    println!("   ⬆️  Upload: {:.2} Mbit/s", outcome.upload_mbps);
    println!(
        "   {} Result {}",
        if outcome.result_valid { "✅" } else { "⚠️ " },
        if outcome.result_valid {
            "valid"
        } else {
            "implausible"
        }
    );
    println!(
        "   📊 Duration: {:.2}s",
        outcome.duration.as_secs_f64()
    );
}

/// Same values and units as the exported gauges.
fn to_json(outcome: &TestOutcome) -> serde_json::Value {
    serde_json::json!({
        "server": {
            "id": outcome.server.id,
            "name": outcome.server.name,
            "sponsor": outcome.server.sponsor,
            "country": outcome.server.country,
            "host": outcome.server.host,
            "distance_km": outcome.server.distance_km,
        },
        "download_speed_bps": outcome.download_mbps * MEGABIT,
        "upload_speed_bps": outcome.upload_mbps * MEGABIT,
        "ping_seconds": outcome.latency.as_secs_f64(),
        "jitter_seconds": outcome.jitter.as_secs_f64(),
        "result_valid": outcome.result_valid,
        "test_duration_seconds": outcome.duration.as_secs_f64(),
    })
}
