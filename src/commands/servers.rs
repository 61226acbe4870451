//! Servers command implementation.
//!
//! Lists the servers the exporter would choose from, closest first.

use speedtest_exporter::config::Config;
use speedtest_exporter::speedtest::{HttpSpeedtestClient, SpeedtestClient};

/// Prints discovered servers ordered by distance.
pub async fn command_servers(
    limit: Option<usize>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = HttpSpeedtestClient::new(&config.speedtest)?;

    let user = client.fetch_user_info().await?;
    println!("📍 Client: {} ({}) at {:.4}, {:.4}", user.ip, user.isp, user.lat, user.lon);

    let servers = client.fetch_servers(&user).await?;
    let available = servers.available().len();

    println!(
        "\n{:>8} | {:>9} | {:>10} | {:30} | {}",
        "ID", "Distance", "Probe", "Sponsor", "Location"
    );
    println!("{}", "-".repeat(90));

    let sorted = servers.sorted_by_distance();
    for server in sorted.iter().take(limit.unwrap_or(sorted.len())) {
        let probe = match server.probe_latency {
            Some(rtt) => format!("{:.1} ms", rtt.as_secs_f64() * 1000.0),
            None => "down".to_string(),
        };
        println!(
            "{:>8} | {:>6.1} km | {:>10} | {:30} | {}, {}",
            server.id, server.distance_km, probe, server.sponsor, server.name, server.country
        );
    }

    println!(
        "\n📊 {} servers discovered, {} available",
        servers.len(),
        available
    );
    Ok(())
}
