//! List command - show the configured tunnels.

use anyhow::Result;
use k8stun_core::ConfigFile;

use super::truncate;

pub async fn run(config_file: &ConfigFile, json: bool) -> Result<()> {
    let config = config_file.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.tunnels)?);
        return Ok(());
    }

    // Table header
    println!(
        "{:<20} {:<16} {:<30} {:<7} REMOTE",
        "NAME", "NAMESPACE", "SELECTOR", "LOCAL"
    );
    println!("{}", "-".repeat(80));

    for tunnel in &config.tunnels {
        println!(
            "{:<20} {:<16} {:<30} {:<7} {}",
            truncate(&tunnel.name, 20),
            truncate(&tunnel.namespace, 16),
            truncate(&tunnel.label_selector, 30),
            tunnel.listen_port,
            tunnel.target_port
        );
    }

    println!("\nTotal: {} tunnels", config.tunnels.len());
    Ok(())
}
