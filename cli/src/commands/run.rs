//! Run command - start every tunnel and keep it up until interrupted.

use anyhow::{bail, Result};
use k8stun_core::{
    ClusterConfig, ConfigFile, KubectlPortForward, KubectlSupervisor, KubernetesDiscovery,
    Supervisor, SupervisorConfig, TunnelStatus,
};
use tracing::{info, warn};

use super::truncate;

pub async fn run(
    config_file: &ConfigFile,
    cluster: ClusterConfig,
    colorize: bool,
    json: bool,
) -> Result<()> {
    let config = config_file.load().await?;

    let discovery = KubernetesDiscovery::new();
    if !discovery.is_kubectl_available() {
        bail!("kubectl not found in the usual install locations or PATH");
    }

    let settings = SupervisorConfig::from_config(&config, cluster, colorize);
    let supervisor: KubectlSupervisor = Supervisor::new(
        config.tunnels,
        settings,
        discovery.clone(),
        KubectlPortForward::new(discovery),
    )?;
    info!(
        config = %config_file.path().display(),
        tunnels = supervisor.len(),
        "Loaded configuration"
    );

    let interrupted = tokio::select! {
        result = supervisor.start_all() => {
            if let Err(e) = result {
                supervisor.stop_all().await;
                return Err(e.into());
            }
            false
        }
        _ = shutdown_signal() => true,
    };

    if !interrupted {
        info!("All tunnels are up, press Ctrl+C to stop");
        shutdown_signal().await;
    }

    supervisor.stop_all().await;
    print_summary(&supervisor.statuses(), json)?;
    Ok(())
}

/// Completes on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

fn print_summary(statuses: &[TunnelStatus], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(statuses)?);
        return Ok(());
    }

    println!(
        "\n{:<20} {:<12} {:<9} {:<9} LAST ERROR",
        "TUNNEL", "STATE", "ATTEMPTS", "FAILURES"
    );
    println!("{}", "-".repeat(80));
    for status in statuses {
        println!(
            "{:<20} {:<12} {:<9} {:<9} {}",
            truncate(&status.name, 20),
            status.state.as_str(),
            status.attempts,
            status.failures,
            status
                .last_error
                .as_deref()
                .map(|e| truncate(e, 60))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}
