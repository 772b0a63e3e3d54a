//! Check command - validate the configuration without starting anything.

use anyhow::Result;
use k8stun_core::kubernetes::kubeconfig_sources;
use k8stun_core::{ClusterConfig, ConfigFile, KubernetesDiscovery};
use serde_json::json;

pub async fn run(config_file: &ConfigFile, cluster: &ClusterConfig, json: bool) -> Result<()> {
    let config = config_file.load().await?;
    let discovery = KubernetesDiscovery::new();

    if json {
        let report = json!({
            "config": config_file.path(),
            "valid": true,
            "tunnels": config.tunnels.len(),
            "startup": config.startup,
            "retry": config.retry,
            "kubectl": discovery.kubectl_path(),
            "cluster": cluster,
            "kubeconfigSources": kubeconfig_sources(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Configuration OK: {} ({} tunnels)",
        config_file.path().display(),
        config.tunnels.len()
    );
    match discovery.kubectl_path() {
        Some(path) => println!("kubectl:    {}", path.display()),
        None => println!("kubectl:    not found"),
    }
    match &cluster.kubeconfig {
        Some(path) => println!("kubeconfig: {}", path.display()),
        None => {
            let sources: Vec<String> = kubeconfig_sources()
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            println!("kubeconfig: {} (kubectl default)", sources.join(", "));
        }
    }
    if let Some(context) = &cluster.context {
        println!("context:    {}", context);
    }

    Ok(())
}
