//! Cluster connection settings shared by every tunnel.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How to reach the cluster. Shared read-only across all tunnels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Path to the kubeconfig file; kubectl's own default when `None`.
    pub kubeconfig: Option<PathBuf>,
    /// Context inside the kubeconfig; the current context when `None`.
    pub context: Option<String>,
}

impl ClusterConfig {
    pub fn new(kubeconfig: Option<PathBuf>, context: Option<String>) -> Self {
        Self {
            kubeconfig,
            context,
        }
    }

    /// Global kubectl flags selecting this cluster.
    pub fn kubectl_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(path.display().to_string());
        }
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args
    }
}
