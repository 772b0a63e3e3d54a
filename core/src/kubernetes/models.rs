//! Kubernetes data models for pod discovery.

use serde::{Deserialize, Serialize};

/// A pod returned by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    /// Pod phase (`Running`, `Pending`, ...), when reported.
    pub phase: Option<String>,
}

impl PodSummary {
    /// Returns the pod ID in the format "namespace/name".
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

// ============================================================================
// kubectl JSON Response Parsing
// ============================================================================

/// Response structure for `kubectl get pods -o json`.
#[derive(Debug, Deserialize)]
pub struct PodListResponse {
    pub items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
pub struct PodItem {
    pub metadata: PodMetadata,
    pub status: Option<PodStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PodMetadata {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Deserialize)]
pub struct PodStatus {
    pub phase: Option<String>,
}

impl PodListResponse {
    /// Converts the kubectl response to pod summaries, keeping kubectl's order.
    pub fn into_pods(self) -> Vec<PodSummary> {
        self.items
            .into_iter()
            .map(|item| PodSummary {
                name: item.metadata.name,
                namespace: item.metadata.namespace,
                phase: item.status.and_then(|s| s.phase),
            })
            .collect()
    }
}
