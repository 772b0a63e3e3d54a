//! Kubernetes adapters built on kubectl.
//!
//! This module provides:
//! - Pod discovery by label selector (the tunnels' endpoint resolver)
//! - `kubectl port-forward` process handling (the tunnels' transport)

pub mod discovery;
pub mod errors;
pub mod models;
pub mod port_forward;

// Re-export commonly used types
pub use discovery::{expand_home, kubeconfig_sources, KubernetesDiscovery};
pub use errors::KubectlError;
pub use models::PodSummary;
pub use port_forward::KubectlPortForward;
