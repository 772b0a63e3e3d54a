//! k8stun Core Library
//!
//! Keeps a fixed set of Kubernetes port-forwards alive:
//! - Resolves a pod by label selector on every connection attempt
//! - Runs `kubectl port-forward` to it and watches the process
//! - Reconnects with exponential backoff when the forward drops
//! - Blocks startup until every tunnel has been usable once
//! - Stops all tunnels and waits for their tasks to exit
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Tunnel specs, lifecycle state and cluster settings
//! - `ports`: Trait definitions (endpoint resolver, tunnel transport)
//! - `kubernetes`: kubectl-backed implementations of the ports
//! - `application`: Tunnel lifecycle and the supervisor

// Hexagonal architecture layers
pub mod application;
pub mod domain;
pub mod kubernetes;
pub mod ports;

pub mod config;
pub mod error;
pub mod logger;
pub mod retry;
pub mod signal;

// Re-export domain types (primary API)
pub use domain::{ClusterConfig, TunnelSpec, TunnelState, TunnelStatus};

// Re-export other commonly used types
pub use application::{Supervisor, SupervisorConfig, Tunnel};
pub use config::{Config, ConfigFile, ConfigFormat, StartupMode};
pub use error::{Error, Result};
pub use kubernetes::{KubectlPortForward, KubernetesDiscovery};
pub use logger::{TunnelLabel, TunnelLogger};
pub use retry::{BackoffSettings, ExponentialBackoff, RetryPolicy, StopAwareBackoff};
pub use signal::Signal;

/// Supervisor wired to kubectl.
pub type KubectlSupervisor = Supervisor<KubernetesDiscovery, KubectlPortForward>;
