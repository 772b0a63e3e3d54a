//! Errors raised by the kubectl adapters.

use thiserror::Error;

/// Result type for kubectl operations.
pub type Result<T> = std::result::Result<T, KubectlError>;

/// Errors from running or talking to kubectl.
#[derive(Error, Debug)]
pub enum KubectlError {
    #[error("kubectl not found in PATH or known install locations")]
    KubectlNotFound,

    #[error("kubectl command timed out")]
    Timeout,

    #[error("Failed to parse kubectl output: {0}")]
    ParsingFailed(String),

    #[error("Cluster not reachable: {0}")]
    ClusterNotConnected(String),

    #[error("kubectl failed: {0}")]
    CommandFailed(String),

    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("Local port {0} is already in use")]
    PortInUse(u16),

    #[error("port-forward exited: {0}")]
    ForwardExited(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// stderr fragments that mean the API server could not be reached at all.
const NOT_CONNECTED_MARKERS: &[&str] = &[
    "connection refused",
    "no configuration has been provided",
    "dial tcp",
    "unable to connect to the server",
    "i/o timeout",
];

impl KubectlError {
    /// Classifies kubectl stderr output into a typed error.
    pub fn from_kubectl_error(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if NOT_CONNECTED_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::ClusterNotConnected(message);
        }

        Self::CommandFailed(message)
    }

    /// Whether the error means the cluster itself is unreachable.
    pub fn is_cluster_not_connected(&self) -> bool {
        matches!(self, Self::ClusterNotConnected(_))
    }
}
