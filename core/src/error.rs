//! Error types for the k8stun-core library.

use thiserror::Error;

use crate::kubernetes::errors::KubectlError;

/// Result type alias for k8stun operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running tunnels.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tunnel specification failed validation.
    #[error("Invalid tunnel '{name}': {reason}")]
    InvalidTunnel { name: String, reason: String },

    /// Retry settings failed validation.
    #[error("Invalid retry settings: {0}")]
    InvalidRetry(String),

    /// No pod matched the tunnel's selector.
    #[error("No pods matching selector '{selector}' found in namespace '{namespace}'")]
    NoEndpoint { namespace: String, selector: String },

    /// The tunnel was stopped before it ever became ready.
    #[error("Tunnel '{0}' was stopped before it became ready")]
    NotReady(String),

    /// The resolver or transport panicked during an attempt.
    #[error("Attempt panicked: {0}")]
    AttemptPanicked(String),

    /// The forwarding stream ended without an error.
    #[error("Forwarding stream closed")]
    StreamClosed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Kubernetes/kubectl error.
    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] KubectlError),
}

impl Error {
    /// Shorthand for an [`Error::InvalidTunnel`].
    pub fn invalid_tunnel(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTunnel {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
