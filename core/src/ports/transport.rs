//! Tunnel transport port (interface).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::ClusterConfig;
use crate::error::Result;
use crate::logger::TunnelLogger;
use crate::signal::Signal;

use super::Endpoint;

/// What to forward for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct ForwardRequest<'a> {
    pub cluster: &'a ClusterConfig,
    pub namespace: &'a str,
    pub endpoint: &'a Endpoint,
    pub local_port: u16,
    pub remote_port: u16,
}

/// Readiness handle for a single attempt.
///
/// Marking an attempt ready records that forwarding was established (so the
/// tunnel resets its backoff afterwards) and opens the tunnel's readiness
/// gate. Marking twice is harmless.
#[derive(Debug, Clone)]
pub struct AttemptReady {
    established: Arc<AtomicBool>,
    tunnel_ready: Signal,
}

impl AttemptReady {
    pub fn new(tunnel_ready: Signal) -> Self {
        Self {
            established: Arc::new(AtomicBool::new(false)),
            tunnel_ready,
        }
    }

    /// Report that the stream is up and usable.
    pub fn mark_ready(&self) {
        self.established.store(true, Ordering::SeqCst);
        self.tunnel_ready.fire();
    }

    /// Whether this attempt reached the ready state.
    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::SeqCst)
    }
}

/// Signals handed to the transport for one attempt.
#[derive(Debug, Clone)]
pub struct ForwardSignals {
    /// Fires when the tunnel is stopped; the transport should end the stream.
    pub termination: Signal,
    /// To be marked once the stream is established.
    pub ready: AttemptReady,
}

/// Port for the byte-stream transport between a local port and a pod port.
pub trait TunnelTransport: Send + Sync + 'static {
    /// Establish forwarding and block until the stream ends or fails.
    ///
    /// Returning at all, `Ok` included, means the stream is gone and the
    /// tunnel will back off and try again.
    fn forward(
        &self,
        request: ForwardRequest<'_>,
        signals: ForwardSignals,
        log: &TunnelLogger,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_ready_opens_tunnel_gate() {
        let gate = Signal::new();
        let ready = AttemptReady::new(gate.clone());
        assert!(!ready.is_established());

        ready.mark_ready();
        ready.mark_ready();
        assert!(ready.is_established());
        assert!(gate.is_fired());

        // A later attempt starts out not established even though the gate is open
        let next = AttemptReady::new(gate);
        assert!(!next.is_established());
    }
}
