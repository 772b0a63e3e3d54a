//! Ports layer - Trait definitions (interfaces).
//!
//! The tunnel lifecycle talks to the cluster only through these traits.
//! The kubectl implementations live in `kubernetes`.

mod resolver;
mod transport;

pub use resolver::{Endpoint, EndpointResolver};
pub use transport::{AttemptReady, ForwardRequest, ForwardSignals, TunnelTransport};
