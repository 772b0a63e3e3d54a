//! Domain layer - Pure data models.
//!
//! These types have no I/O dependencies and can be tested in isolation.

mod cluster;
mod state;
mod tunnel_spec;

pub use cluster::ClusterConfig;
pub use state::{TunnelState, TunnelStatus};
pub use tunnel_spec::TunnelSpec;
