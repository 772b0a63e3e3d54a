//! Application layer - tunnel lifecycle and supervision.
//!
//! Both services only talk to the cluster through the traits in `ports`,
//! so they run unchanged against kubectl or against test doubles.

mod supervisor;
mod tunnel;

pub use supervisor::{Supervisor, SupervisorConfig};
pub use tunnel::Tunnel;
