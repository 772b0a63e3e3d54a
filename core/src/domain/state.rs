//! Tunnel lifecycle state and status snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a tunnel is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TunnelState {
    /// Constructed, not started.
    #[default]
    Idle,
    /// Looking up a pod that matches the selector.
    Resolving,
    /// Transport running; blocked on the forwarding call.
    Forwarding,
    /// Previous attempt failed, waiting before the next one.
    BackingOff,
    /// Terminal. No further attempts.
    Stopped,
}

impl TunnelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Forwarding => "forwarding",
            Self::BackingOff => "backing-off",
            Self::Stopped => "stopped",
        }
    }

    /// Whether the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for TunnelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime status of one tunnel (not persisted).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelStatus {
    pub name: String,
    pub state: TunnelState,
    /// When the current state was entered.
    pub since: DateTime<Utc>,
    /// Resolve/connect cycles started so far.
    pub attempts: u64,
    /// Cycles that ended in a failure.
    pub failures: u64,
    /// Pod currently being forwarded to.
    pub endpoint: Option<String>,
    pub last_error: Option<String>,
}

impl TunnelStatus {
    /// Creates a fresh idle status.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TunnelState::Idle,
            since: Utc::now(),
            attempts: 0,
            failures: 0,
            endpoint: None,
            last_error: None,
        }
    }

    /// Move to `state`, returning the state that was left.
    pub fn transition(&mut self, state: TunnelState) -> TunnelState {
        let previous = self.state;
        if previous != state {
            self.state = state;
            self.since = Utc::now();
        }
        previous
    }
}
