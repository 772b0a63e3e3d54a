//! Endpoint resolver port (interface).

use crate::domain::ClusterConfig;
use crate::error::Result;

/// A pod selected to forward into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub name: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Port for finding the endpoint a tunnel should forward into.
///
/// Called once per connection attempt; results are never cached.
pub trait EndpointResolver: Send + Sync + 'static {
    /// Return at most one endpoint in `namespace` matching `label_selector`.
    ///
    /// `Ok(None)` means nothing matched; the caller treats it as retryable.
    fn resolve(
        &self,
        cluster: &ClusterConfig,
        namespace: &str,
        label_selector: &str,
    ) -> impl std::future::Future<Output = Result<Option<Endpoint>>> + Send;
}
