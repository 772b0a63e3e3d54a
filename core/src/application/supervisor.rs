//! Supervisor: owns every tunnel, fans out start and stop.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use super::tunnel::Tunnel;
use crate::config::{validate_tunnels, Config, StartupMode};
use crate::domain::{ClusterConfig, TunnelSpec, TunnelStatus};
use crate::error::{Error, Result};
use crate::ports::{EndpointResolver, TunnelTransport};
use crate::retry::{BackoffSettings, ExponentialBackoff};

/// Settings shared by all tunnels of one supervisor.
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    pub cluster: ClusterConfig,
    pub backoff: BackoffSettings,
    pub startup: StartupMode,
    /// Color tunnel log lines.
    pub colorize: bool,
}

impl SupervisorConfig {
    /// Take the retry and startup settings from a loaded config file.
    pub fn from_config(config: &Config, cluster: ClusterConfig, colorize: bool) -> Self {
        Self {
            cluster,
            backoff: config.retry.clone(),
            startup: config.startup,
            colorize,
        }
    }
}

/// The set of tunnels built from one configuration.
pub struct Supervisor<R, T> {
    tunnels: Vec<Arc<Tunnel<R, T>>>,
    cluster: Arc<ClusterConfig>,
    startup: StartupMode,
    tracker: TaskTracker,
}

impl<R: EndpointResolver, T: TunnelTransport> Supervisor<R, T> {
    /// Validate `specs` and build one inert tunnel per spec, in order.
    pub fn new(
        specs: Vec<TunnelSpec>,
        config: SupervisorConfig,
        resolver: R,
        transport: T,
    ) -> Result<Self> {
        validate_tunnels(&specs)?;
        config.backoff.validate()?;

        let resolver = Arc::new(resolver);
        let transport = Arc::new(transport);
        let tunnels = specs
            .into_iter()
            .enumerate()
            .map(|(identity, spec)| {
                Arc::new(Tunnel::new(
                    spec,
                    identity,
                    Arc::clone(&resolver),
                    Arc::clone(&transport),
                    Box::new(ExponentialBackoff::new(config.backoff.clone())),
                    config.colorize,
                ))
            })
            .collect();

        Ok(Self {
            tunnels,
            cluster: Arc::new(config.cluster),
            startup: config.startup,
            tracker: TaskTracker::new(),
        })
    }

    /// Start every tunnel and wait until all of them have been ready once.
    ///
    /// In sequential mode a tunnel is only started after the previous one
    /// became ready. Fails with [`Error::NotReady`] if a tunnel is stopped
    /// before that.
    pub async fn start_all(&self) -> Result<()> {
        info!(
            tunnels = self.tunnels.len(),
            startup = ?self.startup,
            "Starting tunnels"
        );

        match self.startup {
            StartupMode::Sequential => {
                for tunnel in &self.tunnels {
                    tunnel.start(&self.tracker, Arc::clone(&self.cluster)).await?;
                }
            }
            StartupMode::Concurrent => self.start_concurrently().await?,
        }

        info!("All tunnels ready");
        Ok(())
    }

    async fn start_concurrently(&self) -> Result<()> {
        let mut starts = JoinSet::new();
        for tunnel in &self.tunnels {
            let tunnel = Arc::clone(tunnel);
            let tracker = self.tracker.clone();
            let cluster = Arc::clone(&self.cluster);
            starts.spawn(async move { tunnel.start(&tracker, cluster).await });
        }

        let mut first_error: Option<Error> = None;
        while let Some(joined) = starts.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => warn!(error = %e, "Tunnel start was cancelled"),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop every tunnel and wait for all lifecycle tasks to exit.
    pub async fn stop_all(&self) {
        info!(tunnels = self.tunnels.len(), "Stopping tunnels");
        for tunnel in &self.tunnels {
            tunnel.stop();
        }

        self.tracker.close();
        self.tracker.wait().await;
        info!("All tunnels stopped");
    }

    /// Status of every tunnel, in configuration order.
    pub fn statuses(&self) -> Vec<TunnelStatus> {
        self.tunnels.iter().map(|t| t.status()).collect()
    }

    pub fn tunnels(&self) -> &[Arc<Tunnel<R, T>>] {
        &self.tunnels
    }

    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }

    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }

    pub fn startup(&self) -> StartupMode {
        self.startup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::TunnelLogger;
    use crate::ports::{Endpoint, ForwardRequest, ForwardSignals};

    struct NoResolver;

    impl EndpointResolver for NoResolver {
        async fn resolve(
            &self,
            _cluster: &ClusterConfig,
            _namespace: &str,
            _label_selector: &str,
        ) -> Result<Option<Endpoint>> {
            Ok(None)
        }
    }

    struct NoTransport;

    impl TunnelTransport for NoTransport {
        async fn forward(
            &self,
            _request: ForwardRequest<'_>,
            _signals: ForwardSignals,
            _log: &TunnelLogger,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn spec(name: &str, port: u16) -> TunnelSpec {
        TunnelSpec::new(name, "default", "app=test", port, 80)
    }

    #[test]
    fn test_new_keeps_order_and_assigns_identities() {
        let supervisor = Supervisor::new(
            vec![spec("one", 8001), spec("two", 8002), spec("three", 8003)],
            SupervisorConfig::default(),
            NoResolver,
            NoTransport,
        )
        .unwrap();

        assert_eq!(supervisor.len(), 3);
        let names: Vec<_> = supervisor.tunnels().iter().map(|t| t.name()).collect();
        assert_eq!(names, ["one", "two", "three"]);
        let identities: Vec<_> = supervisor.tunnels().iter().map(|t| t.identity()).collect();
        assert_eq!(identities, [0, 1, 2]);
        assert!(supervisor
            .statuses()
            .iter()
            .all(|s| s.state == crate::domain::TunnelState::Idle));
    }

    #[test]
    fn test_new_rejects_invalid_configuration() {
        let duplicate = Supervisor::new(
            vec![spec("one", 8001), spec("one", 8002)],
            SupervisorConfig::default(),
            NoResolver,
            NoTransport,
        );
        assert!(matches!(duplicate, Err(Error::InvalidTunnel { .. })));

        let empty = Supervisor::new(vec![], SupervisorConfig::default(), NoResolver, NoTransport);
        assert!(matches!(empty, Err(Error::Config(_))));

        let config = SupervisorConfig {
            backoff: BackoffSettings {
                initial_delay_ms: 0,
                ..BackoffSettings::default()
            },
            ..SupervisorConfig::default()
        };
        let bad_retry = Supervisor::new(vec![spec("one", 8001)], config, NoResolver, NoTransport);
        assert!(matches!(bad_retry, Err(Error::InvalidRetry(_))));
    }

    #[tokio::test]
    async fn test_stop_all_without_start() {
        let supervisor = Supervisor::new(
            vec![spec("one", 8001)],
            SupervisorConfig::default(),
            NoResolver,
            NoTransport,
        )
        .unwrap();

        supervisor.stop_all().await;
        supervisor.stop_all().await;
        assert_eq!(
            supervisor.statuses()[0].state,
            crate::domain::TunnelState::Stopped
        );
    }

    #[test]
    fn test_config_from_file_settings() {
        let config = Config {
            tunnels: vec![spec("one", 8001)],
            retry: BackoffSettings::default(),
            startup: StartupMode::Concurrent,
        };
        let settings = SupervisorConfig::from_config(&config, ClusterConfig::default(), true);
        assert_eq!(settings.startup, StartupMode::Concurrent);
        assert!(settings.colorize);
    }
}
