//! Lifecycle of a single tunnel.
//!
//! A started tunnel runs one background task that loops
//! resolve → forward → back off until it is stopped:
//!
//! ```text
//! Idle ──start──▶ Resolving ──endpoint──▶ Forwarding
//!                   │   ▲                     │
//!        error/none │   │ delay elapsed       │ transport returned
//!                   ▼   │                     │
//!                 BackingOff ◀────────────────┘
//!                   │
//!                   └──stop──▶ Stopped
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio_util::task::TaskTracker;
use tracing::{debug, info_span, Instrument};

use crate::domain::{ClusterConfig, TunnelSpec, TunnelState, TunnelStatus};
use crate::error::{Error, Result};
use crate::logger::{TunnelLabel, TunnelLogger};
use crate::ports::{AttemptReady, EndpointResolver, ForwardRequest, ForwardSignals, TunnelTransport};
use crate::retry::{RetryPolicy, StopAwareBackoff};
use crate::signal::Signal;

/// One supervised port-forward.
pub struct Tunnel<R, T> {
    spec: TunnelSpec,
    identity: usize,
    logger: TunnelLogger,
    resolver: Arc<R>,
    transport: Arc<T>,
    running: Arc<AtomicBool>,
    termination: Signal,
    ready: Signal,
    /// Handed to the lifecycle task on the first `start`.
    policy: Mutex<Option<Box<dyn RetryPolicy>>>,
    status: RwLock<TunnelStatus>,
}

impl<R: EndpointResolver, T: TunnelTransport> Tunnel<R, T> {
    /// Build an inert tunnel.
    ///
    /// `identity` only picks the log color. `policy` is wrapped so that it
    /// stops handing out delays once the tunnel is stopped.
    pub fn new(
        spec: TunnelSpec,
        identity: usize,
        resolver: Arc<R>,
        transport: Arc<T>,
        policy: Box<dyn RetryPolicy>,
        colorize: bool,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(false));
        let logger = TunnelLogger::new(TunnelLabel::new(&spec.name, identity), colorize);
        let policy: Box<dyn RetryPolicy> =
            Box::new(StopAwareBackoff::new(Arc::clone(&running), policy));

        Self {
            status: RwLock::new(TunnelStatus::new(&spec.name)),
            spec,
            identity,
            logger,
            resolver,
            transport,
            running,
            termination: Signal::new(),
            ready: Signal::new(),
            policy: Mutex::new(Some(policy)),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &TunnelSpec {
        &self.spec
    }

    pub fn identity(&self) -> usize {
        self.identity
    }

    pub fn logger(&self) -> &TunnelLogger {
        &self.logger
    }

    /// Whether the lifecycle task should keep going.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.termination.is_fired()
    }

    /// Whether forwarding was established at least once.
    pub fn is_ready(&self) -> bool {
        self.ready.is_fired()
    }

    /// Snapshot of the runtime status.
    pub fn status(&self) -> TunnelStatus {
        self.status.read().clone()
    }

    /// Spawn the lifecycle task on `tracker` and wait until the tunnel is ready.
    ///
    /// Returns [`Error::NotReady`] if the tunnel is stopped before the first
    /// forward is established. A later call spawns nothing and waits on the
    /// same readiness, so it fails the same way once the tunnel is stopped.
    pub async fn start(self: &Arc<Self>, tracker: &TaskTracker, cluster: Arc<ClusterConfig>) -> Result<()> {
        {
            // Held across the check and the spawn so a concurrent `stop` is
            // either seen here or sees the spawned task on the tracker.
            let mut slot = self.policy.lock();
            if self.termination.is_fired() {
                return Err(Error::NotReady(self.spec.name.clone()));
            }

            match slot.take() {
                Some(policy) => {
                    self.running.store(true, Ordering::SeqCst);
                    self.logger.out(format!("starting tunnel {}", self.spec));

                    let tunnel = Arc::clone(self);
                    let span = info_span!("tunnel", name = %self.spec.name);
                    tracker.spawn(async move { tunnel.run(cluster, policy).await }.instrument(span));
                }
                None => debug!(tunnel = %self.spec.name, "Tunnel already started"),
            }
        }

        tokio::select! {
            biased;
            _ = self.termination.fired() => Err(Error::NotReady(self.spec.name.clone())),
            _ = self.ready.fired() => {
                debug!(tunnel = %self.spec.name, "Tunnel ready");
                Ok(())
            }
        }
    }

    /// Ask the lifecycle task to exit. Does not wait for it.
    pub fn stop(&self) {
        let _slot = self.policy.lock();
        self.running.store(false, Ordering::SeqCst);
        self.logger.out("stopping tunnel");

        if !self.termination.fire() {
            self.logger.err("tunnel was already stopped");
        }

        let mut status = self.status.write();
        if status.state == TunnelState::Idle {
            status.transition(TunnelState::Stopped);
        }
    }

    async fn run(&self, cluster: Arc<ClusterConfig>, mut policy: Box<dyn RetryPolicy>) {
        while self.is_running() {
            let ready = AttemptReady::new(self.ready.clone());
            let err = match AssertUnwindSafe(self.attempt(&cluster, &ready))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => Error::StreamClosed,
                Ok(Err(e)) => e,
                Err(panic) => Error::AttemptPanicked(panic_message(panic.as_ref())),
            };

            if ready.is_established() {
                policy.reset();
            }
            if !self.is_running() {
                break;
            }

            {
                let mut status = self.status.write();
                status.failures += 1;
                status.endpoint = None;
                status.last_error = Some(err.to_string());
            }

            let Some(delay) = policy.next_delay() else {
                break;
            };

            self.set_state(TunnelState::BackingOff);
            self.logger.err(format!(
                "tunnel failed: {}, retrying in {}",
                err,
                format_delay(delay)
            ));

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.termination.fired() => {}
            }
        }

        self.set_state(TunnelState::Stopped);
        self.logger.out("tunnel stopped");
    }

    /// One resolve/forward cycle. Returns once the transport has given up.
    async fn attempt(&self, cluster: &ClusterConfig, ready: &AttemptReady) -> Result<()> {
        let attempt = {
            let mut status = self.status.write();
            status.attempts += 1;
            status.attempts
        };
        self.set_state(TunnelState::Resolving);
        debug!(attempt, selector = %self.spec.label_selector, "Resolving endpoint");

        let endpoint = self
            .resolver
            .resolve(cluster, &self.spec.namespace, &self.spec.label_selector)
            .await?
            .ok_or_else(|| Error::NoEndpoint {
                namespace: self.spec.namespace.clone(),
                selector: self.spec.label_selector.clone(),
            })?;

        {
            let mut status = self.status.write();
            status.endpoint = Some(endpoint.name.clone());
        }
        self.set_state(TunnelState::Forwarding);
        self.logger.out(format!("creating tunnel for pod {}", endpoint));

        let request = ForwardRequest {
            cluster,
            namespace: &self.spec.namespace,
            endpoint: &endpoint,
            local_port: self.spec.listen_port,
            remote_port: self.spec.target_port,
        };
        let signals = ForwardSignals {
            termination: self.termination.clone(),
            ready: ready.clone(),
        };

        self.transport.forward(request, signals, &self.logger).await
    }

    fn set_state(&self, state: TunnelState) {
        let previous = self.status.write().transition(state);
        if previous != state {
            debug!(from = %previous, to = %state, "State transition");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn format_delay(delay: Duration) -> String {
    if delay < Duration::from_secs(1) {
        format!("{}ms", delay.as_millis())
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}
