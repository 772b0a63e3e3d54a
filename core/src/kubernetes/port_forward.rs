//! `kubectl port-forward` transport.
//!
//! One kubectl child per attempt. stdout lines go to the tunnel's output
//! sink, stderr lines to its error sink. The first `Forwarding from` line
//! marks the attempt ready. When the tunnel's termination signal fires the
//! child gets SIGTERM, then a hard kill after a short grace period.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::debug;

use super::discovery::KubernetesDiscovery;
use super::errors::KubectlError;
use crate::error::Result;
use crate::logger::TunnelLogger;
use crate::ports::{ForwardRequest, ForwardSignals, TunnelTransport};

/// Grace period between SIGTERM and a hard kill.
const KILL_GRACE_PERIOD: Duration = Duration::from_millis(300);

/// kubectl: `Forwarding from 127.0.0.1:8080 -> 80` (or `[::1]:8080 -> 80`).
static FORWARDING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Forwarding from (\S+):(\d+) -> (\d+)").expect("forwarding regex is valid")
});

/// Transport backed by a `kubectl port-forward` child process.
#[derive(Debug, Clone)]
pub struct KubectlPortForward {
    discovery: KubernetesDiscovery,
}

impl KubectlPortForward {
    pub fn new(discovery: KubernetesDiscovery) -> Self {
        Self { discovery }
    }
}

impl Default for KubectlPortForward {
    fn default() -> Self {
        Self::new(KubernetesDiscovery::new())
    }
}

impl TunnelTransport for KubectlPortForward {
    async fn forward(
        &self,
        request: ForwardRequest<'_>,
        signals: ForwardSignals,
        log: &TunnelLogger,
    ) -> Result<()> {
        let kubectl_path = self
            .discovery
            .kubectl_path()
            .ok_or(KubectlError::KubectlNotFound)?;

        let mut child = port_forward_command(kubectl_path, &request)
            .spawn()
            .map_err(|e| KubectlError::ProcessError(format!("Failed to start kubectl: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| KubectlError::ProcessError("kubectl stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| KubectlError::ProcessError("kubectl stderr not captured".to_string()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_open = true;
        let mut err_open = true;
        let mut conflict = None;

        let status = loop {
            tokio::select! {
                line = out_lines.next_line(), if out_open => match line {
                    Ok(Some(line)) => {
                        if parse_forwarding_line(&line).is_some() {
                            signals.ready.mark_ready();
                        }
                        log.out(&line);
                    }
                    _ => out_open = false,
                },
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(line)) => {
                        if let Some(port) = detect_port_conflict(&line) {
                            conflict = Some(port);
                        }
                        log_stderr_line(log, &line);
                    }
                    _ => err_open = false,
                },
                status = child.wait() => break status.map_err(KubectlError::Io)?,
                _ = signals.termination.fired() => {
                    terminate(&mut child, log).await;
                    return Ok(());
                }
            }
        };

        // Flush whatever kubectl wrote right before exiting
        while let Ok(Some(line)) = out_lines.next_line().await {
            log.out(&line);
        }
        while let Ok(Some(line)) = err_lines.next_line().await {
            if let Some(port) = detect_port_conflict(&line) {
                conflict = Some(port);
            }
            log_stderr_line(log, &line);
        }

        if let Some(port) = conflict {
            return Err(KubectlError::PortInUse(port).into());
        }

        if status.success() {
            debug!(pod = %request.endpoint, "kubectl port-forward exited cleanly");
            Ok(())
        } else {
            Err(KubectlError::ForwardExited(status.to_string()).into())
        }
    }
}

/// Builds the `kubectl port-forward` command for one attempt.
fn port_forward_command(kubectl_path: &Path, request: &ForwardRequest<'_>) -> Command {
    let mut command = Command::new(kubectl_path);
    command
        .args(request.cluster.kubectl_args())
        .args([
            "port-forward",
            "-n",
            request.namespace,
            &format!("pod/{}", request.endpoint.name),
            &format!("{}:{}", request.local_port, request.remote_port),
            "--address=127.0.0.1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

fn log_stderr_line(log: &TunnelLogger, line: &str) {
    if is_error_line(line) {
        log.err(line);
    } else {
        log.out(line);
    }
}

/// Stops the child: SIGTERM first, hard kill if it is still around after the grace period.
async fn terminate(child: &mut Child, log: &TunnelLogger) {
    if send_sigterm(child) {
        if let Ok(Ok(_)) = timeout(KILL_GRACE_PERIOD, child.wait()).await {
            return;
        }
    }

    if let Err(e) = child.kill().await {
        log.err(format!("failed to kill kubectl: {}", e));
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal as UnixSignal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), UnixSignal::SIGTERM).is_ok(),
        None => false,
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}

// ============================================================================
// Output Parsing
// ============================================================================

/// Parses a kubectl `Forwarding from` line into (address, local port, remote port).
pub fn parse_forwarding_line(line: &str) -> Option<(String, u16, u16)> {
    let caps = FORWARDING_LINE.captures(line.trim())?;
    let address = caps[1].to_string();
    let local = caps[2].parse().ok()?;
    let remote = caps[3].parse().ok()?;
    Some((address, local, remote))
}

/// Checks if a line indicates an error.
pub fn is_error_line(line: &str) -> bool {
    let line_lower = line.to_lowercase();
    line_lower.contains("error")
        || line_lower.contains("failed")
        || line_lower.contains("unable to")
        || line_lower.contains("connection refused")
        || line_lower.contains("lost connection")
}

/// Detects a local port conflict from a kubectl output line.
///
/// kubectl format: `listen tcp4 127.0.0.1:8080: bind: address already in use`
pub fn detect_port_conflict(line: &str) -> Option<u16> {
    if !line.to_lowercase().contains("address already in use") {
        return None;
    }

    // First number after a colon that is too large to be an IP octet
    line.split(':').skip(1).find_map(|part| {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u16>().ok().filter(|port| *port > 255)
    })
}
