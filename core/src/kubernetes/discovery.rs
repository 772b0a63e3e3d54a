//! Kubernetes discovery using kubectl commands.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::errors::{KubectlError, Result};
use super::models::{PodListResponse, PodSummary};
use crate::domain::ClusterConfig;
use crate::ports::{Endpoint, EndpointResolver};

/// Default paths to search for kubectl.
const KUBECTL_PATHS: &[&str] = &[
    "/opt/homebrew/bin/kubectl", // Apple Silicon
    "/usr/local/bin/kubectl",    // Intel Mac / Homebrew
    "/usr/bin/kubectl",          // System
];

/// Timeout for kubectl discovery commands.
const KUBECTL_TIMEOUT: Duration = Duration::from_secs(15);

/// Kubernetes discovery service.
#[derive(Debug, Clone)]
pub struct KubernetesDiscovery {
    kubectl_path: Option<PathBuf>,
}

impl KubernetesDiscovery {
    /// Creates a new KubernetesDiscovery, searching known locations then `PATH`.
    pub fn new() -> Self {
        Self {
            kubectl_path: find_executable(KUBECTL_PATHS).or_else(|| find_in_path("kubectl")),
        }
    }

    /// Creates a new KubernetesDiscovery with a custom kubectl path.
    pub fn with_path(kubectl_path: Option<PathBuf>) -> Self {
        Self { kubectl_path }
    }

    /// Returns the kubectl path if found.
    pub fn kubectl_path(&self) -> Option<&PathBuf> {
        self.kubectl_path.as_ref()
    }

    /// Returns true if kubectl is available.
    pub fn is_kubectl_available(&self) -> bool {
        self.kubectl_path.is_some()
    }

    /// Fetches pods in `namespace` matching `label_selector`.
    pub async fn fetch_pods(
        &self,
        cluster: &ClusterConfig,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodSummary>> {
        let output = self
            .execute_kubectl(
                cluster,
                &[
                    "get",
                    "pods",
                    "-n",
                    namespace,
                    "-l",
                    label_selector,
                    "-o",
                    "json",
                    "--request-timeout=10s",
                ],
            )
            .await?;

        let response: PodListResponse = serde_json::from_str(&output)
            .map_err(|e| KubectlError::ParsingFailed(e.to_string()))?;

        Ok(response.into_pods())
    }

    /// Executes a kubectl command and returns the output.
    async fn execute_kubectl(&self, cluster: &ClusterConfig, args: &[&str]) -> Result<String> {
        let kubectl_path = self
            .kubectl_path
            .as_ref()
            .ok_or(KubectlError::KubectlNotFound)?;

        let result = timeout(KUBECTL_TIMEOUT, async {
            let output = Command::new(kubectl_path)
                .args(cluster.kubectl_args())
                .args(args)
                .kill_on_drop(true)
                .output()
                .await?;

            Ok::<_, std::io::Error>((output.status, output.stdout, output.stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    String::from_utf8(stdout)
                        .map_err(|e| KubectlError::ParsingFailed(e.to_string()))
                } else {
                    let stderr_str = String::from_utf8_lossy(&stderr);
                    Err(KubectlError::from_kubectl_error(&stderr_str))
                }
            }
            Ok(Err(e)) => Err(KubectlError::Io(e)),
            Err(_) => Err(KubectlError::Timeout),
        }
    }
}

impl Default for KubernetesDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointResolver for KubernetesDiscovery {
    async fn resolve(
        &self,
        cluster: &ClusterConfig,
        namespace: &str,
        label_selector: &str,
    ) -> crate::error::Result<Option<Endpoint>> {
        let pods = self.fetch_pods(cluster, namespace, label_selector).await?;
        debug!(
            namespace,
            selector = label_selector,
            matches = pods.len(),
            "Listed pods"
        );
        Ok(pods.into_iter().next().map(|pod| Endpoint::new(pod.name)))
    }
}

/// Kubeconfig files kubectl reads when no `--kubeconfig` is passed: every
/// entry of `$KUBECONFIG` (merged by kubectl), else `~/.kube/config`.
pub fn kubeconfig_sources() -> Vec<PathBuf> {
    sources_from(std::env::var_os("KUBECONFIG"), dirs::home_dir())
}

fn sources_from(kubeconfig_env: Option<OsString>, home: Option<PathBuf>) -> Vec<PathBuf> {
    match kubeconfig_env.filter(|value| !value.is_empty()) {
        Some(value) => std::env::split_paths(&value)
            .filter(|path| !path.as_os_str().is_empty())
            .collect(),
        None => home
            .map(|home| vec![home.join(".kube").join("config")])
            .unwrap_or_default(),
    }
}

/// Expands a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Finds an executable in the given paths.
fn find_executable(paths: &[&str]) -> Option<PathBuf> {
    for path in paths {
        let path_buf = PathBuf::from(path);
        if path_buf.exists() {
            return Some(path_buf);
        }
    }
    None
}

/// Finds `name` in the directories listed in `PATH`.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kubernetes_discovery_creation() {
        let discovery = KubernetesDiscovery::new();
        // Just test that it doesn't panic
        let _ = discovery.is_kubectl_available();
    }

    #[test]
    fn test_find_executable() {
        // Test with a path that should exist on most systems
        let result = find_executable(&["/bin/sh", "/usr/bin/sh"]);
        assert!(result.is_some());

        // Test with a path that shouldn't exist
        let result = find_executable(&["/nonexistent/path"]);
        assert!(result.is_none());
    }

    #[test]
    fn test_find_in_path_misses_unknown_binary() {
        assert!(find_in_path("definitely-not-a-real-binary-k8stun").is_none());
    }

    #[test]
    fn test_kubeconfig_sources_keep_every_entry() {
        let joined = std::env::join_paths(["/etc/kube/a", "/etc/kube/b"]).unwrap();
        assert_eq!(
            sources_from(Some(joined), Some(PathBuf::from("/home/dev"))),
            vec![PathBuf::from("/etc/kube/a"), PathBuf::from("/etc/kube/b")]
        );

        assert_eq!(
            sources_from(Some(OsString::new()), Some(PathBuf::from("/home/dev"))),
            vec![PathBuf::from("/home/dev/.kube/config")]
        );
        assert!(sources_from(None, None).is_empty());
    }

    #[test]
    fn test_expand_home() {
        let plain = PathBuf::from("/etc/kube/config");
        assert_eq!(expand_home(&plain), plain);

        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home(Path::new("~/.kube/config")),
                home.join(".kube/config")
            );
        }
    }

    #[test]
    fn test_kubectl_error_detection() {
        let connection_refused = KubectlError::from_kubectl_error("connection refused");
        assert!(connection_refused.is_cluster_not_connected());

        let no_config = KubectlError::from_kubectl_error("no configuration has been provided");
        assert!(no_config.is_cluster_not_connected());

        let dial_error = KubectlError::from_kubectl_error("dial tcp 127.0.0.1:6443: connect");
        assert!(dial_error.is_cluster_not_connected());

        let other_error = KubectlError::from_kubectl_error("some other error");
        assert!(!other_error.is_cluster_not_connected());
    }

    #[tokio::test]
    async fn test_resolve_without_kubectl_fails() {
        let discovery = KubernetesDiscovery::with_path(None);
        let result = discovery
            .resolve(&ClusterConfig::default(), "default", "app=api")
            .await;
        assert!(matches!(
            result,
            Err(crate::error::Error::Kubernetes(KubectlError::KubectlNotFound))
        ));
    }
}
