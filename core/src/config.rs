//! Tunnel configuration file.
//!
//! The format is picked from the file extension: `.yaml`/`.yml` are read as
//! YAML, anything else as JSON. Keys are camelCase:
//!
//! ```yaml
//! tunnels:
//!   - name: api
//!     namespace: prod
//!     labelSelector: app=api
//!     listenPort: 8080
//!     targetPort: 80
//! retry:
//!   initialDelayMs: 500
//!   maxDelayMs: 60000
//! startup: sequential
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::domain::TunnelSpec;
use crate::error::{Error, Result};
use crate::retry::BackoffSettings;

/// How `start_all` brings tunnels up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StartupMode {
    /// One after the other, each waiting for readiness before the next starts.
    #[default]
    Sequential,
    /// All at once, then wait for every one of them.
    Concurrent,
}

/// Parsed configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Tunnels in start order.
    pub tunnels: Vec<TunnelSpec>,

    /// Reconnect backoff tuning.
    #[serde(default)]
    pub retry: BackoffSettings,

    /// Startup strategy.
    #[serde(default)]
    pub startup: StartupMode,
}

impl Config {
    /// Parse a document in the given format. Does not validate.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config = match format {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        };
        Ok(config)
    }

    /// Check every tunnel and the retry settings.
    pub fn validate(&self) -> Result<()> {
        validate_tunnels(&self.tunnels)?;
        self.retry.validate()
    }
}

/// Check a tunnel list on its own.
///
/// The list must be non-empty, and names and listen ports must be unique.
pub fn validate_tunnels(tunnels: &[TunnelSpec]) -> Result<()> {
    if tunnels.is_empty() {
        return Err(Error::Config("no tunnels configured".to_string()));
    }

    let mut names = HashSet::new();
    let mut ports = HashSet::new();
    for tunnel in tunnels {
        tunnel.validate()?;

        if !names.insert(tunnel.name.as_str()) {
            return Err(Error::invalid_tunnel(&tunnel.name, "duplicate tunnel name"));
        }
        if !ports.insert(tunnel.listen_port) {
            return Err(Error::invalid_tunnel(
                &tunnel.name,
                format!("listenPort {} is used by another tunnel", tunnel.listen_port),
            ));
        }
    }

    Ok(())
}

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        let lower = path.to_string_lossy().to_lowercase();
        if lower.ends_with("yaml") || lower.ends_with("yml") {
            Self::Yaml
        } else {
            Self::Json
        }
    }
}

/// A configuration file on disk.
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        ConfigFormat::from_path(&self.path)
    }

    /// Read, parse and validate the file.
    pub async fn load(&self) -> Result<Config> {
        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Config(format!(
                "unable to read config file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        let config = Config::parse(&content, self.format()).map_err(|e| {
            Error::Config(format!(
                "unable to parse config file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const YAML: &str = r#"
tunnels:
  - name: api
    namespace: prod
    labelSelector: app=api
    listenPort: 8080
    targetPort: 80
  - name: db
    labelSelector: app=postgres,role=primary
    listenPort: 5432
    targetPort: 5432
retry:
  initialDelayMs: 250
startup: concurrent
"#;

    const JSON: &str = r#"{
  "tunnels": [
    {"name": "api", "namespace": "prod", "labelSelector": "app=api", "listenPort": 8080, "targetPort": 80}
  ]
}"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("t.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("T.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("t.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("tunnels")), ConfigFormat::Json);
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tunnels.yaml");
        std::fs::write(&path, YAML).unwrap();

        let config = ConfigFile::new(&path).load().await.unwrap();
        assert_eq!(config.tunnels.len(), 2);
        assert_eq!(config.tunnels[0].namespace, "prod");
        assert_eq!(config.tunnels[1].namespace, "default");
        assert_eq!(config.tunnels[1].label_selector, "app=postgres,role=primary");
        assert_eq!(config.retry.initial_delay_ms, 250);
        assert_eq!(config.retry.max_delay_ms, 60_000);
        assert_eq!(config.startup, StartupMode::Concurrent);
    }

    #[tokio::test]
    async fn test_load_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tunnels.json");
        std::fs::write(&path, JSON).unwrap();

        let config = ConfigFile::new(&path).load().await.unwrap();
        assert_eq!(config.tunnels[0].port_mapping(), "8080:80");
        assert_eq!(config.retry, BackoffSettings::default());
        assert_eq!(config.startup, StartupMode::Sequential);
    }

    #[tokio::test]
    async fn test_missing_file_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.yaml");

        let err = ConfigFile::new(&path).load().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[tokio::test]
    async fn test_parse_error_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ConfigFile::new(&path).load().await.unwrap_err();
        assert!(err.to_string().contains("unable to parse config file"));
    }

    #[tokio::test]
    async fn test_invalid_tunnel_aborts_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(
            &path,
            "tunnels:\n  - name: api\n    labelSelector: ''\n    listenPort: 8080\n    targetPort: 80\n",
        )
        .unwrap();

        let err = ConfigFile::new(&path).load().await.unwrap_err();
        assert!(matches!(err, Error::InvalidTunnel { ref name, .. } if name == "api"));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = Config::parse(YAML, ConfigFormat::Yaml).unwrap();
        assert!(config.validate().is_ok());

        config.tunnels[1].listen_port = 8080;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("listenPort 8080"));

        config.tunnels[1].listen_port = 5432;
        config.tunnels[1].name = "api".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate tunnel name"));
    }

    #[test]
    fn test_validate_rejects_empty_and_bad_retry() {
        assert!(Config::default().validate().is_err());

        let mut config = Config::parse(JSON, ConfigFormat::Json).unwrap();
        config.retry.multiplier = 0.5;
        assert!(matches!(config.validate(), Err(Error::InvalidRetry(_))));
    }
}
