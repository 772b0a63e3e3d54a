//! Tunnel specification domain model.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One configured port-forward: which pod to look for and which ports to bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelSpec {
    /// Display name, used to tag every log line of this tunnel.
    pub name: String,
    /// Namespace the pods are listed in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Label selector expression, e.g. `app=api,tier!=canary`.
    pub label_selector: String,
    /// Local port to listen on.
    pub listen_port: u16,
    /// Port inside the selected pod.
    pub target_port: u16,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl TunnelSpec {
    /// Create a new tunnel specification.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        label_selector: impl Into<String>,
        listen_port: u16,
        target_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            label_selector: label_selector.into(),
            listen_port,
            target_port,
        }
    }

    /// Port mapping in kubectl syntax (`LISTEN:TARGET`).
    pub fn port_mapping(&self) -> String {
        format!("{}:{}", self.listen_port, self.target_port)
    }

    /// Check the invariants every spec must hold before a tunnel is built from it.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_tunnel("<unnamed>", "name must not be empty"));
        }
        if self.namespace.trim().is_empty() {
            return Err(Error::invalid_tunnel(&self.name, "namespace must not be empty"));
        }
        if self.label_selector.trim().is_empty() {
            return Err(Error::invalid_tunnel(
                &self.name,
                "labelSelector must not be empty",
            ));
        }
        if self
            .label_selector
            .split(',')
            .any(|term| term.trim().is_empty())
        {
            return Err(Error::invalid_tunnel(
                &self.name,
                format!(
                    "labelSelector '{}' contains an empty term",
                    self.label_selector
                ),
            ));
        }
        if self.listen_port == 0 {
            return Err(Error::invalid_tunnel(&self.name, "listenPort must be positive"));
        }
        if self.target_port == 0 {
            return Err(Error::invalid_tunnel(&self.name, "targetPort must be positive"));
        }
        Ok(())
    }
}

impl std::fmt::Display for TunnelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}/{} {})",
            self.name,
            self.namespace,
            self.label_selector,
            self.port_mapping()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TunnelSpec {
        TunnelSpec::new("api", "default", "app=api", 8080, 80)
    }

    #[test]
    fn test_valid_spec() {
        assert!(spec().validate().is_ok());
        assert_eq!(spec().port_mapping(), "8080:80");
        assert_eq!(spec().to_string(), "api (default/app=api 8080:80)");
    }

    #[test]
    fn test_rejects_zero_ports() {
        let mut s = spec();
        s.listen_port = 0;
        assert!(matches!(s.validate(), Err(Error::InvalidTunnel { .. })));

        let mut s = spec();
        s.target_port = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("targetPort"));
    }

    #[test]
    fn test_rejects_bad_selector() {
        let mut s = spec();
        s.label_selector = "   ".to_string();
        assert!(s.validate().is_err());

        s.label_selector = "app=api,,tier=web".to_string();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("empty term"));
    }

    #[test]
    fn test_rejects_empty_name() {
        let mut s = spec();
        s.name = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_namespace_defaults_when_omitted() {
        let json = r#"{"name":"db","labelSelector":"app=pg","listenPort":5432,"targetPort":5432}"#;
        let s: TunnelSpec = serde_json::from_str(json).unwrap();
        assert_eq!(s.namespace, "default");
        assert_eq!(s.label_selector, "app=pg");
    }
}
