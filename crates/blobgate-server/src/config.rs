//! Server configuration, loaded from TOML with environment variable overrides.
//!
//! Precedence, lowest to highest:
//! 1. Built-in defaults
//! 2. A config file, if one is given
//! 3. `BLOBGATE_*` environment variables (double underscore nesting, e.g.
//!    `BLOBGATE_LISTEN__ADDR`)

use std::path::Path;

use serde::{Deserialize, Serialize};

use blobgate_router::RouterConfig;

use crate::error::ServerResult;

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: ListenConfig,
    pub metrics: MetricsConfig,
    pub connection: ConnectionConfig,
    pub router: RouterConfig,
    pub cluster: ClusterConfig,
    pub security: SecurityConfig,
    pub accounts: Vec<AccountConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            metrics: MetricsConfig::default(),
            connection: ConnectionConfig::default(),
            router: RouterConfig::default(),
            cluster: ClusterConfig::default(),
            security: SecurityConfig::default(),
            accounts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub addr: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self { addr: "127.0.0.1:8090".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { addr: "127.0.0.1:9090".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Read/write buffer capacity allocated per connection.
    pub buffer_size: usize,
    /// Connections idle longer than this are closed by the event loop.
    pub idle_timeout_secs: u64,
    /// Hard cap on concurrently open client connections.
    pub max_connections: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
            idle_timeout_secs: 60,
            max_connections: 4096,
        }
    }
}

/// One partition's replica placement, as configured rather than discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaPlacement {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub id: u64,
    pub replicas: Vec<ReplicaPlacement>,
    #[serde(default = "default_true")]
    pub writable: bool,
}

fn default_true() -> bool {
    true
}

/// Fixed cluster topology (§1, §6: a production deployment would instead
/// discover this from a gossip-based membership service and swap in a
/// different `ClusterView` implementation, not reached via config at all).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub datacenter: u8,
    pub partitions: Vec<PartitionConfig>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { datacenter: 0, partitions: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub token: String,
    pub caller_id: String,
    #[serde(default)]
    pub privileged: bool,
}

/// Bearer-token policy and which methods require authentication (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub api_keys: Vec<ApiKeyConfig>,
    /// HTTP methods (`"GET"`, `"HEAD"`, `"POST"`, `"DELETE"`) that require a
    /// recognized bearer token even against public containers.
    pub require_auth_for: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            require_auth_for: vec!["POST".to_string(), "DELETE".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub default_public_container_id: Option<u16>,
    #[serde(default)]
    pub default_private_container_id: Option<u16>,
    #[serde(default)]
    pub containers: Vec<ContainerConfig>,
}

/// Builder-style loader mirroring the layered precedence documented above.
pub struct ConfigLoader {
    file: Option<std::path::PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: "BLOBGATE".to_string(),
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(self) -> ServerResult<ServerConfig> {
        let mut builder = config::Config::builder();
        builder = builder.add_source(config::Config::try_from(&ServerConfig::default())?);

        if let Some(path) = &self.file {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_listen_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.listen.addr, "127.0.0.1:8090");
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn loads_defaults_without_a_file() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.connection.max_connections, 4096);
    }

    #[test]
    fn loads_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobgate.toml");
        std::fs::write(
            &path,
            r#"
[listen]
addr = "0.0.0.0:9000"

[[accounts]]
id = 42
name = "media"
"#,
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(&path).load().unwrap();
        assert_eq!(config.listen.addr, "0.0.0.0:9000");
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].name, "media");
    }
}
