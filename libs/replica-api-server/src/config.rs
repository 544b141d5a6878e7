use serde::Deserialize;

use replica_engine::ReplicaConfig;

use crate::error::ServerError;

/// Server configuration, parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port. `0` picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Settings applied to every instance.
    #[serde(default)]
    pub replica: ReplicaConfig,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4943
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            replica: ReplicaConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loopback on a free port, default replica settings.
    pub fn ephemeral() -> Self {
        Self { port: 0, ..Self::default() }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ServerError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ServerError::Config(e.to_string()))?;
        config
            .replica
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(config)
    }
}
