use serde::Deserialize;

use crate::error::ReplicaError;

/// Replica settings, the `[replica]` table of the server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicaConfig {
    /// Clock value of a new instance, nanoseconds since the Unix epoch.
    /// Unset: host wall clock at instance creation.
    #[serde(default)]
    pub initial_time_nanos: Option<u64>,

    /// Upper bound for `tick(n)`.
    #[serde(default = "default_max_ticks_per_request")]
    pub max_ticks_per_request: u32,

    /// Instances a server hosts at once.
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
}

fn default_max_ticks_per_request() -> u32 {
    10_000
}

fn default_max_instances() -> usize {
    64
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            initial_time_nanos: None,
            max_ticks_per_request: default_max_ticks_per_request(),
            max_instances: default_max_instances(),
        }
    }
}

impl ReplicaConfig {
    /// Parse a standalone `[replica]` table from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ReplicaError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ReplicaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReplicaError> {
        if self.max_ticks_per_request == 0 {
            return Err(ReplicaError::Config("max_ticks_per_request must be positive".into()));
        }
        if self.max_instances == 0 {
            return Err(ReplicaError::Config("max_instances must be positive".into()));
        }
        Ok(())
    }
}
