//! # Proxy Configuration
//!
//! Layered configuration for the execution orchestrator: built-in defaults,
//! then an optional configuration file, then `SHARD_PROXY_*` environment
//! overrides (nested keys separated by `__`, e.g.
//! `SHARD_PROXY_BACKEND__EXECUTION_TIMEOUT_MS=500`).
//!
//! ```rust,no_run
//! use shard_proxy::config::ProxyConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProxyConfig::load()?;
//! println!("lease timeout: {:?}", config.backend.connection_timeout());
//! # Ok(())
//! # }
//! ```

use crate::constants::ExecutionMode;
use crate::error::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "SHARD_PROXY_CONFIG";

const ENV_PREFIX: &str = "SHARD_PROXY";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Routing mode for every statement
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Log each rebuilt statement together with its target
    #[serde(default)]
    pub show_sql: bool,

    /// Reload table metadata after a successful DDL statement (sharding mode only)
    #[serde(default = "default_refresh_metadata")]
    pub refresh_metadata_on_ddl: bool,

    /// Backend connection and execution settings
    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_refresh_metadata() -> bool {
    true
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            show_sql: false,
            refresh_metadata_on_ddl: true,
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Maximum wait for a pooled connection
    pub connection_timeout_ms: u64,
    /// Maximum wait for every target of one statement to answer
    pub execution_timeout_ms: u64,
    /// Capacity of each per-target connection pool
    pub max_connections_per_target: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 3000,
            execution_timeout_ms: 3000,
            max_connections_per_target: 8,
        }
    }
}

impl BackendConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }
}

impl ProxyConfig {
    /// Load configuration, honouring `SHARD_PROXY_CONFIG` when it names a file
    pub fn load() -> ProxyResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load configuration from an optional file plus environment overrides
    pub fn load_from(path: Option<&Path>) -> ProxyResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading proxy configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: ProxyConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ProxyResult<()> {
        if self.backend.connection_timeout_ms == 0 {
            return Err(ProxyError::Configuration(
                "backend.connection_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.backend.execution_timeout_ms == 0 {
            return Err(ProxyError::Configuration(
                "backend.execution_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.backend.max_connections_per_target == 0 {
            return Err(ProxyError::Configuration(
                "backend.max_connections_per_target must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
