//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod client;
mod messaging;
mod server;
mod storage;

pub use client::{parse_endpoint_list, InvokerConfig, ServiceEndpoint};
pub use messaging::{NotifierConfig, NotifierType, WebhookConfig};
pub use server::{EngineConfig, WorkflowSourceConfig};
pub use storage::{SqliteConfig, StorageConfig, StorageType};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "SAGAFLOW_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "SAGAFLOW";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "SAGAFLOW_LOG";
/// Environment variable for static endpoints (`svc=url,svc2=url2`).
pub const STATIC_ENDPOINTS_ENV_VAR: &str = "SAGAFLOW_STATIC_ENDPOINTS";

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Workflow definition sources loaded at boot.
    pub workflows: WorkflowSourceConfig,
    /// Service endpoints for step dispatch.
    pub endpoints: Vec<ServiceEndpoint>,
    /// Step invoker configuration.
    pub invoker: InvokerConfig,
    /// Lifecycle event notifier.
    pub notifier: NotifierConfig,
    /// Execution engine configuration.
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self {
            engine: EngineConfig {
                recover_on_startup: false,
            },
            notifier: NotifierConfig {
                notifier_type: NotifierType::None,
                ..NotifierConfig::default()
            },
            ..Self::default()
        }
    }

    /// Configured endpoints merged with `STATIC_ENDPOINTS_ENV_VAR`.
    ///
    /// Environment entries win over file entries with the same name.
    pub fn resolved_endpoints(&self) -> Vec<ServiceEndpoint> {
        let mut endpoints = self.endpoints.clone();
        if let Ok(value) = std::env::var(STATIC_ENDPOINTS_ENV_VAR) {
            let (from_env, rejected) = parse_endpoint_list(&value);
            for item in rejected {
                tracing::warn!(entry = %item, "Ignoring malformed static endpoint");
            }
            for endpoint in from_env {
                endpoints.retain(|e| e.name != endpoint.name);
                endpoints.push(endpoint);
            }
        }
        endpoints
    }
}
