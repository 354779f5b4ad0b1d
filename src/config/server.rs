//! Engine and workflow source configuration.

use serde::Deserialize;

/// Execution engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resume incomplete sagas when the process starts.
    pub recover_on_startup: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recover_on_startup: true,
        }
    }
}

/// Where workflow definitions are loaded from at boot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowSourceConfig {
    /// YAML files or directories of YAML files.
    pub paths: Vec<String>,
}
