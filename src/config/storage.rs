//! Storage configuration types.

use serde::Deserialize;

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Process-local store; state is lost on restart.
    #[default]
    Memory,
    Sqlite,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
}

impl StorageConfig {
    /// In-memory storage.
    pub fn memory() -> Self {
        Self::default()
    }

    /// File-backed SQLite storage at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            sqlite: SqliteConfig {
                path: path.into(),
                ..SqliteConfig::default()
            },
        }
    }
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file path. `:memory:` keeps the database in process.
    pub path: String,
    /// Connection pool size.
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "data/sagaflow.db".to_string(),
            max_connections: 5,
        }
    }
}

impl SqliteConfig {
    /// sqlx connection URL for this configuration.
    pub fn url(&self) -> String {
        if self.path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", self.path)
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }
}
