//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::SagaStore;

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemorySagaStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSagaStore;

/// Initialize storage based on configuration.
///
/// Returns the `SagaStore` implementation for the configured storage type.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn SagaStore>, Box<dyn std::error::Error>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: in-memory (state is lost on restart)");
            Ok(Arc::new(InMemorySagaStore::new()))
        }
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!("Storage: sqlite at {}", config.sqlite.path);

            if !config.sqlite.is_in_memory() {
                if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            // Every pooled connection to `:memory:` opens its own database.
            let max_connections = if config.sqlite.is_in_memory() {
                1
            } else {
                config.sqlite.max_connections.max(1)
            };
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect(&config.sqlite.url())
                .await?;

            let store = SqliteSagaStore::new(pool);
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("SQLite feature not enabled".into())
        }
    }
}
