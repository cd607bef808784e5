//! Storage backend selection

use crate::config::StorageConfig;
use anyhow::Context;
use conduct_storage::memory::InMemoryConductStore;
use conduct_storage::postgres::{PostgresConductStore, SCHEMA_VERSION};
use conduct_storage::ConductStore;
use std::sync::Arc;

/// Open the configured backend. PostgreSQL connections fail unless the
/// database is at the compiled schema version.
pub async fn open(config: &StorageConfig) -> anyhow::Result<Arc<dyn ConductStore>> {
    match config {
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory storage; nothing will be persisted");
            Ok(Arc::new(InMemoryConductStore::new()))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = PostgresConductStore::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await
            .context("failed to open postgres storage")?;
            tracing::info!(schema_version = SCHEMA_VERSION, "Connected to postgres");
            Ok(Arc::new(store))
        }
    }
}

/// Bring a PostgreSQL database up to the compiled schema version.
pub async fn migrate(config: &StorageConfig) -> anyhow::Result<Option<i32>> {
    match config {
        StorageConfig::Memory => Ok(None),
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = PostgresConductStore::open(url, *max_connections, *connect_timeout_secs)
                .await
                .context("failed to connect to postgres")?;
            let before = store.schema_version().await?;
            let after = store.migrate().await.context("schema migration failed")?;
            tracing::info!(from = before, to = after, "Schema is up to date");
            Ok(Some(after))
        }
    }
}
