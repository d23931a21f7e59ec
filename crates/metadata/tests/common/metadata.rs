//! Metadata store test utilities.

use brokernode_metadata::{BatchWriter, MetadataResult, MetadataStore, SqliteStore};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;

/// In-memory SQLite store shared as trait object and concrete type.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<dyn MetadataStore>,
    pub(crate) sqlite_store: Arc<SqliteStore>,
}

impl TestMetadata {
    /// Create a new in-memory SQLite store with a fast-retrying batch writer
    /// and settlement enabled.
    pub async fn in_memory() -> MetadataResult<Self> {
        Self::with_settlement(true).await
    }

    /// Create a new in-memory SQLite store with settlement on or off.
    pub async fn with_settlement(enabled: bool) -> MetadataResult<Self> {
        let store = SqliteStore::new(":memory:", None)
            .await?
            .with_batch_writer(BatchWriter::new(10, 3, Duration::from_millis(10)))
            .with_settlement_enabled(enabled);
        let arc_store = Arc::new(store);

        Ok(Self {
            store: arc_store.clone(),
            sqlite_store: arc_store,
        })
    }

    /// Get a reference to the metadata store.
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    /// Get a reference to the SQLite connection pool for raw queries.
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite_store.pool()
    }
}
