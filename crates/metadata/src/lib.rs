//! Relational bookkeeping store for the brokernode.
//!
//! This crate provides the persistent data model:
//! - Upload sessions with their alpha/beta treasure maps
//! - Per-chunk data map records generated from the hash chain
//! - Stored genesis hashes awaiting webnode allocation
//! - Settlement, burial and claim ledgers with compare-and-set transitions
//! - Batched multi-row writes with bounded retry

pub mod batch;
pub mod error;
pub mod models;
pub mod repos;
pub mod store;
pub mod sweep;

pub use batch::{BatchRow, BatchWriter};
pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};

use brokernode_core::config::{LedgerConfig, MetadataConfig};
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(
    config: &MetadataConfig,
    ledger: &LedgerConfig,
) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs)
                .await?
                .with_batch_writer(BatchWriter::from_config(ledger))
                .with_settlement_enabled(ledger.settlement_enabled);
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
