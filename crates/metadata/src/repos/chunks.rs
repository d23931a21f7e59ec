//! Chunk (data map) repository.

use crate::error::MetadataResult;
use crate::models::DataMapRow;
use async_trait::async_trait;
use brokernode_core::{ChunkStatus, GenesisHash};

/// Repository for per-chunk records.
#[async_trait]
pub trait ChunkRepo: Send + Sync {
    /// Create pending records for chunks `0..total_chunks` from the hash chain
    /// seeded by `genesis_hash`.
    ///
    /// Written through the batch writer; re-running resets existing rows to
    /// pending and clears their messages.
    /// Returns the number of rows affected.
    async fn create_data_maps(
        &self,
        genesis_hash: &GenesisHash,
        total_chunks: i64,
    ) -> MetadataResult<u64>;

    /// Records for chunks `start..=end` (in either order), ascending by index.
    async fn get_data_maps(
        &self,
        genesis_hash: &str,
        start: i64,
        end: i64,
    ) -> MetadataResult<Vec<DataMapRow>>;

    /// Attach received messages and mark those chunks unassigned.
    async fn attach_messages(
        &self,
        genesis_hash: &str,
        messages: &[(i64, String)],
    ) -> MetadataResult<u64>;

    /// Mark the given chunks complete. Returns the number of rows updated.
    async fn mark_data_maps_complete(
        &self,
        genesis_hash: &str,
        chunk_idxs: &[i64],
    ) -> MetadataResult<u64>;

    /// Count records of an upload with the given status.
    async fn count_data_maps_by_status(
        &self,
        genesis_hash: &str,
        status: ChunkStatus,
    ) -> MetadataResult<i64>;

    /// Delete every record of an upload. Returns the number of rows deleted.
    async fn delete_data_maps(&self, genesis_hash: &str) -> MetadataResult<u64>;
}
