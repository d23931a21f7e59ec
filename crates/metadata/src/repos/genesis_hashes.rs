//! Stored genesis hash repository.

use crate::error::MetadataResult;
use crate::models::StoredGenesisHashRow;
use async_trait::async_trait;
use brokernode_core::GenesisHashStatus;

/// Repository for stored files awaiting allocation to webnodes.
#[async_trait]
pub trait GenesisHashRepo: Send + Sync {
    /// Record a stored genesis hash.
    async fn add_stored_genesis_hash(&self, row: &StoredGenesisHashRow) -> MetadataResult<()>;

    /// Get a stored genesis hash.
    async fn get_stored_genesis_hash(
        &self,
        genesis_hash: &str,
    ) -> MetadataResult<Option<StoredGenesisHashRow>>;

    /// The unassigned record with the earliest creation time whose webnode
    /// count is below `webnode_limit`.
    ///
    /// Returns `NoEligibleRecord` when there is none.
    async fn find_oldest_eligible(&self, webnode_limit: i32) -> MetadataResult<StoredGenesisHashRow>;

    /// Increment the webnode count, returning the new count.
    async fn increment_webnode_count(&self, genesis_hash: &str) -> MetadataResult<i32>;

    /// Set the assignment status.
    async fn set_genesis_hash_status(
        &self,
        genesis_hash: &str,
        status: GenesisHashStatus,
    ) -> MetadataResult<()>;
}
