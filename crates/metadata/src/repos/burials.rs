//! Treasure burial repository.

use crate::error::MetadataResult;
use crate::models::TreasureRow;
use async_trait::async_trait;
use brokernode_core::PrlStatus;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for treasure burial records.
#[async_trait]
pub trait BurialRepo: Send + Sync {
    /// Insert treasures built with [`crate::models::NewTreasure`].
    /// Returns the number of rows inserted.
    async fn create_treasures(&self, treasures: &[TreasureRow]) -> MetadataResult<u64>;

    /// Get a treasure by id.
    async fn get_treasure(&self, treasure_id: Uuid) -> MetadataResult<Option<TreasureRow>>;

    /// Treasures of one upload, ordered by sector.
    async fn get_treasures_for_upload(&self, genesis_hash: &str) -> MetadataResult<Vec<TreasureRow>>;

    /// Treasures with exactly `status`.
    async fn get_treasures_by_status(&self, status: PrlStatus) -> MetadataResult<Vec<TreasureRow>>;

    /// Treasures still in the in-flight `status` and last updated before `older_than`.
    async fn get_stale_treasures(
        &self,
        status: PrlStatus,
        older_than: OffsetDateTime,
    ) -> MetadataResult<Vec<TreasureRow>>;

    /// Move a treasure from `from` to `to` if it is still at `from`.
    async fn transition_treasure(
        &self,
        treasure_id: Uuid,
        from: PrlStatus,
        to: PrlStatus,
    ) -> MetadataResult<()>;

    /// Delete treasures whose burial is confirmed.
    /// Returns the number of rows deleted; safe to repeat.
    async fn delete_buried_treasures(&self) -> MetadataResult<u64>;
}
