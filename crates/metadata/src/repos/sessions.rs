//! Upload session repository.

use crate::error::MetadataResult;
use crate::models::{SettlementRow, UploadSessionRow};
use async_trait::async_trait;

/// Repository for upload session operations.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Create an upload session.
    ///
    /// When `settlement` is given it is inserted in the same transaction, so
    /// either both records exist afterwards or neither does. Passing a
    /// settlement to a store with settlement disabled is `InvalidInput`.
    async fn create_session(
        &self,
        session: &UploadSessionRow,
        settlement: Option<&SettlementRow>,
    ) -> MetadataResult<()>;

    /// Get an upload session by genesis hash.
    async fn get_session(&self, genesis_hash: &str) -> MetadataResult<Option<UploadSessionRow>>;

    /// Store the alpha and beta treasure offset candidates and their merge.
    ///
    /// If the candidates cannot be merged (both empty or of different
    /// lengths) the merged map is stored as absent and `None` is returned.
    async fn set_treasure_maps(
        &self,
        genesis_hash: &str,
        alpha: &[i64],
        beta: &[i64],
    ) -> MetadataResult<Option<Vec<i64>>>;

    /// Merged treasure offsets of a session; empty if no merged map is stored.
    async fn get_treasure_offsets(&self, genesis_hash: &str) -> MetadataResult<Vec<i64>>;

    /// Delete a session. Returns whether a session was deleted.
    async fn delete_session(&self, genesis_hash: &str) -> MetadataResult<bool>;
}
