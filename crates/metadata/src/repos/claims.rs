//! Treasure claim repository.

use crate::error::MetadataResult;
use crate::models::TreasureClaimRow;
use async_trait::async_trait;
use brokernode_core::{ClaimPrlStatus, GasTransferStatus};
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for treasure claim records.
///
/// The PRL and gas tracks of a claim are queried and advanced separately.
#[async_trait]
pub trait ClaimRepo: Send + Sync {
    /// Insert a claim built with [`crate::models::NewClaim`].
    /// A second claim for the same sector fails with `AlreadyExists`.
    async fn create_claim(&self, claim: &TreasureClaimRow) -> MetadataResult<()>;

    /// Get the claim for a sector of an upload.
    async fn get_claim(
        &self,
        genesis_hash: &str,
        sector_idx: i64,
    ) -> MetadataResult<Option<TreasureClaimRow>>;

    /// Claims whose PRL transfer has exactly `status`.
    async fn get_claims_by_prl_status(
        &self,
        status: ClaimPrlStatus,
    ) -> MetadataResult<Vec<TreasureClaimRow>>;

    /// Claims whose gas transfer has exactly `status`.
    async fn get_claims_by_gas_status(
        &self,
        status: GasTransferStatus,
    ) -> MetadataResult<Vec<TreasureClaimRow>>;

    /// Claims whose PRL transfer is still at the in-flight `status` and that
    /// were last updated before `older_than`.
    async fn get_stale_prl_claims(
        &self,
        status: ClaimPrlStatus,
        older_than: OffsetDateTime,
    ) -> MetadataResult<Vec<TreasureClaimRow>>;

    /// Claims whose gas transfer is still at the in-flight `status` and that
    /// were last updated before `older_than`.
    async fn get_stale_gas_transfers(
        &self,
        status: GasTransferStatus,
        older_than: OffsetDateTime,
    ) -> MetadataResult<Vec<TreasureClaimRow>>;

    /// Move the PRL track from `from` to `to` if it is still at `from`.
    async fn transition_claim_prl(
        &self,
        claim_id: Uuid,
        from: ClaimPrlStatus,
        to: ClaimPrlStatus,
    ) -> MetadataResult<()>;

    /// Move the gas track from `from` to `to` if it is still at `from`.
    async fn transition_claim_gas(
        &self,
        claim_id: Uuid,
        from: GasTransferStatus,
        to: GasTransferStatus,
    ) -> MetadataResult<()>;

    /// Start the claim clock if it has not started yet.
    /// Returns whether the clock was started by this call.
    async fn start_claim_clock(&self, claim_id: Uuid, clock: i64) -> MetadataResult<bool>;

    /// Delete claims whose gas leftovers have been reclaimed.
    /// Returns the number of rows deleted; safe to repeat.
    async fn delete_completed_claims(&self) -> MetadataResult<u64>;
}
