//! Broker-to-broker settlement repository.

use crate::error::MetadataResult;
use crate::models::SettlementRow;
use async_trait::async_trait;
use brokernode_core::{PaymentStatus, SessionType};
use time::OffsetDateTime;

/// Repository for settlement records.
#[async_trait]
pub trait SettlementRepo: Send + Sync {
    /// Insert a settlement built with [`crate::models::NewSettlement`].
    async fn create_settlement(&self, settlement: &SettlementRow) -> MetadataResult<()>;

    /// Get the settlement of a genesis hash.
    async fn get_settlement(&self, genesis_hash: &str) -> MetadataResult<Option<SettlementRow>>;

    /// Settlements with exactly `status`.
    async fn get_settlements_by_status(
        &self,
        status: PaymentStatus,
    ) -> MetadataResult<Vec<SettlementRow>>;

    /// Settlements with `status` whose session type is in `session_types`.
    ///
    /// An empty filter, or one naming both types, matches every type.
    async fn get_settlements_by_type_and_status(
        &self,
        session_types: &[SessionType],
        status: PaymentStatus,
    ) -> MetadataResult<Vec<SettlementRow>>;

    /// Settlements still in the in-flight `status` and last updated before `older_than`.
    async fn get_stale_settlements(
        &self,
        status: PaymentStatus,
        older_than: OffsetDateTime,
    ) -> MetadataResult<Vec<SettlementRow>>;

    /// Move a settlement from `from` to `to` if it is still at `from`.
    ///
    /// Fails with `InvalidStateTransition` if the transition is not declared
    /// or the record has moved on, and `NotFound` if it does not exist.
    async fn transition_settlement(
        &self,
        genesis_hash: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> MetadataResult<()>;

    /// Delete settlements whose payments are fully confirmed.
    /// Returns the number of rows deleted; safe to repeat.
    async fn delete_completed_settlements(&self) -> MetadataResult<u64>;
}
