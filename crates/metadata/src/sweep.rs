//! Timeout and cleanup queries driven by the ledger configuration.
//!
//! Ledger workers poll these to find records stuck in an in-flight status
//! longer than the configured timeout, and to drop records that reached
//! their terminal success status.

use crate::error::MetadataResult;
use crate::models::{SettlementRow, TreasureClaimRow, TreasureRow};
use crate::store::MetadataStore;
use brokernode_core::config::LedgerConfig;
use brokernode_core::{ClaimPrlStatus, GasTransferStatus, PaymentStatus, PrlStatus};
use tracing::{info, instrument};

/// Settlements stuck in `status` past `settlement_timeout_secs`.
pub async fn timed_out_settlements(
    store: &dyn MetadataStore,
    config: &LedgerConfig,
    status: PaymentStatus,
) -> MetadataResult<Vec<SettlementRow>> {
    let older_than = LedgerConfig::stale_threshold(config.settlement_timeout_secs);
    store.get_stale_settlements(status, older_than).await
}

/// Treasures stuck in `status` past `bury_timeout_secs`.
pub async fn timed_out_burials(
    store: &dyn MetadataStore,
    config: &LedgerConfig,
    status: PrlStatus,
) -> MetadataResult<Vec<TreasureRow>> {
    let older_than = LedgerConfig::stale_threshold(config.bury_timeout_secs);
    store.get_stale_treasures(status, older_than).await
}

/// Claims whose PRL transfer is stuck in `status` past `claim_timeout_secs`.
pub async fn timed_out_prl_claims(
    store: &dyn MetadataStore,
    config: &LedgerConfig,
    status: ClaimPrlStatus,
) -> MetadataResult<Vec<TreasureClaimRow>> {
    let older_than = LedgerConfig::stale_threshold(config.claim_timeout_secs);
    store.get_stale_prl_claims(status, older_than).await
}

/// Claims whose gas transfer is stuck in `status` past `gas_transfer_timeout_secs`.
pub async fn timed_out_gas_transfers(
    store: &dyn MetadataStore,
    config: &LedgerConfig,
    status: GasTransferStatus,
) -> MetadataResult<Vec<TreasureClaimRow>> {
    let older_than = LedgerConfig::stale_threshold(config.gas_transfer_timeout_secs);
    store.get_stale_gas_transfers(status, older_than).await
}

/// Rows removed by [`purge_completed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub settlements: u64,
    pub treasures: u64,
    pub claims: u64,
}

impl PurgeCounts {
    pub fn total(&self) -> u64 {
        self.settlements + self.treasures + self.claims
    }
}

/// Delete every ledger record in its terminal success status.
#[instrument(skip(store))]
pub async fn purge_completed(store: &dyn MetadataStore) -> MetadataResult<PurgeCounts> {
    let counts = PurgeCounts {
        settlements: store.delete_completed_settlements().await?,
        treasures: store.delete_buried_treasures().await?,
        claims: store.delete_completed_claims().await?,
    };
    if counts.total() > 0 {
        info!(
            settlements = counts.settlements,
            treasures = counts.treasures,
            claims = counts.claims,
            "Purged completed ledger records"
        );
    }
    Ok(counts)
}
