// Ledger state machine tests
// Covers status queries, staleness thresholds, compare-and-set transitions
// and idempotent cleanup for settlements, burials and claims

mod common;

use brokernode_core::config::LedgerConfig;
use brokernode_core::{ClaimPrlStatus, GasTransferStatus, PaymentStatus, PrlStatus, SessionType};
use brokernode_metadata::MetadataError;
use brokernode_metadata::sweep::{self, PurgeCounts};
use common::{TestCipher, TestMetadata, genesis, new_claim, new_settlement, new_treasure};
use time::{Duration, OffsetDateTime};

#[tokio::test]
async fn test_settlement_query_by_status_without_type_filter() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let now = OffsetDateTime::now_utc();

    let mut pending = new_settlement(&genesis(1), SessionType::Alpha);
    pending.payment_status = Some(PaymentStatus::BetaPending);
    let mut confirmed = new_settlement(&genesis(2), SessionType::Beta);
    confirmed.payment_status = Some(PaymentStatus::BetaConfirmed);

    store
        .create_settlement(&pending.into_row(&TestCipher, now).unwrap())
        .await
        .unwrap();
    store
        .create_settlement(&confirmed.into_row(&TestCipher, now).unwrap())
        .await
        .unwrap();

    let rows = store
        .get_settlements_by_type_and_status(&[], PaymentStatus::BetaPending)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].genesis_hash, genesis(1).to_string());
    assert_eq!(rows[0].payment_status().unwrap(), PaymentStatus::BetaPending);

    let both = store
        .get_settlements_by_type_and_status(
            &[SessionType::Alpha, SessionType::Beta],
            PaymentStatus::BetaPending,
        )
        .await
        .unwrap();
    assert_eq!(both.len(), 1);

    let beta_only = store
        .get_settlements_by_type_and_status(&[SessionType::Beta], PaymentStatus::BetaPending)
        .await
        .unwrap();
    assert!(beta_only.is_empty());
}

#[tokio::test]
async fn test_settlement_defaults_and_key_roundtrip() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();

    let row = new_settlement(&genesis(3), SessionType::Alpha)
        .into_row(&TestCipher, OffsetDateTime::now_utc())
        .unwrap();
    assert_ne!(row.eth_private_key, "settlement-secret");
    store.create_settlement(&row).await.unwrap();

    let stored = store
        .get_settlement(&genesis(3).to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.payment_status().unwrap(), PaymentStatus::AlphaPending);
    assert_eq!(stored.session_type().unwrap(), SessionType::Alpha);
    assert_eq!(
        stored.decrypt_private_key(&TestCipher).unwrap(),
        "settlement-secret"
    );

    let duplicate = store.create_settlement(&row).await;
    assert!(matches!(duplicate, Err(MetadataError::AlreadyExists(_))));
}

#[tokio::test]
async fn test_settlement_rejects_invalid_amount() {
    let mut settlement = new_settlement(&genesis(4), SessionType::Alpha);
    settlement.total_cost = "1.5".to_string();
    assert!(matches!(
        settlement.into_row(&TestCipher, OffsetDateTime::now_utc()),
        Err(MetadataError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_settlement_compare_and_set() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let hash = genesis(5).to_string();
    store
        .create_settlement(
            &new_settlement(&genesis(5), SessionType::Alpha)
                .into_row(&TestCipher, OffsetDateTime::now_utc())
                .unwrap(),
        )
        .await
        .unwrap();

    store
        .transition_settlement(&hash, PaymentStatus::AlphaPending, PaymentStatus::AlphaConfirmed)
        .await
        .unwrap();

    // Stale expectation of the current status.
    let stale = store
        .transition_settlement(&hash, PaymentStatus::AlphaPending, PaymentStatus::AlphaConfirmed)
        .await;
    match stale {
        Err(MetadataError::InvalidStateTransition { from, .. }) => {
            assert!(from.starts_with("AlphaConfirmed"));
        }
        other => panic!("expected InvalidStateTransition, got {other:?}"),
    }

    // Undeclared transition.
    let skip = store
        .transition_settlement(&hash, PaymentStatus::AlphaConfirmed, PaymentStatus::BetaConfirmed)
        .await;
    assert!(matches!(
        skip,
        Err(MetadataError::InvalidStateTransition { .. })
    ));

    let missing = store
        .transition_settlement(
            &genesis(99).to_string(),
            PaymentStatus::AlphaPending,
            PaymentStatus::AlphaConfirmed,
        )
        .await;
    assert!(matches!(missing, Err(MetadataError::NotFound(_))));
}

#[tokio::test]
async fn test_settlement_error_and_recovery() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let hash = genesis(6).to_string();
    let mut settlement = new_settlement(&genesis(6), SessionType::Beta);
    settlement.payment_status = Some(PaymentStatus::GasPending);
    store
        .create_settlement(&settlement.into_row(&TestCipher, OffsetDateTime::now_utc()).unwrap())
        .await
        .unwrap();

    store
        .transition_settlement(&hash, PaymentStatus::GasPending, PaymentStatus::GasError)
        .await
        .unwrap();
    let errored = store
        .get_settlements_by_status(PaymentStatus::GasError)
        .await
        .unwrap();
    assert_eq!(errored.len(), 1);

    store
        .transition_settlement(&hash, PaymentStatus::GasError, PaymentStatus::GasPending)
        .await
        .unwrap();
    let stored = store.get_settlement(&hash).await.unwrap().unwrap();
    assert_eq!(stored.payment_status().unwrap(), PaymentStatus::GasPending);
}

#[tokio::test]
async fn test_claim_gas_timeout_threshold() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let now = OffsetDateTime::now_utc();

    let mut claim = new_claim(&genesis(7), 0);
    claim.gas_status = Some(GasTransferStatus::Processing);
    let mut row = claim.into_row(&TestCipher, now).unwrap();
    row.updated_at = now - Duration::minutes(5);
    store.create_claim(&row).await.unwrap();

    let before = store
        .get_stale_gas_transfers(GasTransferStatus::Processing, now - Duration::minutes(1))
        .await
        .unwrap();
    assert!(before.is_empty());

    let after = store
        .get_stale_gas_transfers(
            GasTransferStatus::Processing,
            OffsetDateTime::now_utc() + Duration::minutes(1),
        )
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].claim_id, row.claim_id);
}

#[tokio::test]
async fn test_stale_query_requires_in_flight_status() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let now = OffsetDateTime::now_utc();

    assert!(matches!(
        store
            .get_stale_settlements(PaymentStatus::BetaConfirmed, now)
            .await,
        Err(MetadataError::InvalidInput(_))
    ));
    assert!(matches!(
        store.get_stale_treasures(PrlStatus::BuryError, now).await,
        Err(MetadataError::InvalidInput(_))
    ));
    assert!(matches!(
        store
            .get_stale_prl_claims(ClaimPrlStatus::Success, now)
            .await,
        Err(MetadataError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_claim_tracks_are_independent() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let row = new_claim(&genesis(8), 2)
        .into_row(&TestCipher, OffsetDateTime::now_utc())
        .unwrap();
    store.create_claim(&row).await.unwrap();

    store
        .transition_claim_prl(row.claim_id, ClaimPrlStatus::NotStarted, ClaimPrlStatus::Processing)
        .await
        .unwrap();
    store
        .transition_claim_prl(row.claim_id, ClaimPrlStatus::Processing, ClaimPrlStatus::Success)
        .await
        .unwrap();

    let claim = store
        .get_claim(&genesis(8).to_string(), 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claim.claim_prl_status().unwrap(), ClaimPrlStatus::Success);
    assert_eq!(claim.gas_status().unwrap(), GasTransferStatus::NotStarted);
    assert!(!claim.is_resolved());
    assert!(!claim.claim_clock_started());
    assert_eq!(claim.decrypt_private_key(&TestCipher).unwrap(), "claim-secret");

    for (from, to) in [
        (GasTransferStatus::NotStarted, GasTransferStatus::Processing),
        (GasTransferStatus::Processing, GasTransferStatus::Error),
        (GasTransferStatus::Error, GasTransferStatus::Processing),
        (GasTransferStatus::Processing, GasTransferStatus::Success),
        (GasTransferStatus::Success, GasTransferStatus::LeftoversReclaimProcessing),
        (
            GasTransferStatus::LeftoversReclaimProcessing,
            GasTransferStatus::LeftoversReclaimSuccess,
        ),
    ] {
        store.transition_claim_gas(row.claim_id, from, to).await.unwrap();
    }

    let claim = store
        .get_claim(&genesis(8).to_string(), 2)
        .await
        .unwrap()
        .unwrap();
    assert!(claim.is_resolved());
}

#[tokio::test]
async fn test_claim_clock_starts_once() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let row = new_claim(&genesis(9), 0)
        .into_row(&TestCipher, OffsetDateTime::now_utc())
        .unwrap();
    store.create_claim(&row).await.unwrap();

    assert!(store.start_claim_clock(row.claim_id, 1_700_000_000).await.unwrap());
    assert!(!store.start_claim_clock(row.claim_id, 1_800_000_000).await.unwrap());

    let claim = store
        .get_claim(&genesis(9).to_string(), 0)
        .await
        .unwrap()
        .unwrap();
    assert!(claim.claim_clock_started());
    assert_eq!(claim.starting_claim_clock, 1_700_000_000);

    assert!(matches!(
        store.start_claim_clock(uuid::Uuid::new_v4(), 1).await,
        Err(MetadataError::NotFound(_))
    ));
    assert!(matches!(
        store.start_claim_clock(row.claim_id, -5).await,
        Err(MetadataError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_duplicate_claim_for_sector() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let now = OffsetDateTime::now_utc();
    store
        .create_claim(&new_claim(&genesis(10), 1).into_row(&TestCipher, now).unwrap())
        .await
        .unwrap();
    let duplicate = store
        .create_claim(&new_claim(&genesis(10), 1).into_row(&TestCipher, now).unwrap())
        .await;
    assert!(matches!(duplicate, Err(MetadataError::AlreadyExists(_))));
}

#[tokio::test]
async fn test_treasure_burial_lifecycle() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let now = OffsetDateTime::now_utc();

    let rows: Vec<_> = (0..3)
        .map(|sector| new_treasure(&genesis(11), sector).into_row(&TestCipher, now).unwrap())
        .collect();
    assert_eq!(store.create_treasures(&rows).await.unwrap(), 3);

    let treasures = store
        .get_treasures_for_upload(&genesis(11).to_string())
        .await
        .unwrap();
    assert_eq!(
        treasures.iter().map(|t| t.sector_idx).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(
        treasures[1].decrypt_private_key(&TestCipher).unwrap(),
        "treasure-secret-1"
    );

    let id = rows[0].treasure_id;
    let steps = [
        PrlStatus::Waiting,
        PrlStatus::Pending,
        PrlStatus::Confirmed,
        PrlStatus::GasPending,
        PrlStatus::GasConfirmed,
        PrlStatus::BuryPending,
        PrlStatus::BuryConfirmed,
    ];
    for pair in steps.windows(2) {
        store.transition_treasure(id, pair[0], pair[1]).await.unwrap();
    }

    let waiting = store
        .get_treasures_by_status(PrlStatus::Waiting)
        .await
        .unwrap();
    assert_eq!(waiting.len(), 2);

    let buried = store.get_treasure(id).await.unwrap().unwrap();
    assert_eq!(buried.prl_status().unwrap(), PrlStatus::BuryConfirmed);

    assert_eq!(store.delete_buried_treasures().await.unwrap(), 1);
    assert_eq!(store.delete_buried_treasures().await.unwrap(), 0);
    assert!(store.get_treasure(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_treasure_rejects_negative_sector() {
    assert!(matches!(
        new_treasure(&genesis(12), -1).into_row(&TestCipher, OffsetDateTime::now_utc()),
        Err(MetadataError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_claim_rejects_negative_sector_and_chunk_count() {
    let now = OffsetDateTime::now_utc();
    assert!(matches!(
        new_claim(&genesis(12), -1).into_row(&TestCipher, now),
        Err(MetadataError::InvalidInput(_))
    ));

    let mut claim = new_claim(&genesis(12), 0);
    claim.num_chunks = -1;
    assert!(matches!(
        claim.into_row(&TestCipher, now),
        Err(MetadataError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_purge_completed_is_idempotent() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let now = OffsetDateTime::now_utc();

    let mut done = new_settlement(&genesis(13), SessionType::Alpha);
    done.payment_status = Some(PaymentStatus::BetaConfirmed);
    store
        .create_settlement(&done.into_row(&TestCipher, now).unwrap())
        .await
        .unwrap();
    store
        .create_settlement(
            &new_settlement(&genesis(14), SessionType::Alpha)
                .into_row(&TestCipher, now)
                .unwrap(),
        )
        .await
        .unwrap();

    let mut treasure = new_treasure(&genesis(13), 0);
    treasure.prl_status = Some(PrlStatus::BuryConfirmed);
    store
        .create_treasures(&[treasure.into_row(&TestCipher, now).unwrap()])
        .await
        .unwrap();

    let mut claim = new_claim(&genesis(13), 0);
    claim.gas_status = Some(GasTransferStatus::LeftoversReclaimSuccess);
    store
        .create_claim(&claim.into_row(&TestCipher, now).unwrap())
        .await
        .unwrap();

    let first = sweep::purge_completed(store.as_ref()).await.unwrap();
    assert_eq!(
        first,
        PurgeCounts {
            settlements: 1,
            treasures: 1,
            claims: 1,
        }
    );
    let second = sweep::purge_completed(store.as_ref()).await.unwrap();
    assert_eq!(second.total(), 0);

    assert!(
        store
            .get_settlement(&genesis(14).to_string())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_timed_out_queries_use_configured_timeouts() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let now = OffsetDateTime::now_utc();

    let mut settlement = new_settlement(&genesis(15), SessionType::Alpha);
    settlement.payment_status = Some(PaymentStatus::GasPending);
    store
        .create_settlement(&settlement.into_row(&TestCipher, now).unwrap())
        .await
        .unwrap();
    let mut treasure = new_treasure(&genesis(15), 0);
    treasure.prl_status = Some(PrlStatus::BuryPending);
    store
        .create_treasures(&[treasure.into_row(&TestCipher, now).unwrap()])
        .await
        .unwrap();
    let mut claim = new_claim(&genesis(15), 0);
    claim.claim_prl_status = Some(ClaimPrlStatus::Processing);
    store
        .create_claim(&claim.into_row(&TestCipher, now).unwrap())
        .await
        .unwrap();

    let patient = LedgerConfig::default();
    assert!(
        sweep::timed_out_settlements(store.as_ref(), &patient, PaymentStatus::GasPending)
            .await
            .unwrap()
            .is_empty()
    );

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let impatient = LedgerConfig {
        settlement_timeout_secs: 1,
        bury_timeout_secs: 1,
        claim_timeout_secs: 1,
        gas_transfer_timeout_secs: 1,
        ..LedgerConfig::default()
    };
    assert_eq!(
        sweep::timed_out_settlements(store.as_ref(), &impatient, PaymentStatus::GasPending)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        sweep::timed_out_burials(store.as_ref(), &impatient, PrlStatus::BuryPending)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        sweep::timed_out_prl_claims(store.as_ref(), &impatient, ClaimPrlStatus::Processing)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(
        sweep::timed_out_gas_transfers(store.as_ref(), &impatient, GasTransferStatus::Processing)
            .await
            .unwrap()
            .is_empty()
    );
}
