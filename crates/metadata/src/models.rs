//! Database models mapping to the metadata schema.
//!
//! Records are built through explicit constructors that default their
//! statuses and encrypt private keys before the row exists. Statuses are
//! stored as integer codes; use the typed accessors to read them.

use crate::batch::{BatchRow, SqliteQuery};
use crate::error::{MetadataError, MetadataResult};
use brokernode_core::hashchain::ChunkDigest;
use brokernode_core::sector;
use brokernode_core::status::status_or_initial;
use brokernode_core::{
    ChunkStatus, ClaimPrlStatus, GasTransferStatus, GenesisHash, GenesisHashStatus, KeyCipher,
    LedgerStatus, PaymentStatus, PrlStatus, SessionType, UploadPlan,
};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// `starting_claim_clock` value of a claim whose clock has not started.
pub const CLAIM_CLOCK_NOT_STARTED: i64 = -1;

fn require_non_empty(field: &str, value: &str) -> MetadataResult<()> {
    if value.trim().is_empty() {
        return Err(MetadataError::InvalidInput(format!("{field} is empty")));
    }
    Ok(())
}

/// Amounts are decimal strings of atomic units.
fn require_amount(field: &str, value: &str) -> MetadataResult<()> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MetadataError::InvalidInput(format!(
            "{field} is not a non-negative integer amount: {value:?}"
        )));
    }
    Ok(())
}

// =============================================================================
// Upload sessions
// =============================================================================

/// Upload session record, one per genesis hash.
#[derive(Debug, Clone, FromRow)]
pub struct UploadSessionRow {
    pub genesis_hash: String,
    pub session_type: String,
    pub file_size_bytes: i64,
    /// Total chunks including treasure slots.
    pub num_chunks: i64,
    pub storage_length_years: i32,
    pub alpha_treasure_map: Option<String>,
    pub beta_treasure_map: Option<String>,
    /// Merged treasure map; absent until both candidates are known and agree in length.
    pub treasure_map: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl UploadSessionRow {
    pub fn new(
        plan: &UploadPlan,
        session_type: SessionType,
        storage_length_years: i32,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            genesis_hash: plan.genesis_hash.to_string(),
            session_type: session_type.as_str().to_string(),
            file_size_bytes: plan.file_size_bytes,
            num_chunks: plan.total_chunks,
            storage_length_years,
            alpha_treasure_map: None,
            beta_treasure_map: None,
            treasure_map: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn session_type(&self) -> MetadataResult<SessionType> {
        Ok(SessionType::parse(&self.session_type)?)
    }

    /// Merged treasure offsets, empty when no merged map is stored.
    pub fn treasure_offsets(&self) -> Vec<i64> {
        sector::decode_offsets(self.treasure_map.as_deref())
    }
}

// =============================================================================
// Data maps
// =============================================================================

/// Relational record of one chunk.
#[derive(Debug, Clone, FromRow)]
pub struct DataMapRow {
    pub genesis_hash: String,
    pub chunk_idx: i64,
    pub hash: String,
    pub address: String,
    pub message: Option<String>,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl DataMapRow {
    pub const COLUMNS: &'static [&'static str] = &[
        "genesis_hash",
        "chunk_idx",
        "hash",
        "address",
        "message",
        "status",
        "created_at",
        "updated_at",
    ];

    pub const CONFLICT_COLUMNS: &'static [&'static str] = &["genesis_hash", "chunk_idx"];

    /// Pending record for a chunk of the hash chain.
    pub fn from_digest(genesis_hash: &GenesisHash, digest: ChunkDigest, now: OffsetDateTime) -> Self {
        Self {
            genesis_hash: genesis_hash.to_string(),
            chunk_idx: digest.idx,
            hash: digest.hash,
            address: digest.address,
            message: None,
            status: ChunkStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> MetadataResult<ChunkStatus> {
        Ok(ChunkStatus::parse(&self.status)?)
    }
}

impl BatchRow for DataMapRow {
    fn push_binds<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.genesis_hash)
            .bind(self.chunk_idx)
            .bind(&self.hash)
            .bind(&self.address)
            .bind(&self.message)
            .bind(&self.status)
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}

// =============================================================================
// Stored genesis hashes
// =============================================================================

/// A stored file available for allocation to webnodes.
#[derive(Debug, Clone, FromRow)]
pub struct StoredGenesisHashRow {
    pub genesis_hash: String,
    pub file_size_bytes: i64,
    pub num_chunks: i64,
    pub webnode_count: i32,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl StoredGenesisHashRow {
    pub fn new(plan: &UploadPlan, now: OffsetDateTime) -> Self {
        Self {
            genesis_hash: plan.genesis_hash.to_string(),
            file_size_bytes: plan.file_size_bytes,
            num_chunks: plan.total_chunks,
            webnode_count: 0,
            status: GenesisHashStatus::Unassigned.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Broker-to-broker settlement
// =============================================================================

/// Settlement record, one per genesis hash.
#[derive(Debug, Clone, FromRow)]
pub struct SettlementRow {
    pub genesis_hash: String,
    pub session_type: String,
    pub eth_addr_alpha: String,
    pub eth_addr_beta: String,
    /// Encrypted with the record's genesis hash and creation time.
    pub eth_private_key: String,
    /// Atomic units as a decimal string.
    pub total_cost: String,
    pub payment_status: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Parameters of a settlement before defaulting and encryption.
pub struct NewSettlement {
    pub genesis_hash: GenesisHash,
    pub session_type: SessionType,
    pub eth_addr_alpha: String,
    pub eth_addr_beta: String,
    /// Plaintext private key.
    pub eth_private_key: String,
    pub total_cost: String,
    /// Defaults to the first pending status.
    pub payment_status: Option<PaymentStatus>,
}

impl NewSettlement {
    pub fn into_row(
        self,
        cipher: &dyn KeyCipher,
        now: OffsetDateTime,
    ) -> MetadataResult<SettlementRow> {
        require_non_empty("eth_addr_alpha", &self.eth_addr_alpha)?;
        require_non_empty("eth_addr_beta", &self.eth_addr_beta)?;
        require_non_empty("eth_private_key", &self.eth_private_key)?;
        require_amount("total_cost", &self.total_cost)?;

        let record_id = self.genesis_hash.to_string();
        let eth_private_key = cipher.encrypt(&record_id, now, &self.eth_private_key)?;
        let status = self.payment_status.unwrap_or(PaymentStatus::INITIAL);

        Ok(SettlementRow {
            genesis_hash: record_id,
            session_type: self.session_type.as_str().to_string(),
            eth_addr_alpha: self.eth_addr_alpha,
            eth_addr_beta: self.eth_addr_beta,
            eth_private_key,
            total_cost: self.total_cost,
            payment_status: status.code(),
            created_at: now,
            updated_at: now,
        })
    }
}

impl SettlementRow {
    pub fn payment_status(&self) -> MetadataResult<PaymentStatus> {
        Ok(status_or_initial(Some(self.payment_status))?)
    }

    pub fn session_type(&self) -> MetadataResult<SessionType> {
        Ok(SessionType::parse(&self.session_type)?)
    }

    pub fn decrypt_private_key(&self, cipher: &dyn KeyCipher) -> MetadataResult<String> {
        Ok(cipher.decrypt(&self.genesis_hash, self.created_at, &self.eth_private_key)?)
    }
}

// =============================================================================
// Treasure burial
// =============================================================================

/// Treasure burial record, one per sector of an upload.
#[derive(Debug, Clone, FromRow)]
pub struct TreasureRow {
    pub treasure_id: Uuid,
    pub genesis_hash: String,
    pub sector_idx: i64,
    pub eth_addr: String,
    /// Encrypted with the treasure id and creation time.
    pub eth_private_key: String,
    /// Atomic units as a decimal string.
    pub prl_amount: String,
    pub message: String,
    /// Ledger address the treasure is buried at.
    pub address: String,
    pub prl_status: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Parameters of a treasure burial before defaulting and encryption.
pub struct NewTreasure {
    pub genesis_hash: GenesisHash,
    pub sector_idx: i64,
    pub eth_addr: String,
    /// Plaintext private key.
    pub eth_private_key: String,
    pub prl_amount: String,
    pub message: String,
    pub address: String,
    /// Defaults to `Waiting`.
    pub prl_status: Option<PrlStatus>,
}

impl NewTreasure {
    pub fn into_row(self, cipher: &dyn KeyCipher, now: OffsetDateTime) -> MetadataResult<TreasureRow> {
        require_non_empty("eth_addr", &self.eth_addr)?;
        require_non_empty("eth_private_key", &self.eth_private_key)?;
        require_non_empty("address", &self.address)?;
        require_amount("prl_amount", &self.prl_amount)?;
        if self.sector_idx < 0 {
            return Err(MetadataError::InvalidInput(format!(
                "negative sector index: {}",
                self.sector_idx
            )));
        }

        let treasure_id = Uuid::new_v4();
        let eth_private_key = cipher.encrypt(&treasure_id.to_string(), now, &self.eth_private_key)?;
        let status = self.prl_status.unwrap_or(PrlStatus::INITIAL);

        Ok(TreasureRow {
            treasure_id,
            genesis_hash: self.genesis_hash.to_string(),
            sector_idx: self.sector_idx,
            eth_addr: self.eth_addr,
            eth_private_key,
            prl_amount: self.prl_amount,
            message: self.message,
            address: self.address,
            prl_status: status.code(),
            created_at: now,
            updated_at: now,
        })
    }
}

impl TreasureRow {
    pub const COLUMNS: &'static [&'static str] = &[
        "treasure_id",
        "genesis_hash",
        "sector_idx",
        "eth_addr",
        "eth_private_key",
        "prl_amount",
        "message",
        "address",
        "prl_status",
        "created_at",
        "updated_at",
    ];

    pub fn prl_status(&self) -> MetadataResult<PrlStatus> {
        Ok(status_or_initial(Some(self.prl_status))?)
    }

    pub fn decrypt_private_key(&self, cipher: &dyn KeyCipher) -> MetadataResult<String> {
        Ok(cipher.decrypt(
            &self.treasure_id.to_string(),
            self.created_at,
            &self.eth_private_key,
        )?)
    }
}

impl BatchRow for TreasureRow {
    fn push_binds<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.treasure_id)
            .bind(&self.genesis_hash)
            .bind(self.sector_idx)
            .bind(&self.eth_addr)
            .bind(&self.eth_private_key)
            .bind(&self.prl_amount)
            .bind(&self.message)
            .bind(&self.address)
            .bind(self.prl_status)
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}

// =============================================================================
// Treasure claims
// =============================================================================

/// Claim of a buried treasure by a webnode.
///
/// The PRL transfer and the gas funding progress independently; the claim is
/// resolved once the gas leftovers have been reclaimed.
#[derive(Debug, Clone, FromRow)]
pub struct TreasureClaimRow {
    pub claim_id: Uuid,
    pub genesis_hash: String,
    pub sector_idx: i64,
    pub num_chunks: i64,
    pub receiver_eth_addr: String,
    pub treasure_eth_addr: String,
    /// Encrypted with the claim id and creation time.
    pub treasure_eth_private_key: String,
    /// [`CLAIM_CLOCK_NOT_STARTED`] until the claim clock starts.
    pub starting_claim_clock: i64,
    pub claim_prl_status: i32,
    pub gas_status: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Parameters of a claim before defaulting and encryption.
pub struct NewClaim {
    pub genesis_hash: GenesisHash,
    pub sector_idx: i64,
    pub num_chunks: i64,
    pub receiver_eth_addr: String,
    pub treasure_eth_addr: String,
    /// Plaintext private key.
    pub treasure_eth_private_key: String,
    /// Defaults to `NotStarted`.
    pub claim_prl_status: Option<ClaimPrlStatus>,
    /// Defaults to `NotStarted`.
    pub gas_status: Option<GasTransferStatus>,
}

impl NewClaim {
    pub fn into_row(
        self,
        cipher: &dyn KeyCipher,
        now: OffsetDateTime,
    ) -> MetadataResult<TreasureClaimRow> {
        require_non_empty("receiver_eth_addr", &self.receiver_eth_addr)?;
        require_non_empty("treasure_eth_addr", &self.treasure_eth_addr)?;
        require_non_empty("treasure_eth_private_key", &self.treasure_eth_private_key)?;
        if self.sector_idx < 0 {
            return Err(MetadataError::InvalidInput(format!(
                "negative sector index: {}",
                self.sector_idx
            )));
        }
        if self.num_chunks < 0 {
            return Err(MetadataError::InvalidInput(format!(
                "negative chunk count: {}",
                self.num_chunks
            )));
        }

        let claim_id = Uuid::new_v4();
        let treasure_eth_private_key =
            cipher.encrypt(&claim_id.to_string(), now, &self.treasure_eth_private_key)?;

        Ok(TreasureClaimRow {
            claim_id,
            genesis_hash: self.genesis_hash.to_string(),
            sector_idx: self.sector_idx,
            num_chunks: self.num_chunks,
            receiver_eth_addr: self.receiver_eth_addr,
            treasure_eth_addr: self.treasure_eth_addr,
            treasure_eth_private_key,
            starting_claim_clock: CLAIM_CLOCK_NOT_STARTED,
            claim_prl_status: self
                .claim_prl_status
                .unwrap_or(ClaimPrlStatus::INITIAL)
                .code(),
            gas_status: self.gas_status.unwrap_or(GasTransferStatus::INITIAL).code(),
            created_at: now,
            updated_at: now,
        })
    }
}

impl TreasureClaimRow {
    pub fn claim_prl_status(&self) -> MetadataResult<ClaimPrlStatus> {
        Ok(status_or_initial(Some(self.claim_prl_status))?)
    }

    pub fn gas_status(&self) -> MetadataResult<GasTransferStatus> {
        Ok(status_or_initial(Some(self.gas_status))?)
    }

    pub fn claim_clock_started(&self) -> bool {
        self.starting_claim_clock != CLAIM_CLOCK_NOT_STARTED
    }

    /// Resolved once the gas leftovers have been reclaimed.
    pub fn is_resolved(&self) -> bool {
        self.gas_status == GasTransferStatus::LeftoversReclaimSuccess.code()
    }

    pub fn decrypt_private_key(&self, cipher: &dyn KeyCipher) -> MetadataResult<String> {
        Ok(cipher.decrypt(
            &self.claim_id.to_string(),
            self.created_at,
            &self.treasure_eth_private_key,
        )?)
    }
}
