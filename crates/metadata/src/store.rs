//! Metadata store trait and SQLite implementation.

use crate::batch::BatchWriter;
use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    BurialRepo, ChunkRepo, ClaimRepo, GenesisHashRepo, SessionRepo, SettlementRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    SessionRepo
    + ChunkRepo
    + SettlementRepo
    + BurialRepo
    + ClaimRepo
    + GenesisHashRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    batch: BatchWriter,
    settlement_enabled: bool,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600); // 10 minutes default

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection keeps writers serialized and `:memory:` databases alive.
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            batch: BatchWriter::default(),
            settlement_enabled: false,
        };
        store.migrate().await?;

        tracing::debug!(
            path = %path.display(),
            query_timeout_secs,
            "Opened SQLite metadata store (query timeout is advisory only)"
        );

        Ok(store)
    }

    /// Replace the batch writer used for bulk inserts.
    pub fn with_batch_writer(mut self, batch: BatchWriter) -> Self {
        self.batch = batch;
        self
    }

    /// Accept settlement records alongside new upload sessions.
    pub fn with_settlement_enabled(mut self, enabled: bool) -> Self {
        self.settlement_enabled = enabled;
        self
    }

    pub fn settlement_enabled(&self) -> bool {
        self.settlement_enabled
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::batch::SqliteQuery;
    use crate::models::*;
    use brokernode_core::hashchain::HashChain;
    use brokernode_core::sector;
    use brokernode_core::{
        ChunkStatus, ClaimPrlStatus, GasTransferStatus, GenesisHash, GenesisHashStatus,
        LedgerStatus, PaymentStatus, PrlStatus, SessionType, StatusKind,
    };
    use std::fmt;
    use time::OffsetDateTime;
    use tracing::{debug, info, warn};
    use uuid::Uuid;

    /// SQLite has a limit on bound parameters, so IN clauses are batched.
    const IN_CLAUSE_BATCH_SIZE: usize = 900;

    /// Data map rows generated per batch writer call.
    const DATA_MAP_WINDOW: usize = 10_000;

    /// Primary key of a ledger record.
    #[derive(Clone, Copy)]
    enum RecordKey<'a> {
        Text(&'a str),
        Uuid(Uuid),
    }

    impl<'a> RecordKey<'a> {
        fn bind<'q>(self, query: SqliteQuery<'q>) -> SqliteQuery<'q>
        where
            'a: 'q,
        {
            match self {
                Self::Text(s) => query.bind(s),
                Self::Uuid(id) => query.bind(id),
            }
        }
    }

    impl fmt::Display for RecordKey<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Text(s) => f.write_str(s),
                Self::Uuid(id) => write!(f, "{id}"),
            }
        }
    }

    /// Staleness queries only make sense for statuses a worker is still driving.
    fn require_in_flight<S: LedgerStatus + fmt::Display>(status: S) -> MetadataResult<()> {
        if status.kind() != StatusKind::Forward {
            return Err(MetadataError::InvalidInput(format!(
                "{status} is not an in-flight {}",
                S::FAMILY
            )));
        }
        Ok(())
    }

    fn unique_violation(e: sqlx::Error, what: impl FnOnce() -> String) -> MetadataError {
        if let sqlx::Error::Database(db) = &e
            && db.is_unique_violation()
        {
            return MetadataError::AlreadyExists(what());
        }
        e.into()
    }

    fn encode_map(offsets: &[i64]) -> Option<String> {
        if offsets.is_empty() {
            None
        } else {
            Some(sector::encode_offsets(offsets))
        }
    }

    fn settlement_insert(row: &SettlementRow, now: OffsetDateTime) -> SqliteQuery<'_> {
        sqlx::query(
            r#"
            INSERT INTO settlements (
                genesis_hash, session_type, eth_addr_alpha, eth_addr_beta,
                eth_private_key, total_cost, payment_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.genesis_hash)
        .bind(&row.session_type)
        .bind(&row.eth_addr_alpha)
        .bind(&row.eth_addr_beta)
        .bind(&row.eth_private_key)
        .bind(&row.total_cost)
        .bind(row.payment_status)
        .bind(row.created_at)
        .bind(now)
    }

    impl SqliteStore {
        /// Compare-and-set a status column, stamping `updated_at`.
        async fn compare_and_set<S: LedgerStatus + fmt::Display>(
            &self,
            table: &'static str,
            key_column: &'static str,
            key: RecordKey<'_>,
            status_column: &'static str,
            from: S,
            to: S,
        ) -> MetadataResult<()> {
            if !from.can_transition_to(to) {
                return Err(MetadataError::transition(from, to));
            }

            let sql = format!(
                "UPDATE {table} SET {status_column} = ?, updated_at = ? \
                 WHERE {key_column} = ? AND {status_column} = ?"
            );
            let query = sqlx::query(&sql)
                .bind(to.code())
                .bind(OffsetDateTime::now_utc());
            let result = key.bind(query).bind(from.code()).execute(&self.pool).await?;

            if result.rows_affected() > 0 {
                debug!(table, key = %key, %from, %to, "Status transition");
                return Ok(());
            }

            let sql = format!("SELECT {status_column} FROM {table} WHERE {key_column} = ?");
            let current: Option<i32> = key
                .bind(sqlx::query(&sql))
                .fetch_optional(&self.pool)
                .await?
                .map(|row| sqlx::Row::try_get(&row, 0))
                .transpose()?;

            match current {
                None => Err(MetadataError::NotFound(format!("{table} record {key}"))),
                Some(code) => Err(MetadataError::transition(S::from_code(code)?, to)),
            }
        }
    }

    // =========================================================================
    // Upload sessions
    // =========================================================================

    #[async_trait]
    impl SessionRepo for SqliteStore {
        async fn create_session(
            &self,
            session: &UploadSessionRow,
            settlement: Option<&SettlementRow>,
        ) -> MetadataResult<()> {
            if settlement.is_some() && !self.settlement_enabled {
                return Err(MetadataError::InvalidInput(format!(
                    "settlement given for session {} but settlement is disabled",
                    session.genesis_hash
                )));
            }
            if let Some(settlement) = settlement
                && settlement.genesis_hash != session.genesis_hash
            {
                return Err(MetadataError::InvalidInput(format!(
                    "settlement {} does not belong to session {}",
                    settlement.genesis_hash, session.genesis_hash
                )));
            }

            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                INSERT INTO upload_sessions (
                    genesis_hash, session_type, file_size_bytes, num_chunks,
                    storage_length_years, alpha_treasure_map, beta_treasure_map,
                    treasure_map, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&session.genesis_hash)
            .bind(&session.session_type)
            .bind(session.file_size_bytes)
            .bind(session.num_chunks)
            .bind(session.storage_length_years)
            .bind(&session.alpha_treasure_map)
            .bind(&session.beta_treasure_map)
            .bind(&session.treasure_map)
            .bind(session.created_at)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                unique_violation(e, || format!("upload session {}", session.genesis_hash))
            })?;

            if let Some(settlement) = settlement {
                settlement_insert(settlement, now)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        unique_violation(e, || format!("settlement {}", settlement.genesis_hash))
                    })?;
            }

            tx.commit().await?;
            info!(
                genesis_hash = %session.genesis_hash,
                with_settlement = settlement.is_some(),
                "Created upload session"
            );
            Ok(())
        }

        async fn get_session(&self, genesis_hash: &str) -> MetadataResult<Option<UploadSessionRow>> {
            let row = sqlx::query_as::<_, UploadSessionRow>(
                "SELECT * FROM upload_sessions WHERE genesis_hash = ?",
            )
            .bind(genesis_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn set_treasure_maps(
            &self,
            genesis_hash: &str,
            alpha: &[i64],
            beta: &[i64],
        ) -> MetadataResult<Option<Vec<i64>>> {
            let merged = match sector::merge_offset_maps(alpha, beta) {
                Ok(merged) => Some(merged),
                Err(e) => {
                    warn!(genesis_hash, error = %e, "Treasure maps not merged");
                    None
                }
            };

            let result = sqlx::query(
                r#"
                UPDATE upload_sessions
                SET alpha_treasure_map = ?, beta_treasure_map = ?, treasure_map = ?, updated_at = ?
                WHERE genesis_hash = ?
                "#,
            )
            .bind(encode_map(alpha))
            .bind(encode_map(beta))
            .bind(merged.as_deref().and_then(encode_map))
            .bind(OffsetDateTime::now_utc())
            .bind(genesis_hash)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "upload session {genesis_hash}"
                )));
            }
            Ok(merged)
        }

        async fn get_treasure_offsets(&self, genesis_hash: &str) -> MetadataResult<Vec<i64>> {
            let session = self.get_session(genesis_hash).await?.ok_or_else(|| {
                MetadataError::NotFound(format!("upload session {genesis_hash}"))
            })?;
            Ok(session.treasure_offsets())
        }

        async fn delete_session(&self, genesis_hash: &str) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM upload_sessions WHERE genesis_hash = ?")
                .bind(genesis_hash)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    // =========================================================================
    // Data maps
    // =========================================================================

    #[async_trait]
    impl ChunkRepo for SqliteStore {
        async fn create_data_maps(
            &self,
            genesis_hash: &GenesisHash,
            total_chunks: i64,
        ) -> MetadataResult<u64> {
            let total = usize::try_from(total_chunks).map_err(|_| {
                MetadataError::InvalidInput(format!("negative chunk count: {total_chunks}"))
            })?;

            let now = OffsetDateTime::now_utc();
            let mut chain = HashChain::new(genesis_hash.as_str()).take(total);
            let mut affected = 0;

            loop {
                let rows = chain
                    .by_ref()
                    .take(DATA_MAP_WINDOW)
                    .map(|digest| digest.map(|d| DataMapRow::from_digest(genesis_hash, d, now)))
                    .collect::<Result<Vec<_>, _>>()?;
                if rows.is_empty() {
                    break;
                }
                affected += self
                    .batch
                    .batch_upsert(
                        &self.pool,
                        "data_maps",
                        DataMapRow::COLUMNS,
                        DataMapRow::CONFLICT_COLUMNS,
                        &rows,
                    )
                    .await?;
            }

            info!(genesis_hash = %genesis_hash, total_chunks, "Created data maps");
            Ok(affected)
        }

        async fn get_data_maps(
            &self,
            genesis_hash: &str,
            start: i64,
            end: i64,
        ) -> MetadataResult<Vec<DataMapRow>> {
            let rows = sqlx::query_as::<_, DataMapRow>(
                r#"
                SELECT * FROM data_maps
                WHERE genesis_hash = ? AND chunk_idx BETWEEN ? AND ?
                ORDER BY chunk_idx
                "#,
            )
            .bind(genesis_hash)
            .bind(start.min(end))
            .bind(start.max(end))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn attach_messages(
            &self,
            genesis_hash: &str,
            messages: &[(i64, String)],
        ) -> MetadataResult<u64> {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;
            let mut updated = 0;

            for (chunk_idx, message) in messages {
                let result = sqlx::query(
                    r#"
                    UPDATE data_maps SET message = ?, status = ?, updated_at = ?
                    WHERE genesis_hash = ? AND chunk_idx = ?
                    "#,
                )
                .bind(message)
                .bind(ChunkStatus::Unassigned.as_str())
                .bind(now)
                .bind(genesis_hash)
                .bind(chunk_idx)
                .execute(&mut *tx)
                .await?;
                updated += result.rows_affected();
            }

            tx.commit().await?;
            Ok(updated)
        }

        async fn mark_data_maps_complete(
            &self,
            genesis_hash: &str,
            chunk_idxs: &[i64],
        ) -> MetadataResult<u64> {
            let now = OffsetDateTime::now_utc();
            let mut updated = 0;

            for batch in chunk_idxs.chunks(IN_CLAUSE_BATCH_SIZE) {
                let placeholders: Vec<&str> = batch.iter().map(|_| "?").collect();
                let query = format!(
                    "UPDATE data_maps SET status = ?, updated_at = ? \
                     WHERE genesis_hash = ? AND chunk_idx IN ({})",
                    placeholders.join(", ")
                );

                let mut query_builder = sqlx::query(&query)
                    .bind(ChunkStatus::Complete.as_str())
                    .bind(now)
                    .bind(genesis_hash);
                for idx in batch {
                    query_builder = query_builder.bind(idx);
                }
                updated += query_builder.execute(&self.pool).await?.rows_affected();
            }

            Ok(updated)
        }

        async fn count_data_maps_by_status(
            &self,
            genesis_hash: &str,
            status: ChunkStatus,
        ) -> MetadataResult<i64> {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM data_maps WHERE genesis_hash = ? AND status = ?",
            )
            .bind(genesis_hash)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
            Ok(count)
        }

        async fn delete_data_maps(&self, genesis_hash: &str) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM data_maps WHERE genesis_hash = ?")
                .bind(genesis_hash)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }

    // =========================================================================
    // Stored genesis hashes
    // =========================================================================

    #[async_trait]
    impl GenesisHashRepo for SqliteStore {
        async fn add_stored_genesis_hash(&self, row: &StoredGenesisHashRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO stored_genesis_hashes (
                    genesis_hash, file_size_bytes, num_chunks, webnode_count,
                    status, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.genesis_hash)
            .bind(row.file_size_bytes)
            .bind(row.num_chunks)
            .bind(row.webnode_count)
            .bind(&row.status)
            .bind(row.created_at)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await
            .map_err(|e| unique_violation(e, || format!("stored genesis hash {}", row.genesis_hash)))?;
            Ok(())
        }

        async fn get_stored_genesis_hash(
            &self,
            genesis_hash: &str,
        ) -> MetadataResult<Option<StoredGenesisHashRow>> {
            let row = sqlx::query_as::<_, StoredGenesisHashRow>(
                "SELECT * FROM stored_genesis_hashes WHERE genesis_hash = ?",
            )
            .bind(genesis_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn find_oldest_eligible(
            &self,
            webnode_limit: i32,
        ) -> MetadataResult<StoredGenesisHashRow> {
            let row = sqlx::query_as::<_, StoredGenesisHashRow>(
                r#"
                SELECT * FROM stored_genesis_hashes
                WHERE status = ? AND webnode_count < ?
                ORDER BY julianday(created_at) ASC, genesis_hash ASC
                LIMIT 1
                "#,
            )
            .bind(GenesisHashStatus::Unassigned.as_str())
            .bind(webnode_limit)
            .fetch_optional(&self.pool)
            .await?;

            row.ok_or_else(|| {
                MetadataError::NoEligibleRecord(format!(
                    "no unassigned genesis hash with fewer than {webnode_limit} webnodes"
                ))
            })
        }

        async fn increment_webnode_count(&self, genesis_hash: &str) -> MetadataResult<i32> {
            let count: Option<i32> = sqlx::query_scalar(
                r#"
                UPDATE stored_genesis_hashes
                SET webnode_count = webnode_count + 1, updated_at = ?
                WHERE genesis_hash = ?
                RETURNING webnode_count
                "#,
            )
            .bind(OffsetDateTime::now_utc())
            .bind(genesis_hash)
            .fetch_optional(&self.pool)
            .await?;

            count.ok_or_else(|| MetadataError::NotFound(format!("stored genesis hash {genesis_hash}")))
        }

        async fn set_genesis_hash_status(
            &self,
            genesis_hash: &str,
            status: GenesisHashStatus,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE stored_genesis_hashes SET status = ?, updated_at = ? WHERE genesis_hash = ?",
            )
            .bind(status.as_str())
            .bind(OffsetDateTime::now_utc())
            .bind(genesis_hash)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "stored genesis hash {genesis_hash}"
                )));
            }
            Ok(())
        }
    }

    // =========================================================================
    // Settlements
    // =========================================================================

    #[async_trait]
    impl SettlementRepo for SqliteStore {
        async fn create_settlement(&self, settlement: &SettlementRow) -> MetadataResult<()> {
            settlement_insert(settlement, OffsetDateTime::now_utc())
                .execute(&self.pool)
                .await
                .map_err(|e| unique_violation(e, || format!("settlement {}", settlement.genesis_hash)))?;
            Ok(())
        }

        async fn get_settlement(&self, genesis_hash: &str) -> MetadataResult<Option<SettlementRow>> {
            let row = sqlx::query_as::<_, SettlementRow>(
                "SELECT * FROM settlements WHERE genesis_hash = ?",
            )
            .bind(genesis_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_settlements_by_status(
            &self,
            status: PaymentStatus,
        ) -> MetadataResult<Vec<SettlementRow>> {
            let rows = sqlx::query_as::<_, SettlementRow>(
                "SELECT * FROM settlements WHERE payment_status = ? ORDER BY julianday(created_at)",
            )
            .bind(status.code())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_settlements_by_type_and_status(
            &self,
            session_types: &[SessionType],
            status: PaymentStatus,
        ) -> MetadataResult<Vec<SettlementRow>> {
            let has_alpha = session_types.contains(&SessionType::Alpha);
            let has_beta = session_types.contains(&SessionType::Beta);

            let session_type = match (has_alpha, has_beta) {
                (true, false) => SessionType::Alpha,
                (false, true) => SessionType::Beta,
                // No filter, or both types: union across types.
                _ => return self.get_settlements_by_status(status).await,
            };

            let rows = sqlx::query_as::<_, SettlementRow>(
                r#"
                SELECT * FROM settlements
                WHERE session_type = ? AND payment_status = ?
                ORDER BY julianday(created_at)
                "#,
            )
            .bind(session_type.as_str())
            .bind(status.code())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_stale_settlements(
            &self,
            status: PaymentStatus,
            older_than: OffsetDateTime,
        ) -> MetadataResult<Vec<SettlementRow>> {
            require_in_flight(status)?;
            let rows = sqlx::query_as::<_, SettlementRow>(
                r#"
                SELECT * FROM settlements
                WHERE payment_status = ? AND julianday(updated_at) < julianday(?)
                ORDER BY julianday(updated_at)
                "#,
            )
            .bind(status.code())
            .bind(older_than)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn transition_settlement(
            &self,
            genesis_hash: &str,
            from: PaymentStatus,
            to: PaymentStatus,
        ) -> MetadataResult<()> {
            self.compare_and_set(
                "settlements",
                "genesis_hash",
                RecordKey::Text(genesis_hash),
                "payment_status",
                from,
                to,
            )
            .await
        }

        async fn delete_completed_settlements(&self) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM settlements WHERE payment_status = ?")
                .bind(PaymentStatus::BetaConfirmed.code())
                .execute(&self.pool)
                .await?;
            let deleted = result.rows_affected();
            if deleted > 0 {
                info!(deleted, "Deleted completed settlements");
            }
            Ok(deleted)
        }
    }

    // =========================================================================
    // Treasure burials
    // =========================================================================

    #[async_trait]
    impl BurialRepo for SqliteStore {
        async fn create_treasures(&self, treasures: &[TreasureRow]) -> MetadataResult<u64> {
            self.batch
                .batch_upsert(&self.pool, "treasures", TreasureRow::COLUMNS, &[], treasures)
                .await
        }

        async fn get_treasure(&self, treasure_id: Uuid) -> MetadataResult<Option<TreasureRow>> {
            let row =
                sqlx::query_as::<_, TreasureRow>("SELECT * FROM treasures WHERE treasure_id = ?")
                    .bind(treasure_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn get_treasures_for_upload(
            &self,
            genesis_hash: &str,
        ) -> MetadataResult<Vec<TreasureRow>> {
            let rows = sqlx::query_as::<_, TreasureRow>(
                "SELECT * FROM treasures WHERE genesis_hash = ? ORDER BY sector_idx",
            )
            .bind(genesis_hash)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_treasures_by_status(
            &self,
            status: PrlStatus,
        ) -> MetadataResult<Vec<TreasureRow>> {
            let rows = sqlx::query_as::<_, TreasureRow>(
                "SELECT * FROM treasures WHERE prl_status = ? ORDER BY julianday(created_at)",
            )
            .bind(status.code())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_stale_treasures(
            &self,
            status: PrlStatus,
            older_than: OffsetDateTime,
        ) -> MetadataResult<Vec<TreasureRow>> {
            require_in_flight(status)?;
            let rows = sqlx::query_as::<_, TreasureRow>(
                r#"
                SELECT * FROM treasures
                WHERE prl_status = ? AND julianday(updated_at) < julianday(?)
                ORDER BY julianday(updated_at)
                "#,
            )
            .bind(status.code())
            .bind(older_than)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn transition_treasure(
            &self,
            treasure_id: Uuid,
            from: PrlStatus,
            to: PrlStatus,
        ) -> MetadataResult<()> {
            self.compare_and_set(
                "treasures",
                "treasure_id",
                RecordKey::Uuid(treasure_id),
                "prl_status",
                from,
                to,
            )
            .await
        }

        async fn delete_buried_treasures(&self) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM treasures WHERE prl_status = ?")
                .bind(PrlStatus::BuryConfirmed.code())
                .execute(&self.pool)
                .await?;
            let deleted = result.rows_affected();
            if deleted > 0 {
                info!(deleted, "Deleted buried treasures");
            }
            Ok(deleted)
        }
    }

    // =========================================================================
    // Treasure claims
    // =========================================================================

    #[async_trait]
    impl ClaimRepo for SqliteStore {
        async fn create_claim(&self, claim: &TreasureClaimRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO treasure_claims (
                    claim_id, genesis_hash, sector_idx, num_chunks, receiver_eth_addr,
                    treasure_eth_addr, treasure_eth_private_key, starting_claim_clock,
                    claim_prl_status, gas_status, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(claim.claim_id)
            .bind(&claim.genesis_hash)
            .bind(claim.sector_idx)
            .bind(claim.num_chunks)
            .bind(&claim.receiver_eth_addr)
            .bind(&claim.treasure_eth_addr)
            .bind(&claim.treasure_eth_private_key)
            .bind(claim.starting_claim_clock)
            .bind(claim.claim_prl_status)
            .bind(claim.gas_status)
            .bind(claim.created_at)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                unique_violation(e, || {
                    format!("claim for {} sector {}", claim.genesis_hash, claim.sector_idx)
                })
            })?;
            Ok(())
        }

        async fn get_claim(
            &self,
            genesis_hash: &str,
            sector_idx: i64,
        ) -> MetadataResult<Option<TreasureClaimRow>> {
            let row = sqlx::query_as::<_, TreasureClaimRow>(
                "SELECT * FROM treasure_claims WHERE genesis_hash = ? AND sector_idx = ?",
            )
            .bind(genesis_hash)
            .bind(sector_idx)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_claims_by_prl_status(
            &self,
            status: ClaimPrlStatus,
        ) -> MetadataResult<Vec<TreasureClaimRow>> {
            let rows = sqlx::query_as::<_, TreasureClaimRow>(
                "SELECT * FROM treasure_claims WHERE claim_prl_status = ? ORDER BY julianday(created_at)",
            )
            .bind(status.code())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_claims_by_gas_status(
            &self,
            status: GasTransferStatus,
        ) -> MetadataResult<Vec<TreasureClaimRow>> {
            let rows = sqlx::query_as::<_, TreasureClaimRow>(
                "SELECT * FROM treasure_claims WHERE gas_status = ? ORDER BY julianday(created_at)",
            )
            .bind(status.code())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_stale_prl_claims(
            &self,
            status: ClaimPrlStatus,
            older_than: OffsetDateTime,
        ) -> MetadataResult<Vec<TreasureClaimRow>> {
            require_in_flight(status)?;
            let rows = sqlx::query_as::<_, TreasureClaimRow>(
                r#"
                SELECT * FROM treasure_claims
                WHERE claim_prl_status = ? AND julianday(updated_at) < julianday(?)
                ORDER BY julianday(updated_at)
                "#,
            )
            .bind(status.code())
            .bind(older_than)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_stale_gas_transfers(
            &self,
            status: GasTransferStatus,
            older_than: OffsetDateTime,
        ) -> MetadataResult<Vec<TreasureClaimRow>> {
            require_in_flight(status)?;
            let rows = sqlx::query_as::<_, TreasureClaimRow>(
                r#"
                SELECT * FROM treasure_claims
                WHERE gas_status = ? AND julianday(updated_at) < julianday(?)
                ORDER BY julianday(updated_at)
                "#,
            )
            .bind(status.code())
            .bind(older_than)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn transition_claim_prl(
            &self,
            claim_id: Uuid,
            from: ClaimPrlStatus,
            to: ClaimPrlStatus,
        ) -> MetadataResult<()> {
            self.compare_and_set(
                "treasure_claims",
                "claim_id",
                RecordKey::Uuid(claim_id),
                "claim_prl_status",
                from,
                to,
            )
            .await
        }

        async fn transition_claim_gas(
            &self,
            claim_id: Uuid,
            from: GasTransferStatus,
            to: GasTransferStatus,
        ) -> MetadataResult<()> {
            self.compare_and_set(
                "treasure_claims",
                "claim_id",
                RecordKey::Uuid(claim_id),
                "gas_status",
                from,
                to,
            )
            .await
        }

        async fn start_claim_clock(&self, claim_id: Uuid, clock: i64) -> MetadataResult<bool> {
            if clock < 0 {
                return Err(MetadataError::InvalidInput(format!(
                    "claim clock must be non-negative: {clock}"
                )));
            }

            let result = sqlx::query(
                r#"
                UPDATE treasure_claims SET starting_claim_clock = ?, updated_at = ?
                WHERE claim_id = ? AND starting_claim_clock = ?
                "#,
            )
            .bind(clock)
            .bind(OffsetDateTime::now_utc())
            .bind(claim_id)
            .bind(CLAIM_CLOCK_NOT_STARTED)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(true);
            }

            let exists: Option<(i32,)> =
                sqlx::query_as("SELECT 1 FROM treasure_claims WHERE claim_id = ?")
                    .bind(claim_id)
                    .fetch_optional(&self.pool)
                    .await?;
            match exists {
                Some(_) => Ok(false),
                None => Err(MetadataError::NotFound(format!("treasure claim {claim_id}"))),
            }
        }

        async fn delete_completed_claims(&self) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM treasure_claims WHERE gas_status = ?")
                .bind(GasTransferStatus::LeftoversReclaimSuccess.code())
                .execute(&self.pool)
                .await?;
            let deleted = result.rows_affected();
            if deleted > 0 {
                info!(deleted, "Deleted completed treasure claims");
            }
            Ok(deleted)
        }
    }
}

impl std::convert::From<std::io::Error> for crate::MetadataError {
    fn from(e: std::io::Error) -> Self {
        crate::MetadataError::Config(e.to_string())
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
-- Upload sessions, one per genesis hash
CREATE TABLE IF NOT EXISTS upload_sessions (
    genesis_hash TEXT PRIMARY KEY,
    session_type TEXT NOT NULL CHECK (session_type IN ('alpha', 'beta')),
    file_size_bytes INTEGER NOT NULL,
    num_chunks INTEGER NOT NULL,
    storage_length_years INTEGER NOT NULL,
    alpha_treasure_map TEXT,
    beta_treasure_map TEXT,
    -- Merged map; NULL until both candidates are known and agree in length
    treasure_map TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Per-chunk records
CREATE TABLE IF NOT EXISTS data_maps (
    genesis_hash TEXT NOT NULL,
    chunk_idx INTEGER NOT NULL,
    hash TEXT NOT NULL,
    address TEXT NOT NULL,
    message TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (genesis_hash, chunk_idx)
);
CREATE INDEX IF NOT EXISTS idx_data_maps_status ON data_maps(genesis_hash, status);

-- Stored files awaiting webnode allocation
CREATE TABLE IF NOT EXISTS stored_genesis_hashes (
    genesis_hash TEXT PRIMARY KEY,
    file_size_bytes INTEGER NOT NULL,
    num_chunks INTEGER NOT NULL,
    webnode_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'unassigned',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stored_genesis_hashes_eligible
    ON stored_genesis_hashes(status, webnode_count);

-- Broker-to-broker settlements; status code 0 is never valid
CREATE TABLE IF NOT EXISTS settlements (
    genesis_hash TEXT PRIMARY KEY,
    session_type TEXT NOT NULL CHECK (session_type IN ('alpha', 'beta')),
    eth_addr_alpha TEXT NOT NULL,
    eth_addr_beta TEXT NOT NULL,
    eth_private_key TEXT NOT NULL,
    total_cost TEXT NOT NULL,
    payment_status INTEGER NOT NULL CHECK (payment_status <> 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_settlements_status ON settlements(payment_status, session_type);

-- Treasure burials, one per sector
CREATE TABLE IF NOT EXISTS treasures (
    treasure_id BLOB PRIMARY KEY,
    genesis_hash TEXT NOT NULL,
    sector_idx INTEGER NOT NULL,
    eth_addr TEXT NOT NULL,
    eth_private_key TEXT NOT NULL,
    prl_amount TEXT NOT NULL,
    message TEXT NOT NULL,
    address TEXT NOT NULL,
    prl_status INTEGER NOT NULL CHECK (prl_status <> 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(genesis_hash, sector_idx)
);
CREATE INDEX IF NOT EXISTS idx_treasures_status ON treasures(prl_status);

-- Treasure claims; starting_claim_clock is -1 until the clock starts
CREATE TABLE IF NOT EXISTS treasure_claims (
    claim_id BLOB PRIMARY KEY,
    genesis_hash TEXT NOT NULL,
    sector_idx INTEGER NOT NULL,
    num_chunks INTEGER NOT NULL,
    receiver_eth_addr TEXT NOT NULL,
    treasure_eth_addr TEXT NOT NULL,
    treasure_eth_private_key TEXT NOT NULL,
    starting_claim_clock INTEGER NOT NULL DEFAULT -1,
    claim_prl_status INTEGER NOT NULL CHECK (claim_prl_status <> 0),
    gas_status INTEGER NOT NULL CHECK (gas_status <> 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(genesis_hash, sector_idx)
);
CREATE INDEX IF NOT EXISTS idx_treasure_claims_prl ON treasure_claims(claim_prl_status);
CREATE INDEX IF NOT EXISTS idx_treasure_claims_gas ON treasure_claims(gas_status);
"#;
