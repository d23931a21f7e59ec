//! Batched multi-row inserts with bounded retry.
//!
//! Rows are partitioned into fixed-size batches. Each batch becomes one
//! multi-row `INSERT`, with an `ON CONFLICT ... DO UPDATE` clause when
//! conflict columns are given. A failing batch is retried with a fixed
//! delay; once the attempts are exhausted the error is returned and the
//! remaining batches are not written.

use crate::error::{MetadataError, MetadataResult};
use brokernode_core::config::LedgerConfig;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Query type rows bind their values into.
pub type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Upper bound on bound parameters per statement.
const MAX_BIND_PARAMS: usize = 32_766;

/// A row that can be written by [`BatchWriter`].
pub trait BatchRow: Send + Sync {
    /// Bind this row's values, in column order.
    fn push_binds<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;
}

/// Writes rows in fixed-size batches.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    batch_size: usize,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Default for BatchWriter {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl BatchWriter {
    pub fn new(batch_size: usize, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.batch_size,
            config.retry_attempts,
            config.retry_delay(),
        )
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Insert `rows` into `table`, updating non-conflict columns on conflict.
    ///
    /// With empty `conflict_columns` the statement is a plain insert. Returns
    /// the number of rows affected.
    #[instrument(skip(self, pool, columns, conflict_columns, rows), fields(rows = rows.len()))]
    pub async fn batch_upsert<R: BatchRow>(
        &self,
        pool: &Pool<Sqlite>,
        table: &str,
        columns: &[&str],
        conflict_columns: &[&str],
        rows: &[R],
    ) -> MetadataResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut affected = 0;
        for (batch_idx, batch) in rows.chunks(self.batch_size).enumerate() {
            let sql = build_upsert_sql(table, columns, conflict_columns, batch.len())?;
            affected += self.execute_with_retry(pool, table, batch_idx, &sql, batch).await?;
        }

        debug!(table, affected, "Batch upsert complete");
        Ok(affected)
    }

    async fn execute_with_retry<R: BatchRow>(
        &self,
        pool: &Pool<Sqlite>,
        table: &str,
        batch_idx: usize,
        sql: &str,
        batch: &[R],
    ) -> MetadataResult<u64> {
        let mut attempt = 1;
        loop {
            let query = batch
                .iter()
                .fold(sqlx::query(sql), |query, row| row.push_binds(query));

            match query.execute(pool).await {
                Ok(result) => return Ok(result.rows_affected()),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        table,
                        batch = batch_idx,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Batch insert failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        table,
                        batch = batch_idx,
                        attempts = attempt,
                        error = %e,
                        "Batch insert failed, giving up"
                    );
                    return Err(MetadataError::RetriesExhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}

fn validate_identifier(ident: &str) -> MetadataResult<()> {
    let mut bytes = ident.bytes();
    let valid = match bytes.next() {
        Some(first) => {
            (first.is_ascii_lowercase() || first == b'_')
                && bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        }
        None => false,
    };
    if !valid {
        return Err(MetadataError::InvalidInput(format!(
            "invalid SQL identifier: {ident:?}"
        )));
    }
    Ok(())
}

/// Build the statement for one batch of `row_count` rows.
fn build_upsert_sql(
    table: &str,
    columns: &[&str],
    conflict_columns: &[&str],
    row_count: usize,
) -> MetadataResult<String> {
    validate_identifier(table)?;
    if columns.is_empty() {
        return Err(MetadataError::InvalidInput("no columns given".to_string()));
    }
    for column in columns.iter().chain(conflict_columns) {
        validate_identifier(column)?;
    }
    if let Some(missing) = conflict_columns.iter().find(|c| !columns.contains(*c)) {
        return Err(MetadataError::InvalidInput(format!(
            "conflict column {missing} is not an inserted column"
        )));
    }
    if columns.len() * row_count > MAX_BIND_PARAMS {
        return Err(MetadataError::InvalidInput(format!(
            "batch of {row_count} rows x {} columns exceeds the parameter limit",
            columns.len()
        )));
    }

    let row_placeholder = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![row_placeholder.as_str(); row_count].join(", ");
    let mut sql = format!(
        "INSERT INTO {table} ({}) VALUES {values}",
        columns.join(", ")
    );

    if !conflict_columns.is_empty() {
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !conflict_columns.contains(*c))
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        sql.push_str(&format!(" ON CONFLICT({}) ", conflict_columns.join(", ")));
        if updates.is_empty() {
            sql.push_str("DO NOTHING");
        } else {
            sql.push_str("DO UPDATE SET ");
            sql.push_str(&updates.join(", "));
        }
    }

    Ok(sql)
}
