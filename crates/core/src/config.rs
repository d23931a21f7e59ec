//! Configuration types shared across crates.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BROKERNODE_";

/// Which on-disk root and TTL policy the chunk cache uses.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    #[default]
    Production,
    /// Separate root directory and a fixed short TTL.
    Test,
}

/// Chunk cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub mode: CacheMode,
    /// Root directory for production namespaces.
    #[serde(default = "default_cache_root")]
    pub root_dir: PathBuf,
    /// Root directory for test namespaces.
    #[serde(default = "default_cache_test_root")]
    pub test_root_dir: PathBuf,
    /// TTL applied when a caller does not request one.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// TTL applied to every write in test mode.
    #[serde(default = "default_test_ttl_secs")]
    pub test_ttl_secs: u64,
    /// Encoded size at which a write transaction is committed and a new one started.
    #[serde(default = "default_max_txn_bytes")]
    pub max_txn_bytes: usize,
    /// Entry count at which a write transaction is committed and a new one started.
    #[serde(default = "default_max_txn_entries")]
    pub max_txn_entries: usize,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("./data/cache")
}

fn default_cache_test_root() -> PathBuf {
    PathBuf::from("./data/cache-test")
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 3600 // 7 days
}

fn default_test_ttl_secs() -> u64 {
    180
}

fn default_max_txn_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_max_txn_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::default(),
            root_dir: default_cache_root(),
            test_root_dir: default_cache_test_root(),
            default_ttl_secs: default_ttl_secs(),
            test_ttl_secs: default_test_ttl_secs(),
            max_txn_bytes: default_max_txn_bytes(),
            max_txn_entries: default_max_txn_entries(),
        }
    }
}

impl CacheConfig {
    /// Test-mode configuration rooted at `root`.
    pub fn for_testing(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            mode: CacheMode::Test,
            root_dir: root.join("prod"),
            test_root_dir: root,
            ..Self::default()
        }
    }

    /// Root directory for the configured mode.
    pub fn root(&self) -> &Path {
        match self.mode {
            CacheMode::Production => &self.root_dir,
            CacheMode::Test => &self.test_root_dir,
        }
    }

    /// TTL to apply to a write.
    ///
    /// Test mode always uses the fixed test TTL so correctness tests do not
    /// depend on production expiry windows.
    pub fn ttl(&self, requested: Option<std::time::Duration>) -> std::time::Duration {
        match self.mode {
            CacheMode::Test => std::time::Duration::from_secs(self.test_ttl_secs),
            CacheMode::Production => {
                requested.unwrap_or(std::time::Duration::from_secs(self.default_ttl_secs))
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_txn_bytes == 0 {
            return Err("cache.max_txn_bytes must be greater than 0".to_string());
        }
        if self.max_txn_entries == 0 {
            return Err("cache.max_txn_entries must be greater than 0".to_string());
        }
        if self.default_ttl_secs == 0 || self.test_ttl_secs == 0 {
            return Err("cache TTLs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path, or `:memory:`.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot force-cancel queries).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600) // 10 minutes (advisory only)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

/// Ledger bookkeeping configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Accept broker-to-broker settlement records with new upload sessions.
    #[serde(default)]
    pub settlement_enabled: bool,
    /// Rows per multi-row insert statement.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Attempts per batch before the error is surfaced.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed delay between batch attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Age after which an in-flight settlement is considered stuck.
    #[serde(default = "default_settlement_timeout_secs")]
    pub settlement_timeout_secs: u64,
    /// Age after which an in-flight burial is considered stuck.
    #[serde(default = "default_bury_timeout_secs")]
    pub bury_timeout_secs: u64,
    /// Age after which a processing PRL claim is considered stuck.
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,
    /// Age after which a processing gas transfer is considered stuck.
    #[serde(default = "default_gas_transfer_timeout_secs")]
    pub gas_transfer_timeout_secs: u64,
}

fn default_batch_size() -> usize {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_settlement_timeout_secs() -> u64 {
    3600
}

fn default_bury_timeout_secs() -> u64 {
    3600
}

fn default_claim_timeout_secs() -> u64 {
    3600
}

fn default_gas_transfer_timeout_secs() -> u64 {
    1800
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            settlement_enabled: false,
            batch_size: default_batch_size(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            settlement_timeout_secs: default_settlement_timeout_secs(),
            bury_timeout_secs: default_bury_timeout_secs(),
            claim_timeout_secs: default_claim_timeout_secs(),
            gas_transfer_timeout_secs: default_gas_transfer_timeout_secs(),
        }
    }
}

impl LedgerConfig {
    pub fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_ms)
    }

    /// Records still in flight and last updated before the returned instant
    /// have exceeded `timeout_secs`.
    pub fn stale_threshold(timeout_secs: u64) -> OffsetDateTime {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(timeout_secs).unwrap_or(i64::MAX);
        OffsetDateTime::now_utc().saturating_sub(Duration::seconds(secs))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("ledger.batch_size must be greater than 0".to_string());
        }
        if self.retry_attempts == 0 {
            return Err("ledger.retry_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Load configuration from an optional TOML file, overridden by
    /// `BROKERNODE_`-prefixed environment variables (`__` separates sections,
    /// e.g. `BROKERNODE_CACHE__MODE=test`).
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut figment = Figment::new();

        match path {
            Some(path) if path.exists() => {
                tracing::info!(config_path = %path.display(), "Loading configuration from file");
                figment = figment.merge(Toml::file(path));
            }
            Some(path) => {
                tracing::debug!("No config file found at {}", path.display());
            }
            None => {}
        }

        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| crate::Error::Config(e.to_string()))?;

        config.validate().map_err(crate::Error::Config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate()?;
        self.ledger.validate()
    }
}
