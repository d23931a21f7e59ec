use brokernode_cache::CacheRegistry;
use brokernode_core::config::{CacheConfig, CacheMode};
use brokernode_core::hashchain::{ChunkDigest, HashChain};
use tempfile::TempDir;

pub const PREFIX: &str = "broker";

pub const GENESIS: &str = "0c2dd6c05db873553340c8c62aa11ee1bf7634699a1ad6b05e26eab34156bb75";

/// Registry over a temporary directory that is removed on drop.
pub struct TestCache {
    pub registry: CacheRegistry,
    _dir: TempDir,
}

impl TestCache {
    /// Test-mode registry with default transaction limits.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let registry = CacheRegistry::new(CacheConfig::for_testing(dir.path())).unwrap();
        Self {
            registry,
            _dir: dir,
        }
    }

    /// Production-mode registry so caller TTLs apply, with small transactions.
    #[allow(dead_code)]
    pub fn with_limits(max_txn_entries: usize, max_txn_bytes: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            mode: CacheMode::Production,
            root_dir: dir.path().to_path_buf(),
            max_txn_entries,
            max_txn_bytes,
            ..CacheConfig::default()
        };
        let registry = CacheRegistry::new(config).unwrap();
        Self {
            registry,
            _dir: dir,
        }
    }
}

/// First `n` digests of the hash chain seeded by [`GENESIS`].
#[allow(dead_code)]
pub fn digests(n: usize) -> Vec<ChunkDigest> {
    HashChain::new(GENESIS)
        .take(n)
        .map(|d| d.unwrap())
        .collect()
}
