//! Namespaced embedded chunk cache for the brokernode.
//!
//! This crate provides:
//! - One embedded database per `(prefix, genesis hash, category)` namespace
//! - Batch reads and writes with per-value TTL
//! - Write transactions that split and continue when they grow too large
//! - Chunk payload lookup across the hash and message namespaces

pub mod chunk;
pub mod error;
pub mod keys;
pub mod namespace;
pub mod registry;

pub use brokernode_core::chunk::{ChunkData, all_chunk_data_has_arrived};
pub use error::{CacheError, CacheResult};
pub use keys::{Category, chunk_key, generate_bulk_keys, namespace_name};
pub use namespace::Namespace;
pub use registry::CacheRegistry;

use brokernode_core::config::CacheConfig;
use std::sync::Arc;

/// Create a cache registry from configuration.
pub fn from_config(config: &CacheConfig) -> CacheResult<Arc<CacheRegistry>> {
    Ok(Arc::new(CacheRegistry::new(config.clone())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokernode_core::config::CacheMode;
    use tempfile::tempdir;

    #[test]
    fn from_config_uses_mode_root() {
        let temp = tempdir().unwrap();
        let config = CacheConfig {
            mode: CacheMode::Test,
            test_root_dir: temp.path().join("cache-test"),
            ..CacheConfig::default()
        };

        let registry = from_config(&config).unwrap();
        assert_eq!(registry.root(), temp.path().join("cache-test"));
        assert!(registry.root().is_dir());
    }

    #[test]
    fn from_config_rejects_invalid() {
        let temp = tempdir().unwrap();
        let config = CacheConfig {
            max_txn_bytes: 0,
            ..CacheConfig::for_testing(temp.path())
        };
        assert!(matches!(from_config(&config), Err(CacheError::Config(_))));
    }
}
