//! Chunk payload access across the hash and message namespaces.

use crate::error::CacheResult;
use crate::keys::{Category, chunk_key, namespace_name, parse_chunk_key};
use crate::registry::CacheRegistry;
use brokernode_core::ChunkData;
use brokernode_core::hashchain::derive_address;
use std::time::Duration;
use tracing::{instrument, warn};

impl CacheRegistry {
    /// Read the cached data of chunk `idx`.
    ///
    /// Fields that have not arrived yet are left empty. Read failures are
    /// logged and also yield empty fields.
    pub fn get_chunk_data(&self, prefix: &str, genesis_hash: &str, idx: i64) -> ChunkData {
        let key = chunk_key(genesis_hash, idx);
        let mut data = ChunkData::default();

        match self.read_one(prefix, genesis_hash, Category::Message, &key) {
            Ok(Some(message)) => data.message = message,
            Ok(None) => {}
            Err(e) => warn!(genesis_hash, idx, error = %e, "Failed to read chunk message"),
        }

        match self.read_one(prefix, genesis_hash, Category::Hash, &key) {
            Ok(Some(hash)) => {
                data.address = address_for(&hash);
                data.hash = hash;
            }
            Ok(None) => {}
            Err(e) => warn!(genesis_hash, idx, error = %e, "Failed to read chunk hash"),
        }

        data
    }

    /// Read the cached data of many chunks.
    ///
    /// Only chunks present in both the hash and the message namespace are
    /// returned, in the order of `keys`. Fails only on store errors.
    #[instrument(skip(self, keys), fields(keys = keys.len()))]
    pub fn get_bulk_chunk_data<K: AsRef<str>>(
        &self,
        prefix: &str,
        genesis_hash: &str,
        keys: &[K],
    ) -> CacheResult<Vec<ChunkData>> {
        let hashes = self
            .namespace(&namespace_name(prefix, genesis_hash, Category::Hash)?)?
            .batch_get(keys)?;
        let mut messages = self
            .namespace(&namespace_name(prefix, genesis_hash, Category::Message)?)?
            .batch_get(keys)?;

        let chunks = keys
            .iter()
            .filter_map(|key| {
                let key = key.as_ref();
                let hash = hashes.get(key)?;
                let message = messages.remove(key)?;
                let hash = String::from_utf8_lossy(hash).into_owned();
                Some(ChunkData {
                    address: address_for(&hash),
                    message: String::from_utf8_lossy(&message).into_owned(),
                    hash,
                })
            })
            .collect();

        Ok(chunks)
    }

    /// Write the hash and message of each `(idx, chunk)` pair.
    ///
    /// Empty fields are not written. The address is not stored; it is derived
    /// from the hash on read.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub fn put_chunk_data(
        &self,
        prefix: &str,
        genesis_hash: &str,
        chunks: &[(i64, ChunkData)],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let hashes = chunks
            .iter()
            .filter(|(_, c)| !c.hash.is_empty())
            .map(|(idx, c)| (chunk_key(genesis_hash, *idx), c.hash.as_bytes()));
        self.namespace(&namespace_name(prefix, genesis_hash, Category::Hash)?)?
            .batch_set(hashes, ttl)?;

        let messages = chunks
            .iter()
            .filter(|(_, c)| !c.message.is_empty())
            .map(|(idx, c)| (chunk_key(genesis_hash, *idx), c.message.as_bytes()));
        self.namespace(&namespace_name(prefix, genesis_hash, Category::Message)?)?
            .batch_set(messages, ttl)?;

        Ok(())
    }

    /// Indexes of the chunks whose data has fully arrived among `keys`.
    pub fn arrived_chunk_indexes<K: AsRef<str>>(
        &self,
        prefix: &str,
        genesis_hash: &str,
        keys: &[K],
    ) -> CacheResult<Vec<i64>> {
        let hashes = self
            .namespace(&namespace_name(prefix, genesis_hash, Category::Hash)?)?
            .batch_get(keys)?;
        let messages = self
            .namespace(&namespace_name(prefix, genesis_hash, Category::Message)?)?
            .batch_get(keys)?;

        Ok(keys
            .iter()
            .map(|k| k.as_ref())
            .filter(|k| hashes.contains_key(*k) && messages.contains_key(*k))
            .filter_map(|k| parse_chunk_key(k).map(|(_, idx)| idx))
            .collect())
    }

    fn read_one(
        &self,
        prefix: &str,
        genesis_hash: &str,
        category: Category,
        key: &str,
    ) -> CacheResult<Option<String>> {
        let ns = self.namespace(&namespace_name(prefix, genesis_hash, category)?)?;
        let mut values = ns.batch_get(&[key])?;
        Ok(values
            .remove(key)
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }
}

fn address_for(hash: &str) -> String {
    match derive_address(hash) {
        Ok(address) => address,
        Err(e) => {
            warn!(hash, error = %e, "Cached chunk hash is not valid hex");
            String::new()
        }
    }
}
