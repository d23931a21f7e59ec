//! A single namespace database.
//!
//! Each namespace is an independent sled database in its own directory.
//! Values carry an 8-byte big-endian expiry (unix seconds) ahead of the
//! payload; expired values read as absent and are removed by
//! [`Namespace::purge_expired`].

use crate::error::{CacheError, CacheResult};
use crate::keys::generate_bulk_keys;
use brokernode_core::config::CacheConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

const EXPIRY_HEADER_LEN: usize = 8;

/// Handle to one open namespace.
pub struct Namespace {
    name: String,
    path: PathBuf,
    db: sled::Db,
    config: Arc<CacheConfig>,
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl Namespace {
    /// Open (or create) the namespace directory under `root`.
    pub(crate) fn open(name: &str, root: &Path, config: Arc<CacheConfig>) -> CacheResult<Self> {
        let path = root.join(name);
        let db = sled::open(&path).map_err(|source| CacheError::Open {
            namespace: name.to_string(),
            source,
        })?;
        debug!(namespace = %name, path = %path.display(), "Opened cache namespace");
        Ok(Self {
            name: name.to_string(),
            path,
            db,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Fetch the values of `keys`.
    ///
    /// Missing and expired keys are omitted from the result.
    #[instrument(skip(self, keys), fields(namespace = %self.name))]
    pub fn batch_get<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<HashMap<String, Vec<u8>>> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let mut values = HashMap::with_capacity(keys.len());

        for key in keys {
            let key = key.as_ref();
            let raw = self.db.get(key.as_bytes()).map_err(|e| {
                warn!(namespace = %self.name, key, error = %e, "Cache read failed");
                CacheError::Sled(e)
            })?;
            let Some(raw) = raw else { continue };

            match decode_value(&raw) {
                Some((expires_at, _)) if expires_at <= now => {}
                Some((_, payload)) => {
                    values.insert(key.to_string(), payload.to_vec());
                }
                None => {
                    warn!(namespace = %self.name, key, "Skipping malformed cache value");
                }
            }
        }

        Ok(values)
    }

    /// Write `pairs` with the given TTL.
    ///
    /// Pairs are grouped into write transactions. A transaction that would
    /// exceed the configured size or entry limit is committed and the
    /// remaining pairs continue in a fresh one, so a store failure part way
    /// through leaves earlier transactions applied. Keys are all validated
    /// before anything is written. Returns the number of pairs written.
    #[instrument(skip(self, pairs), fields(namespace = %self.name))]
    pub fn batch_set<I, K, V>(&self, pairs: I, ttl: Option<Duration>) -> CacheResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let pairs: Vec<(K, V)> = pairs.into_iter().collect();
        for (key, _) in &pairs {
            validate_key(key.as_ref())?;
        }

        let expires_at = expiry_from_now(self.config.ttl(ttl));
        let mut txn = TxnBuffer::new(&self.config);
        let mut written = 0;

        for (key, value) in &pairs {
            let key = key.as_ref();
            let encoded = encode_value(expires_at, value.as_ref());
            let size = key.len() + encoded.len();
            if txn.would_overflow(size) {
                self.commit(&mut txn)?;
            }
            txn.batch.insert(key.as_bytes(), encoded);
            txn.record(size);
            written += 1;
        }

        self.commit(&mut txn)?;
        debug!(namespace = %self.name, written, commits = txn.commits, "Cache batch set");
        Ok(written)
    }

    /// Remove `keys`, with the same transaction splitting as
    /// [`Namespace::batch_set`]. Removing an absent key is not an error.
    #[instrument(skip(self, keys), fields(namespace = %self.name))]
    pub fn batch_delete<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<usize> {
        for key in keys {
            validate_key(key.as_ref())?;
        }

        let mut txn = TxnBuffer::new(&self.config);
        for key in keys {
            let key = key.as_ref();
            if txn.would_overflow(key.len()) {
                self.commit(&mut txn)?;
            }
            txn.batch.remove(key.as_bytes());
            txn.record(key.len());
        }

        self.commit(&mut txn)?;
        Ok(keys.len())
    }

    /// Remove the keys of chunks `start..=end` of `genesis_hash`.
    pub fn delete_range(&self, genesis_hash: &str, start: i64, end: i64) -> CacheResult<usize> {
        let keys = generate_bulk_keys(genesis_hash, start, end);
        self.batch_delete(&keys)
    }

    /// Remove all expired or malformed entries, returning how many were removed.
    #[instrument(skip(self), fields(namespace = %self.name))]
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let mut txn = TxnBuffer::new(&self.config);
        let mut purged = 0;

        for entry in self.db.iter() {
            let (key, raw) = entry?;
            let expired = match decode_value(&raw) {
                Some((expires_at, _)) => expires_at <= now,
                None => true,
            };
            if !expired {
                continue;
            }
            if txn.would_overflow(key.len()) {
                self.commit(&mut txn)?;
            }
            txn.record(key.len());
            txn.batch.remove(key);
            purged += 1;
        }

        self.commit(&mut txn)?;
        if purged > 0 {
            debug!(namespace = %self.name, purged, "Purged expired cache entries");
        }
        Ok(purged)
    }

    fn commit(&self, txn: &mut TxnBuffer) -> CacheResult<()> {
        if txn.entries == 0 {
            return Ok(());
        }
        let entries = txn.entries;
        let batch = txn.take();
        self.db.apply_batch(batch).map_err(|e| {
            warn!(namespace = %self.name, entries, error = %e, "Cache batch commit failed");
            CacheError::Sled(e)
        })?;
        if txn.commits > 1 {
            debug!(namespace = %self.name, entries, commit = txn.commits, "Cache transaction split");
        }
        Ok(())
    }
}

/// Pending write transaction with its running size.
struct TxnBuffer {
    batch: sled::Batch,
    bytes: usize,
    entries: usize,
    max_bytes: usize,
    max_entries: usize,
    commits: usize,
}

impl TxnBuffer {
    fn new(config: &CacheConfig) -> Self {
        Self {
            batch: sled::Batch::default(),
            bytes: 0,
            entries: 0,
            max_bytes: config.max_txn_bytes,
            max_entries: config.max_txn_entries,
            commits: 0,
        }
    }

    /// Whether adding an operation of `size` bytes would exceed a limit.
    /// An empty transaction always accepts one operation.
    fn would_overflow(&self, size: usize) -> bool {
        self.entries > 0
            && (self.entries + 1 > self.max_entries || self.bytes + size > self.max_bytes)
    }

    fn record(&mut self, size: usize) {
        self.bytes += size;
        self.entries += 1;
    }

    fn take(&mut self) -> sled::Batch {
        self.bytes = 0;
        self.entries = 0;
        self.commits += 1;
        std::mem::take(&mut self.batch)
    }
}

fn validate_key(key: &str) -> CacheResult<&str> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("empty key".to_string()));
    }
    Ok(key)
}

fn expiry_from_now(ttl: Duration) -> i64 {
    let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    OffsetDateTime::now_utc().unix_timestamp().saturating_add(secs)
}

fn encode_value(expires_at: i64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(EXPIRY_HEADER_LEN + payload.len());
    out.extend_from_slice(&expires_at.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn decode_value(raw: &[u8]) -> Option<(i64, &[u8])> {
    if raw.len() < EXPIRY_HEADER_LEN {
        return None;
    }
    let (header, payload) = raw.split_at(EXPIRY_HEADER_LEN);
    let expires_at = i64::from_be_bytes(header.try_into().ok()?);
    Some((expires_at, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(config: CacheConfig) -> (TempDir, Namespace) {
        let dir = TempDir::new().unwrap();
        let ns = Namespace::open("broker.ab.hash", dir.path(), Arc::new(config)).unwrap();
        (dir, ns)
    }

    fn production_config() -> CacheConfig {
        CacheConfig::default()
    }

    #[test]
    fn test_value_header() {
        let encoded = encode_value(1234, b"payload");
        assert_eq!(encoded.len(), EXPIRY_HEADER_LEN + 7);
        assert_eq!(decode_value(&encoded), Some((1234, &b"payload"[..])));
        assert_eq!(decode_value(b"short"), None);
    }

    #[test]
    fn test_txn_buffer_limits() {
        let config = CacheConfig {
            max_txn_entries: 2,
            max_txn_bytes: 100,
            ..CacheConfig::default()
        };
        let mut txn = TxnBuffer::new(&config);

        // Oversized single entries still fit an empty transaction.
        assert!(!txn.would_overflow(1000));
        txn.record(10);
        assert!(!txn.would_overflow(10));
        assert!(txn.would_overflow(95));
        txn.record(10);
        assert!(txn.would_overflow(1));
    }

    #[test]
    fn test_set_get_delete() {
        let (_dir, ns) = open(production_config());
        let written = ns
            .batch_set([("ab_0", "zero"), ("ab_1", "one")], None)
            .unwrap();
        assert_eq!(written, 2);

        let values = ns.batch_get(&["ab_0", "ab_1", "ab_2"]).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["ab_0"], b"zero");

        ns.batch_delete(&["ab_0", "ab_9"]).unwrap();
        let values = ns.batch_get(&["ab_0", "ab_1"]).unwrap();
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["ab_1"]);
    }

    #[test]
    fn test_split_and_continue_writes_everything() {
        let config = CacheConfig {
            max_txn_entries: 3,
            max_txn_bytes: 64,
            ..CacheConfig::default()
        };
        let (_dir, ns) = open(config);

        let pairs: Vec<(String, String)> = (0..50)
            .map(|i| (format!("ab_{i}"), format!("value-{i}")))
            .collect();
        assert_eq!(ns.batch_set(pairs.clone(), None).unwrap(), 50);

        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        let values = ns.batch_get(&keys).unwrap();
        assert_eq!(values.len(), 50);
        assert_eq!(values["ab_49"], b"value-49");

        ns.batch_delete(&keys).unwrap();
        assert!(ns.is_empty());
    }

    #[test]
    fn test_expired_values_are_omitted_and_purged() {
        let (_dir, ns) = open(production_config());
        ns.batch_set([("ab_0", "gone")], Some(Duration::ZERO))
            .unwrap();
        ns.batch_set([("ab_1", "kept")], Some(Duration::from_secs(3600)))
            .unwrap();

        let values = ns.batch_get(&["ab_0", "ab_1"]).unwrap();
        assert!(!values.contains_key("ab_0"));
        assert!(values.contains_key("ab_1"));

        assert_eq!(ns.purge_expired().unwrap(), 1);
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_delete_range() {
        let (_dir, ns) = open(production_config());
        let keys = generate_bulk_keys("ab", 0, 9);
        ns.batch_set(keys.iter().map(|k| (k, "v")), None).unwrap();

        assert_eq!(ns.delete_range("ab", 7, 2).unwrap(), 6);
        let remaining = ns.batch_get(&keys).unwrap();
        let mut remaining: Vec<_> = remaining.into_keys().collect();
        remaining.sort();
        assert_eq!(remaining, vec!["ab_0", "ab_1", "ab_8", "ab_9"]);
    }

    #[test]
    fn test_invalid_late_key_writes_nothing() {
        let config = CacheConfig {
            max_txn_entries: 2,
            ..CacheConfig::default()
        };
        let (_dir, ns) = open(config);

        let pairs = vec![("ab_0", "zero"), ("ab_1", "one"), ("ab_2", "two"), ("", "bad")];
        assert!(matches!(
            ns.batch_set(pairs, None),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(ns.is_empty());

        ns.batch_set([("ab_0", "zero"), ("ab_1", "one"), ("ab_2", "two")], None)
            .unwrap();
        assert!(matches!(
            ns.batch_delete(&["ab_0", "ab_1", "ab_2", ""]),
            Err(CacheError::InvalidKey(_))
        ));
        assert_eq!(ns.len(), 3);
    }

    #[test]
    fn test_empty_key_rejected() {
        let (_dir, ns) = open(production_config());
        assert!(matches!(
            ns.batch_set([("", "v")], None),
            Err(CacheError::InvalidKey(_))
        ));
    }
}
