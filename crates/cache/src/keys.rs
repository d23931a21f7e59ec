//! Namespace names and chunk keys.
//!
//! A namespace holds one category of data for one upload and is named
//! `prefix.genesis_hash.category`. Keys inside it are `genesis_hash_idx`.
//! Neither delimiter can occur in a hex genesis hash or a decimal index.

use crate::error::{CacheError, CacheResult};

/// Separator between the parts of a namespace name.
pub const NAMESPACE_DELIMITER: char = '.';

/// Separator between genesis hash and chunk index in a key.
pub const KEY_DELIMITER: char = '_';

/// Kind of data held by a namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Chunks attached and verified.
    Complete,
    /// Chunks currently being processed.
    InProgress,
    /// Chunk hashes.
    Hash,
    /// Raw chunk messages.
    Message,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::InProgress => "in_progress",
            Self::Hash => "hash",
            Self::Message => "message",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the namespace name for `(prefix, genesis_hash, category)`.
pub fn namespace_name(prefix: &str, genesis_hash: &str, category: Category) -> CacheResult<String> {
    validate_part("prefix", prefix)?;
    validate_genesis_hash(genesis_hash)?;
    Ok(format!(
        "{prefix}{NAMESPACE_DELIMITER}{genesis_hash}{NAMESPACE_DELIMITER}{category}"
    ))
}

/// Key of chunk `idx` of `genesis_hash`.
pub fn chunk_key(genesis_hash: &str, idx: i64) -> String {
    format!("{genesis_hash}{KEY_DELIMITER}{idx}")
}

/// Split a chunk key back into genesis hash and index.
pub fn parse_chunk_key(key: &str) -> Option<(&str, i64)> {
    let (genesis, idx) = key.rsplit_once(KEY_DELIMITER)?;
    if genesis.is_empty() {
        return None;
    }
    Some((genesis, idx.parse().ok()?))
}

/// Keys for chunks `start..=end` of `genesis_hash`.
///
/// Keys ascend when `start <= end` and descend otherwise.
pub fn generate_bulk_keys(genesis_hash: &str, start: i64, end: i64) -> Vec<String> {
    if start <= end {
        (start..=end).map(|i| chunk_key(genesis_hash, i)).collect()
    } else {
        (end..=start).rev().map(|i| chunk_key(genesis_hash, i)).collect()
    }
}

/// Validate a namespace name before it is used as a directory name.
pub(crate) fn validate_namespace_name(name: &str) -> CacheResult<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(CacheError::InvalidKey(format!(
            "invalid namespace name: {name:?}"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    {
        return Err(CacheError::InvalidKey(format!(
            "namespace name contains invalid characters: {name:?}"
        )));
    }
    Ok(())
}

fn validate_part(what: &str, part: &str) -> CacheResult<()> {
    if part.is_empty() {
        return Err(CacheError::InvalidKey(format!("{what} is empty")));
    }
    if part.contains(NAMESPACE_DELIMITER) {
        return Err(CacheError::InvalidKey(format!(
            "{what} must not contain '{NAMESPACE_DELIMITER}': {part}"
        )));
    }
    Ok(())
}

fn validate_genesis_hash(genesis_hash: &str) -> CacheResult<()> {
    validate_part("genesis hash", genesis_hash)?;
    if !genesis_hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CacheError::InvalidKey(format!(
            "genesis hash is not hex: {genesis_hash}"
        )));
    }
    Ok(())
}
