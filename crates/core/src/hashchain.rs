//! Deterministic chunk hash chain and address derivation.
//!
//! Every chunk of an upload is identified by a hash derived from the genesis
//! hash: chunk 0 hashes the genesis hash, chunk `n` hashes chunk `n - 1`.
//! The on-ledger address of a chunk is derived from its hash alone.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256, Sha384};

/// Length of a derived chunk address in trytes.
pub const ADDRESS_LENGTH: usize = 81;

const TRYTE_ALPHABET: &[u8; 27] = b"9ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn decode_hex(hex_str: &str) -> Result<Vec<u8>> {
    if hex_str.is_empty() {
        return Err(Error::InvalidHash("empty hash".to_string()));
    }
    hex::decode(hex_str).map_err(|e| Error::InvalidHash(format!("{hex_str}: {e}")))
}

/// Hash the hex-decoded input with SHA-256, returning lowercase hex.
pub fn next_hash(hex_str: &str) -> Result<String> {
    let bytes = decode_hex(hex_str)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Convert ASCII text into trytes, two trytes per byte.
fn ascii_to_trytes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for byte in text.bytes() {
        let first = byte % 27;
        let second = byte / 27;
        out.push(TRYTE_ALPHABET[first as usize] as char);
        out.push(TRYTE_ALPHABET[second as usize] as char);
    }
    out
}

/// Derive the ledger address of a chunk from its hash.
pub fn derive_address(hash: &str) -> Result<String> {
    let bytes = decode_hex(hash)?;
    let obfuscated = hex::encode(Sha384::digest(&bytes));
    let mut trytes = ascii_to_trytes(&obfuscated);
    trytes.truncate(ADDRESS_LENGTH);
    Ok(trytes)
}

/// Hash and address of one chunk in the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkDigest {
    pub idx: i64,
    pub hash: String,
    pub address: String,
}

/// Iterator over the chunk digests of an upload.
///
/// Yields `Err` once and then stops if the seed is not valid hex.
#[derive(Clone, Debug)]
pub struct HashChain {
    current: String,
    idx: i64,
    failed: bool,
}

impl HashChain {
    /// Start a chain from the genesis hash.
    pub fn new(genesis_hash: impl Into<String>) -> Self {
        Self {
            current: genesis_hash.into(),
            idx: 0,
            failed: false,
        }
    }

    fn advance(&mut self) -> Result<ChunkDigest> {
        let hash = next_hash(&self.current)?;
        let address = derive_address(&hash)?;
        let digest = ChunkDigest {
            idx: self.idx,
            hash: hash.clone(),
            address,
        };
        self.current = hash;
        self.idx += 1;
        Ok(digest)
    }
}

impl Iterator for HashChain {
    type Item = Result<ChunkDigest>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.advance();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}
