//! Chunk payload types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload, hash and derived address of one chunk.
///
/// Fields are empty strings until the corresponding data has arrived.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkData {
    /// Ledger address derived from `hash`.
    pub address: String,
    /// Raw chunk message.
    pub message: String,
    /// Chunk content hash.
    pub hash: String,
}

impl ChunkData {
    /// Whether address, message and hash are all present.
    pub fn has_arrived(&self) -> bool {
        !self.address.is_empty() && !self.message.is_empty() && !self.hash.is_empty()
    }
}

impl fmt::Debug for ChunkData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkData")
            .field("address", &self.address)
            .field("message_len", &self.message.len())
            .field("hash", &self.hash)
            .finish()
    }
}

/// Free-function form of [`ChunkData::has_arrived`].
pub fn all_chunk_data_has_arrived(data: &ChunkData) -> bool {
    data.has_arrived()
}

/// Lifecycle of a chunk row in the relational store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    /// Created, waiting for its message.
    Pending,
    /// Message received, not yet attached to the ledger.
    Unassigned,
    /// Attached and verified.
    Complete,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Unassigned => "unassigned",
            Self::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "unassigned" => Ok(Self::Unassigned),
            "complete" => Ok(Self::Complete),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown chunk status: {other}"
            ))),
        }
    }
}
