//! Upload session identifiers and planning.

use crate::sector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one uploaded file's chunk set (lowercase hex).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenesisHash(String);

impl GenesisHash {
    /// Parse and validate a genesis hash.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidInput(
                "genesis hash is empty".to_string(),
            ));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(crate::Error::InvalidHash(format!(
                "genesis hash is not hex: {s}"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GenesisHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.len().min(16);
        write!(f, "GenesisHash({})", &self.0[..end])
    }
}

impl fmt::Display for GenesisHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for GenesisHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which broker of the pair a session belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Alpha,
    Beta,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "alpha" => Ok(Self::Alpha),
            "beta" => Ok(Self::Beta),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown session type: {other}"
            ))),
        }
    }
}

/// Assignment state of a stored genesis hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenesisHashStatus {
    Unassigned,
    Assigned,
}

impl GenesisHashStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::Assigned => "assigned",
        }
    }
}

/// Chunk layout of an upload derived from its size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPlan {
    pub genesis_hash: GenesisHash,
    pub file_size_bytes: i64,
    /// Ordinary chunks carrying file data.
    pub ordinary_chunks: i64,
    /// Number of sectors, equal to the number of treasure slots.
    pub sectors: i64,
    /// Ordinary chunks plus treasure slots.
    pub total_chunks: i64,
}

impl UploadPlan {
    pub fn new(genesis_hash: GenesisHash, file_size_bytes: i64) -> Self {
        Self {
            genesis_hash,
            file_size_bytes,
            ordinary_chunks: sector::ordinary_chunk_count(file_size_bytes),
            sectors: sector::sector_count(file_size_bytes),
            total_chunks: sector::total_chunks_including_treasure(file_size_bytes),
        }
    }
}
