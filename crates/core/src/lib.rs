//! Core domain types and shared logic for the brokernode.
//!
//! This crate defines the data model used by the cache and metadata crates:
//! - Sector planning and treasure offset maps
//! - The chunk hash chain and address derivation
//! - Chunk payloads and upload sessions
//! - Ledger status machines for settlement, burial and claims
//! - Configuration

pub mod chunk;
pub mod cipher;
pub mod config;
pub mod error;
pub mod hashchain;
pub mod sector;
pub mod session;
pub mod status;

pub use chunk::{ChunkData, ChunkStatus, all_chunk_data_has_arrived};
pub use cipher::KeyCipher;
pub use config::{AppConfig, CacheConfig, CacheMode, LedgerConfig, MetadataConfig};
pub use error::{Error, Result};
pub use hashchain::{ChunkDigest, HashChain};
pub use session::{GenesisHash, GenesisHashStatus, SessionType, UploadPlan};
pub use status::{
    ClaimPrlStatus, GasTransferStatus, LedgerStatus, PaymentStatus, PrlStatus, StatusKind,
};
