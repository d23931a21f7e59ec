//! Repository traits for metadata operations.

pub mod burials;
pub mod chunks;
pub mod claims;
pub mod genesis_hashes;
pub mod sessions;
pub mod settlements;

pub use burials::BurialRepo;
pub use chunks::ChunkRepo;
pub use claims::ClaimRepo;
pub use genesis_hashes::GenesisHashRepo;
pub use sessions::SessionRepo;
pub use settlements::SettlementRepo;
