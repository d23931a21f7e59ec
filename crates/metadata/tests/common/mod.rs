pub mod fixtures;
pub mod metadata;

#[allow(unused_imports)]
pub use fixtures::{GENESIS, TestCipher, genesis, new_claim, new_settlement, new_treasure, plan};
#[allow(unused_imports)]
pub use metadata::TestMetadata;
