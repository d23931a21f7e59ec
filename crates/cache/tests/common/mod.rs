pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{GENESIS, PREFIX, TestCache, digests};
