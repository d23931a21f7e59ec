//! Sector planning: chunk counts, treasure offsets and index remapping.
//!
//! A file is cut into [`CHUNK_SIZE_BYTES`] chunks which are grouped into
//! sectors of [`SECTOR_SIZE`] slots. Each sector reserves exactly one slot for
//! a treasure chunk, so only `SECTOR_SIZE - 1` ordinary chunks fit in a sector.
//! The treasure slot is placed at a random offset chosen per sector; ordinary
//! chunk indices are then shifted forward to leave room for it.

use crate::error::{Error, Result};
use rand::Rng;

/// Number of slots in one sector, treasure slot included.
pub const SECTOR_SIZE: i64 = 1_000_000;

/// Number of ordinary chunk slots per sector.
pub const ORDINARY_SLOTS_PER_SECTOR: i64 = SECTOR_SIZE - 1;

/// Size of one chunk in bytes.
pub const CHUNK_SIZE_BYTES: i64 = 1000;

/// Delimiter used when storing an offset sequence as a string.
pub const OFFSET_DELIMITER: char = '_';

fn ceil_div(value: i64, divisor: i64) -> i64 {
    if value <= 0 {
        return 0;
    }
    value / divisor + i64::from(value % divisor != 0)
}

/// Offsets reserved up front; larger plans grow as they are generated.
const MAX_OFFSET_PREALLOC: i64 = 4096;

/// Number of ordinary (non-treasure) chunks for a file of `file_bytes`.
pub fn ordinary_chunk_count(file_bytes: i64) -> i64 {
    ceil_div(file_bytes, CHUNK_SIZE_BYTES)
}

/// Number of sectors a file of `file_bytes` occupies.
pub fn sector_count(file_bytes: i64) -> i64 {
    ceil_div(file_bytes, CHUNK_SIZE_BYTES * ORDINARY_SLOTS_PER_SECTOR)
}

/// Total chunk slots for a file, one treasure slot per sector included.
pub fn total_chunks_including_treasure(file_bytes: i64) -> i64 {
    sector_count(file_bytes).saturating_add(ordinary_chunk_count(file_bytes))
}

/// Total chunk slots given an already known ordinary chunk count.
pub fn total_chunks_for_num_chunks(num_chunks: i64) -> i64 {
    num_chunks.saturating_add(ceil_div(num_chunks, ORDINARY_SLOTS_PER_SECTOR))
}

/// Generate one treasure offset per sector using the thread-local RNG.
pub fn generate_treasure_offsets(file_bytes: i64) -> Vec<i64> {
    generate_treasure_offsets_with(file_bytes, &mut rand::rng())
}

/// Generate one treasure offset per sector from the supplied RNG.
///
/// Each offset is uniform in `[0, min(SECTOR_SIZE, remaining))`, where
/// `remaining` starts at the total slot count and drops by a full sector
/// after each one, so the tail sector never places treasure past its end.
pub fn generate_treasure_offsets_with<R: Rng + ?Sized>(file_bytes: i64, rng: &mut R) -> Vec<i64> {
    if file_bytes <= 0 {
        return Vec::new();
    }

    let sectors = sector_count(file_bytes);
    let mut remaining = ordinary_chunk_count(file_bytes).saturating_add(sectors);
    let mut offsets = Vec::with_capacity(sectors.min(MAX_OFFSET_PREALLOC) as usize);

    for _ in 0..sectors {
        let upper = remaining.min(SECTOR_SIZE).max(1);
        offsets.push(rng.random_range(0..upper));
        remaining -= SECTOR_SIZE;
    }

    offsets
}

/// Merge the alpha and beta candidate maps by element-wise floor average.
pub fn merge_offset_maps(alpha: &[i64], beta: &[i64]) -> Result<Vec<i64>> {
    if alpha.is_empty() && beta.is_empty() {
        return Err(Error::InvalidInput(
            "both treasure offset maps are empty".to_string(),
        ));
    }
    if alpha.len() != beta.len() {
        return Err(Error::InvalidInput(format!(
            "treasure offset maps differ in length: {} vs {}",
            alpha.len(),
            beta.len()
        )));
    }

    Ok(alpha
        .iter()
        .zip(beta)
        .map(|(a, b)| (a + b).div_euclid(2))
        .collect())
}

/// Shift a pre-treasure chunk index to its slot after treasure insertion.
///
/// Every earlier sector contributes one treasure slot; within the chunk's own
/// sector the index moves one further once it reaches the treasure offset.
/// Sectors beyond the end of `offsets` carry no treasure of their own.
pub fn remap_index(raw_index: i64, offsets: &[i64]) -> i64 {
    if offsets.is_empty() || raw_index < 0 {
        return raw_index;
    }

    let sector = raw_index / ORDINARY_SLOTS_PER_SECTOR;
    let local = raw_index - sector * ORDINARY_SLOTS_PER_SECTOR;

    match offsets.get(sector as usize) {
        Some(&offset) if local >= offset => raw_index + sector + 1,
        _ => raw_index + sector,
    }
}

/// Absolute slot index of the treasure chunk in each sector.
pub fn treasure_slot_indexes(offsets: &[i64]) -> Vec<i64> {
    offsets
        .iter()
        .enumerate()
        .map(|(sector, offset)| sector as i64 * SECTOR_SIZE + offset)
        .collect()
}

/// Encode an offset sequence for storage.
pub fn encode_offsets(offsets: &[i64]) -> String {
    offsets
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(&OFFSET_DELIMITER.to_string())
}

/// Decode a stored offset sequence.
///
/// Absent, empty or malformed input yields an empty sequence.
pub fn decode_offsets(encoded: Option<&str>) -> Vec<i64> {
    let Some(encoded) = encoded.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    encoded
        .split(OFFSET_DELIMITER)
        .map(|part| part.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap_or_default()
}
