//! Hash Router Module
//!
//! Maps keys to segment indices with a 32-bit FNV fold.

const OFFSET_BASIS: u32 = 2_166_136_261;
const PRIME: u32 = 16_777_619;

/// 32-bit FNV hash of the key bytes (multiply, then xor each byte).
pub fn fnv32(key: &str) -> u32 {
    key.bytes().fold(OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(PRIME) ^ u32::from(byte)
    })
}

/// Returns the index of the segment that owns `key`.
///
/// `segment_count` must be non-zero; the cache guarantees this at construction.
pub fn route(key: &str, segment_count: usize) -> usize {
    debug_assert!(segment_count > 0, "segment count must be non-zero");
    fnv32(key) as usize % segment_count
}
