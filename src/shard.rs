//! Deterministic term-to-shard assignment.
//!
//! Posting lists are partitioned across `n_shards` barrel files by a hash
//! of the term. The build and the query service must agree on the mapping
//! across processes and platforms, so the hash is FNV-1a 64 with its
//! published constants rather than a process-salted hasher.

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash a byte string with FNV-1a 64.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Shard index for a term.
pub fn shard_for_term(term: &str, n_shards: u32) -> u32 {
    debug_assert!(n_shards > 0);
    (fnv1a_64(term.as_bytes()) % n_shards as u64) as u32
}
