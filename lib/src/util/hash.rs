//! Stable hashing used to derive identities
//!
//! Everything in here must give the same answer across processes and platforms, which rules out
//! `std::collections::hash_map::DefaultHasher` (it is randomly seeded).

/// Seed of the 32-bit FNV-1a hash
pub const FNV_INITIAL_SEED: u32 = 0x811c_9dc5;

const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over a byte string, continuing from `seed`
pub fn fnv_hash_bytes(bytes: &[u8], seed: u32) -> u32 {
    bytes.iter().fold(seed, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// FNV-1a over a byte string
pub fn fnv_hash(bytes: &[u8]) -> u32 {
    fnv_hash_bytes(bytes, FNV_INITIAL_SEED)
}

/// Fold a 32-bit item into a running FNV-1a hash
pub fn fnv_hash_item(item: u32, seed: u32) -> u32 {
    fnv_hash_bytes(&item.to_le_bytes(), seed)
}

/// Combine two hashes (the order of arguments matters)
pub fn merge_hashes(lhs: u32, rhs: u32) -> u32 {
    lhs ^ rhs
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(lhs << 6)
        .wrapping_add(lhs >> 2)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_fnv_values() {
        assert_eq!(fnv_hash(b""), FNV_INITIAL_SEED);
        assert_eq!(fnv_hash(b"a"), 0xe40c_292c);
        assert_eq!(fnv_hash(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn seeded_hash_continues() {
        let whole = fnv_hash(b"foobar");
        let split = fnv_hash_bytes(b"bar", fnv_hash(b"foo"));
        assert_eq!(whole, split);
    }

    #[test]
    fn merge_is_order_sensitive() {
        let a = fnv_hash(b"a.abc");
        let b = fnv_hash(b"header");
        assert_ne!(merge_hashes(a, b), merge_hashes(b, a));
        assert_eq!(merge_hashes(a, b), merge_hashes(a, b));
    }
}
