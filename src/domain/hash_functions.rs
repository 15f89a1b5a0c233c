//! Hash functions for the bloom filter.
//!
//! Uses MurmurHash3 with double hashing: `h(i) = h1 + i * h2`.

use std::io::Cursor;

/// Hash a key with MurmurHash3 under the given seed.
pub fn murmur_hash(key: &[u8], seed: u32) -> u64 {
    let mut cursor = Cursor::new(key);

    // 128-bit murmur, lower 64 bits
    let hash = murmur3::murmur3_x64_128(&mut cursor, seed).unwrap_or(0);
    hash as u64
}

/// Compute the k bit positions for a key in a filter of m bits.
///
/// Two murmur rounds seed the whole position sequence; positions come
/// out in hash-function order.
pub fn compute_hash_positions(key: &[u8], k: usize, m: usize) -> Vec<usize> {
    let h1 = murmur_hash(key, 0);
    let h2 = murmur_hash(key, 1);

    (0..k)
        .map(|i| {
            let hash = h1.wrapping_add((i as u64).wrapping_mul(h2));
            (hash % m as u64) as usize
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur_hash_deterministic() {
        let key = b"user:alice";

        let hash1 = murmur_hash(key, 42);
        let hash2 = murmur_hash(key, 42);

        assert_eq!(
            hash1, hash2,
            "same key with same seed must produce same output"
        );
    }

    #[test]
    fn test_murmur_different_seed_different_output() {
        let key = b"user:alice";

        let hash1 = murmur_hash(key, 0);
        let hash2 = murmur_hash(key, 1);

        assert_ne!(hash1, hash2, "different seeds must produce different outputs");
    }

    #[test]
    fn test_positions_in_bounds() {
        let key = b"user:alice";
        let k = 7;
        let m = 10_000;

        let positions = compute_hash_positions(key, k, m);

        assert_eq!(positions.len(), k, "should produce k positions");
        for pos in &positions {
            assert!(*pos < m, "position {} should be < m={}", pos, m);
        }
    }

    #[test]
    fn test_positions_varied() {
        let positions = compute_hash_positions(b"user:alice", 7, 10_000);

        let unique: std::collections::HashSet<_> = positions.iter().collect();
        assert!(
            unique.len() >= 3,
            "hash functions should produce varied positions"
        );
    }

    #[test]
    fn test_hash_uniformity() {
        // Positions should land roughly evenly across the bit array.
        let m = 1000;
        let k = 7;
        let mut counts = vec![0usize; 10];

        for i in 0..1000 {
            let key = format!("key_{}", i);
            for pos in compute_hash_positions(key.as_bytes(), k, m) {
                counts[pos / 100] += 1;
            }
        }

        // Each bucket should see about 1000*7/10 = 700 positions.
        for (i, count) in counts.iter().enumerate() {
            assert!(
                *count >= 350 && *count <= 1050,
                "bucket {} has {} entries, expected ~700",
                i,
                count
            );
        }
    }
}
