//! In-memory bloom filter.
//!
//! No false negatives: after `add(k)`, `contains(k)` is always true.
//! `add` reports whether the key was newly added, which is what the
//! manager's `set` surfaces per key.

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use super::hash_functions::compute_hash_positions;
use super::parameters::{calculate_fpr, calculate_optimal_parameters};
use crate::config::FilterParams;
use crate::error::FilterError;

/// Probabilistic set over a fixed bit array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BloomFilter {
    /// Bit array storing the filter state.
    #[serde(with = "bitvec_serde")]
    bits: BitVec<u8, Lsb0>,
    /// Number of hash functions (k).
    k: usize,
    /// Size in bits (m).
    m: usize,
    /// Number of keys added (n).
    n: usize,
}

/// Serde support for BitVec.
mod bitvec_serde {
    use bitvec::prelude::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bits: &BitVec<u8, Lsb0>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes: Vec<u8> = bits.as_raw_slice().to_vec();
        (bytes, bits.len()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BitVec<u8, Lsb0>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (bytes, len): (Vec<u8>, usize) = Deserialize::deserialize(deserializer)?;
        let mut bits = BitVec::<u8, Lsb0>::from_vec(bytes);
        bits.truncate(len);
        Ok(bits)
    }
}

impl BloomFilter {
    /// Create a filter with explicit geometry.
    pub fn new(m: usize, k: usize) -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 0; m],
            k,
            m,
            n: 0,
        }
    }

    /// Create a filter sized for the given capacity and target FPR.
    pub fn with_params(params: &FilterParams) -> Self {
        let geometry = calculate_optimal_parameters(params.capacity, params.target_fpr);
        Self::new(geometry.size_bits, geometry.hash_count)
    }

    /// Add a key to the filter.
    ///
    /// Returns `true` when the key was newly added and `false` when every
    /// bit was already set, because the key is present or collides with
    /// prior keys in the probabilistic sense.
    pub fn add(&mut self, key: &[u8]) -> bool {
        let positions = compute_hash_positions(key, self.k, self.m);

        let mut newly_set = false;
        for pos in positions {
            if !self.bits[pos] {
                self.bits.set(pos, true);
                newly_set = true;
            }
        }

        if newly_set {
            self.n += 1;
        }
        newly_set
    }

    /// Test whether a key might be in the filter.
    ///
    /// `true` means possibly present (false positives happen); `false`
    /// means definitely absent.
    pub fn contains(&self, key: &[u8]) -> bool {
        let positions = compute_hash_positions(key, self.k, self.m);
        positions.iter().all(|&pos| self.bits[pos])
    }

    /// False positive rate at the current fill.
    pub fn false_positive_rate(&self) -> f64 {
        calculate_fpr(self.m, self.n, self.k)
    }

    /// Number of bits set.
    pub fn bits_set(&self) -> usize {
        self.bits.count_ones()
    }

    /// Filter size in bits.
    pub fn size_bits(&self) -> usize {
        self.m
    }

    /// Number of hash functions.
    pub fn hash_count(&self) -> usize {
        self.k
    }

    /// Number of keys added so far.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether no key has been added yet.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Serialize the filter for the on-disk snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FilterError> {
        bincode::serialize(self).map_err(|e| FilterError::Serialization(e.to_string()))
    }

    /// Deserialize a filter from an on-disk snapshot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        bincode::deserialize(bytes).map_err(|e| FilterError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_filter() {
        let filter = BloomFilter::new(1000, 7);

        assert_eq!(filter.size_bits(), 1000);
        assert_eq!(filter.hash_count(), 7);
        assert_eq!(filter.len(), 0, "filter should have 0 keys initially");
        assert_eq!(filter.bits_set(), 0, "all bits should be zero initially");
    }

    #[test]
    fn test_add_reports_newly_added() {
        let mut filter = BloomFilter::new(1000, 7);

        assert!(filter.add(b"alice"), "first add of a key must report new");
        assert!(
            !filter.add(b"alice"),
            "second add of the same key must report already present"
        );
        assert_eq!(filter.len(), 1, "duplicate adds must not grow n");
    }

    #[test]
    fn test_contains_after_add() {
        let mut filter = BloomFilter::new(1000, 7);

        filter.add(b"alice");

        assert!(
            filter.contains(b"alice"),
            "contains must return true for an added key"
        );
    }

    #[test]
    fn test_no_false_negatives_bulk() {
        let mut filter = BloomFilter::new(10_000, 7);
        let keys: Vec<String> = (0..1000).map(|i| format!("key_{:04x}", i)).collect();

        for key in &keys {
            filter.add(key.as_bytes());
        }

        for key in &keys {
            assert!(
                filter.contains(key.as_bytes()),
                "false negative for {}",
                key
            );
        }
    }

    #[test]
    fn test_false_positive_rate_bounded() {
        let target_fpr = 0.01;
        let n = 100;
        let mut filter = BloomFilter::with_params(&FilterParams {
            capacity: n,
            target_fpr,
        });

        for i in 0..n {
            filter.add(format!("added_{}", i).as_bytes());
        }

        let mut false_positives = 0;
        for i in 0..10_000 {
            if filter.contains(format!("absent_{}", i).as_bytes()) {
                false_positives += 1;
            }
        }

        let actual_fpr = false_positives as f64 / 10_000.0;
        assert!(
            actual_fpr <= target_fpr * 2.0,
            "actual FPR {} exceeds 2 * target {}",
            actual_fpr,
            target_fpr
        );
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut filter = BloomFilter::new(1000, 7);
        filter.add(b"key_1");
        filter.add(b"key_2");
        filter.add(b"key_3");

        let bytes = filter.to_bytes().expect("serialization should succeed");
        let restored = BloomFilter::from_bytes(&bytes).expect("deserialization should succeed");

        assert!(restored.contains(b"key_1"));
        assert!(restored.contains(b"key_2"));
        assert!(restored.contains(b"key_3"));
        assert_eq!(restored.size_bits(), filter.size_bits());
        assert_eq!(restored.hash_count(), filter.hash_count());
        assert_eq!(restored.len(), filter.len());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let result = BloomFilter::from_bytes(b"not a snapshot");
        assert!(matches!(result, Err(FilterError::Serialization(_))));
    }
}
