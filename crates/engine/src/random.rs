//! Secure randomness capability.
//!
//! The `RandomFair` strategy requires randomness that is unpredictable to
//! any party observing pending transactions, so the source is injected
//! rather than ambient. Permutations drawn here are unbiased Fisher-Yates
//! shuffles; for auditability a permutation can be recomputed from its
//! revealed seed with [`permutation_from_seed`] and checked against the
//! persisted SHA-256 commitment.

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

/// Injected source of unpredictable randomness.
pub trait SecureRandom: Send + Sync {
    /// 32 bytes of seed material.
    fn seed32(&self) -> [u8; 32];

    /// Unbiased random permutation of `0..n`.
    fn random_permutation(&self, n: usize) -> Vec<usize> {
        permutation_from_seed(self.seed32(), n)
    }
}

/// Production source backed by the operating system CSPRNG.
pub struct OsSecureRandom;

impl SecureRandom for OsSecureRandom {
    fn seed32(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        seed
    }
}

/// Deterministic source for tests, driven by a seeded ChaCha20 stream.
pub struct SeededSecureRandom {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededSecureRandom {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl SecureRandom for SeededSecureRandom {
    fn seed32(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        self.rng.lock().fill_bytes(&mut seed);
        seed
    }
}

/// The permutation of `0..n` determined by `seed`.
///
/// Pure: the same seed always yields the same permutation, which is what
/// makes the seed commitment auditable.
#[must_use]
pub fn permutation_from_seed(seed: [u8; 32], n: usize) -> Vec<usize> {
    let mut rng = ChaCha20Rng::from_seed(seed);
    let mut positions: Vec<usize> = (0..n).collect();
    positions.shuffle(&mut rng);
    positions
}

/// Hex-encoded SHA-256 commitment to a seed.
#[must_use]
pub fn seed_commitment(seed: &[u8; 32]) -> String {
    hex::encode(Sha256::digest(seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn permutation_is_total() {
        let perm = permutation_from_seed([7u8; 32], 10);
        let unique: HashSet<usize> = perm.iter().copied().collect();
        assert_eq!(unique.len(), 10);
        assert!(perm.iter().all(|&p| p < 10));
    }

    #[test]
    fn permutation_is_deterministic_per_seed() {
        let a = permutation_from_seed([1u8; 32], 16);
        let b = permutation_from_seed([1u8; 32], 16);
        assert_eq!(a, b);

        let c = permutation_from_seed([2u8; 32], 16);
        assert_ne!(a, c);
    }

    #[test]
    fn seeded_source_is_reproducible() {
        let first = SeededSecureRandom::new(42);
        let second = SeededSecureRandom::new(42);
        assert_eq!(first.seed32(), second.seed32());
        assert_eq!(first.random_permutation(8), second.random_permutation(8));
    }

    #[test]
    fn os_source_produces_distinct_seeds() {
        let source = OsSecureRandom;
        assert_ne!(source.seed32(), source.seed32());
    }

    #[test]
    fn commitment_matches_recomputation() {
        let seed = [9u8; 32];
        assert_eq!(seed_commitment(&seed), seed_commitment(&seed));
        assert_eq!(seed_commitment(&seed).len(), 64);
    }
}
