//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use capvault::{RandomSource, Result, SecurityParameters, VaultError};
use ring::digest::{digest, SHA256};

/// Cheap parameters for tests that run many encryptions.
pub fn fast_params() -> SecurityParameters {
    SecurityParameters::new("SHA-512", 256, 32, 64, 1, 128).unwrap()
}

/// Reproducible byte stream: SHA-256(seed || counter) blocks.
pub struct SeededRandom {
    seed: u64,
    counter: AtomicU64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }
}

impl RandomSource for SeededRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        for chunk in dest.chunks_mut(32) {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            let mut input = [0u8; 16];
            input[..8].copy_from_slice(&self.seed.to_be_bytes());
            input[8..].copy_from_slice(&n.to_be_bytes());
            let block = digest(&SHA256, &input);
            chunk.copy_from_slice(&block.as_ref()[..chunk.len()]);
        }
        Ok(())
    }
}

/// A random source that always fails.
pub struct BrokenRandom;

impl RandomSource for BrokenRandom {
    fn fill(&self, _dest: &mut [u8]) -> Result<()> {
        Err(VaultError::RandomnessFailure)
    }
}

/// Deterministic pseudo-random plaintext of `len` bytes.
pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 7)) as u8).collect()
}
