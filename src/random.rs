//! Injected randomness.
//!
//! Every salt, nonce, IV and generated password in the crate is drawn from a
//! [`RandomSource`]. Production code uses [`SystemRandomSource`], which wraps
//! `ring::rand::SystemRandom`. Tests substitute their own implementation to
//! make generation reproducible.

use std::sync::Arc;

use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};

/// A cryptographically secure source of random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system CSPRNG, via `ring`.
#[derive(Debug, Clone)]
pub struct SystemRandomSource {
    rng: SystemRandom,
}

impl SystemRandomSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        self.rng
            .fill(dest)
            .map_err(|_| VaultError::RandomnessFailure)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &R {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill(dest)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Arc<R> {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill(dest)
    }
}

/// Allocate and fill a buffer of `len` random bytes.
pub(crate) fn random_bytes(rng: &dyn RandomSource, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)?;
    Ok(buf)
}

/// Draw a uniformly distributed index in `0..bound` by rejection sampling.
///
/// `bound` must be non-zero and at most 2^32.
pub(crate) fn uniform_index(rng: &dyn RandomSource, bound: usize) -> Result<usize> {
    debug_assert!(bound > 0);
    let bound = bound as u64;
    let zone = (u64::from(u32::MAX) + 1) / bound * bound;
    loop {
        let mut buf = [0u8; 4];
        rng.fill(&mut buf)?;
        let value = u64::from(u32::from_be_bytes(buf));
        if value < zone {
            return Ok((value % bound) as usize);
        }
    }
}
