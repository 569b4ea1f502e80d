//! Low-level cryptographic operations.
//!
//! This module is one of exactly two places in the crate that import `ring`
//! key primitives directly (the other is `keys`). All other modules encrypt and
//! decrypt exclusively through [`ChunkCipher`] and hash through [`Digest`].
//!
//! Primitive choices:
//! - **Cipher**: AES-GCM, 128- or 256-bit key depending on the snapshot
//! - **IV**: 96-bit base IV per envelope, generated fresh per operation
//! - **Chunk nonce**: base IV with the big-endian chunk index XORed into its
//!   last 8 bytes
//! - **Associated data**: envelope nonce, chunk index and a final-chunk flag

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM};
use ring::digest;
use subtle::ConstantTimeEq;

use crate::error::{Result, VaultError};
use crate::keys::SymmetricKey;
use crate::params::HashAlgorithm;

/// Size of the GCM base IV in bytes (96 bits).
pub const IV_LEN: usize = aead::NONCE_LEN;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Plaintext bytes carried by every chunk except the last.
pub const CHUNK_LEN: usize = 64 * 1024;

/// A keyed AES-GCM instance bound to one envelope.
pub(crate) struct ChunkCipher {
    key: LessSafeKey,
    iv: [u8; IV_LEN],
    envelope_nonce: Vec<u8>,
}

impl ChunkCipher {
    /// Key the cipher. Fails if the key length does not name an AES variant
    /// or the IV is not exactly 96 bits.
    pub(crate) fn new(key: &SymmetricKey, iv: &[u8], envelope_nonce: &[u8]) -> Result<Self> {
        let algorithm = match key.len() {
            16 => &AES_128_GCM,
            32 => &AES_256_GCM,
            _ => return Err(VaultError::EncryptionFailure),
        };
        let unbound =
            UnboundKey::new(algorithm, key.as_bytes()).map_err(|_| VaultError::EncryptionFailure)?;
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| VaultError::EncryptionFailure)?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            iv,
            envelope_nonce: envelope_nonce.to_vec(),
        })
    }

    /// Encrypt `chunk` in place and append the tag.
    pub(crate) fn seal(&self, index: u64, is_final: bool, chunk: &mut Vec<u8>) -> Result<()> {
        self.key
            .seal_in_place_append_tag(
                self.nonce_for(index),
                Aad::from(self.aad_for(index, is_final)),
                chunk,
            )
            .map_err(|_| VaultError::EncryptionFailure)
    }

    /// Authenticate and decrypt a frame (ciphertext followed by tag) in place.
    ///
    /// Returns the plaintext prefix of `frame`. No plaintext is returned
    /// unless the tag verifies.
    pub(crate) fn open<'a>(
        &self,
        index: u64,
        is_final: bool,
        frame: &'a mut [u8],
    ) -> Result<&'a mut [u8]> {
        if frame.len() < TAG_LEN {
            return Err(VaultError::IntegrityCheckFailed);
        }
        self.key
            .open_in_place(
                self.nonce_for(index),
                Aad::from(self.aad_for(index, is_final)),
                frame,
            )
            .map_err(|_| VaultError::IntegrityCheckFailed)
    }

    fn nonce_for(&self, index: u64) -> Nonce {
        let mut bytes = self.iv;
        for (b, i) in bytes[IV_LEN - 8..].iter_mut().zip(index.to_be_bytes()) {
            *b ^= i;
        }
        Nonce::assume_unique_for_key(bytes)
    }

    fn aad_for(&self, index: u64, is_final: bool) -> Vec<u8> {
        let mut aad = Vec::with_capacity(self.envelope_nonce.len() + 9);
        aad.extend_from_slice(&self.envelope_nonce);
        aad.extend_from_slice(&index.to_be_bytes());
        aad.push(u8::from(is_final));
        aad
    }
}

/// Incremental digest over a byte stream.
pub(crate) struct Digest {
    ctx: digest::Context,
}

impl Digest {
    pub(crate) fn new(hash: HashAlgorithm) -> Self {
        Self {
            ctx: digest::Context::new(hash.digest_algorithm()),
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        self.ctx.update(data);
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.ctx.finish().as_ref().to_vec()
    }
}

/// One-shot digest.
pub(crate) fn digest_of(hash: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    digest::digest(hash.digest_algorithm(), data)
        .as_ref()
        .to_vec()
}

/// Constant-time equality. Length mismatch is reported as unequal.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
