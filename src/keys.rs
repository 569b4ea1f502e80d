//! Key derivation and ownership.
//!
//! This module owns two responsibilities:
//! 1. Stretching a password into a symmetric key with PBKDF2-HMAC, seeded by a
//!    per-record salt and iterated as many times as the parameter snapshot says.
//! 2. Holding derived key material in a type that is opaque, non-cloneable,
//!    and zeroised on drop.
//!
//! This is one of exactly two modules permitted to import `ring` key
//! primitives directly (the other is `crypto`).
//!
//! ## Derivation structure
//!
//! ```text
//! PBKDF2(
//!     prf        = HMAC-{parameters.hash_algorithm},
//!     password   = password bytes (UTF-8),
//!     salt       = envelope.salt,
//!     iterations = parameters.kdf_iteration_count,
//!     dk_len     = parameters.key_size_bits / 8
//! )
//! ```
//!
//! Identical inputs always yield an identical key. Encryption and later
//! verification both depend on this.

use std::num::NonZeroU32;

use ring::pbkdf2;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};
use crate::params::{HashAlgorithm, SecurityParameters};

/// A symmetric key derived from a password.
///
/// - Not `Clone`. Each key is scoped to a single operation.
/// - Zeroised on drop.
/// - Raw bytes never leave the crate.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: Vec<u8>,
}

impl SymmetricKey {
    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Derive a key from `password` and `salt` under `parameters`.
///
/// Fails with `KeyDerivation` if the snapshot names a hash the primitive
/// does not support, asks for zero iterations, or asks for a key size that is
/// not a whole number of bytes.
pub fn derive(
    password: &[u8],
    salt: &[u8],
    parameters: &SecurityParameters,
) -> Result<SymmetricKey> {
    let hash: HashAlgorithm = parameters
        .hash_algorithm()
        .parse()
        .map_err(|_| VaultError::KeyDerivation)?;
    let iterations =
        NonZeroU32::new(parameters.kdf_iteration_count()).ok_or(VaultError::KeyDerivation)?;
    let key_bits = parameters.key_size_bits();
    if key_bits == 0 || key_bits % 8 != 0 {
        return Err(VaultError::KeyDerivation);
    }

    let mut bytes = vec![0u8; parameters.key_len()];
    pbkdf2::derive(hash.pbkdf2_algorithm(), iterations, salt, password, &mut bytes);

    Ok(SymmetricKey { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> SecurityParameters {
        SecurityParameters::new("SHA-512", 256, 32, 64, 10, 128).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let params = fast_params();
        let a = derive(b"hunter2", b"salt-salt-salt", &params).unwrap();
        let b = derive(b"hunter2", b"salt-salt-salt", &params).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn salt_and_password_change_the_key() {
        let params = fast_params();
        let base = derive(b"hunter2", b"salt-a", &params).unwrap();
        let other_salt = derive(b"hunter2", b"salt-b", &params).unwrap();
        let other_pw = derive(b"hunter3", b"salt-a", &params).unwrap();
        assert_ne!(base.as_bytes(), other_salt.as_bytes());
        assert_ne!(base.as_bytes(), other_pw.as_bytes());
    }

    #[test]
    fn key_size_follows_parameters() {
        let params = SecurityParameters::new("SHA-256", 128, 12, 16, 10, 128).unwrap();
        let key = derive(b"pw", b"salt", &params).unwrap();
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn matches_rfc6070_style_vector() {
        // PBKDF2-HMAC-SHA256, "password"/"salt", 1 iteration, first 16 bytes.
        let params = SecurityParameters::new("SHA-256", 128, 12, 4, 1, 128).unwrap();
        let key = derive(b"password", b"salt", &params).unwrap();
        assert_eq!(
            key.as_bytes(),
            &[
                0x12, 0x0f, 0xb6, 0xcf, 0xfc, 0xf8, 0xb3, 0x2c, 0x43, 0xe7, 0x22, 0x52, 0x56,
                0xc4, 0xf8, 0x37
            ]
        );
    }

    #[test]
    fn debug_does_not_leak_key_bytes() {
        let key = derive(b"pw", b"salt", &fast_params()).unwrap();
        let shown = format!("{key:?}");
        assert!(shown.contains("len"));
        assert!(!shown.contains("bytes"));
    }
}
