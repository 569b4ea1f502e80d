//! Versioned algorithm parameter snapshots.
//!
//! A [`SecurityParameters`] value is attached by value to every envelope at
//! creation time and never changes afterwards. New records may be produced
//! under a newer default snapshot while old records keep decrypting with the
//! snapshot they were created under.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// GCM authentication tag length. `ring` only exposes full-length tags.
pub const SUPPORTED_TAG_BITS: u32 = 128;

/// AES key sizes `ring` offers in GCM mode.
pub const SUPPORTED_KEY_BITS: [u32; 2] = [128, 256];

/// Hash functions usable for PBKDF2-HMAC and the integrity digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Canonical name as stored in envelopes.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    pub(crate) fn digest_algorithm(&self) -> &'static ring::digest::Algorithm {
        match self {
            Self::Sha256 => &ring::digest::SHA256,
            Self::Sha384 => &ring::digest::SHA384,
            Self::Sha512 => &ring::digest::SHA512,
        }
    }

    pub(crate) fn pbkdf2_algorithm(&self) -> ring::pbkdf2::Algorithm {
        match self {
            Self::Sha256 => ring::pbkdf2::PBKDF2_HMAC_SHA256,
            Self::Sha384 => ring::pbkdf2::PBKDF2_HMAC_SHA384,
            Self::Sha512 => ring::pbkdf2::PBKDF2_HMAC_SHA512,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = VaultError;

    /// Accepts `SHA-512`, `sha512`, `Sha-512` and so on.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(VaultError::Configuration(format!(
                "unrecognized hash algorithm: {s}"
            ))),
        }
    }
}

/// An immutable snapshot of algorithm knobs.
///
/// Deserialization runs the same validation as [`SecurityParameters::new`],
/// so a snapshot loaded from storage is as trustworthy as a freshly built one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawParameters")]
pub struct SecurityParameters {
    hash_algorithm: String,
    key_size_bits: u32,
    nonce_length_bytes: u32,
    salt_length_bytes: u32,
    kdf_iteration_count: u32,
    tag_length_bits: u32,
}

#[derive(Deserialize)]
struct RawParameters {
    hash_algorithm: String,
    key_size_bits: u32,
    nonce_length_bytes: u32,
    salt_length_bytes: u32,
    kdf_iteration_count: u32,
    tag_length_bits: u32,
}

impl TryFrom<RawParameters> for SecurityParameters {
    type Error = VaultError;

    fn try_from(raw: RawParameters) -> Result<Self> {
        Self::new(
            &raw.hash_algorithm,
            raw.key_size_bits,
            raw.nonce_length_bytes,
            raw.salt_length_bytes,
            raw.kdf_iteration_count,
            raw.tag_length_bits,
        )
    }
}

impl SecurityParameters {
    /// Build a validated snapshot.
    ///
    /// Fails with `Configuration` if any numeric field is zero, the hash name
    /// is not recognized, or the key/tag sizes cannot be served by AES-GCM.
    pub fn new(
        hash_algorithm: &str,
        key_size_bits: u32,
        nonce_length_bytes: u32,
        salt_length_bytes: u32,
        kdf_iteration_count: u32,
        tag_length_bits: u32,
    ) -> Result<Self> {
        let hash: HashAlgorithm = hash_algorithm.parse()?;

        for (field, value) in [
            ("key_size_bits", key_size_bits),
            ("nonce_length_bytes", nonce_length_bytes),
            ("salt_length_bytes", salt_length_bytes),
            ("kdf_iteration_count", kdf_iteration_count),
            ("tag_length_bits", tag_length_bits),
        ] {
            if value == 0 {
                return Err(VaultError::Configuration(format!(
                    "{field} must be greater than zero"
                )));
            }
        }

        if !SUPPORTED_KEY_BITS.contains(&key_size_bits) {
            return Err(VaultError::Configuration(format!(
                "unsupported key size: {key_size_bits} bits"
            )));
        }
        if tag_length_bits != SUPPORTED_TAG_BITS {
            return Err(VaultError::Configuration(format!(
                "unsupported tag length: {tag_length_bits} bits"
            )));
        }

        Ok(Self {
            hash_algorithm: hash.name().to_string(),
            key_size_bits,
            nonce_length_bytes,
            salt_length_bytes,
            kdf_iteration_count,
            tag_length_bits,
        })
    }

    /// SHA-512, 256-bit key, 32-byte nonce, 64-byte salt, 10 000 iterations,
    /// 128-bit tag.
    pub fn recommended() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Sha512.name().to_string(),
            key_size_bits: 256,
            nonce_length_bytes: 32,
            salt_length_bytes: 64,
            kdf_iteration_count: 10_000,
            tag_length_bits: SUPPORTED_TAG_BITS,
        }
    }

    pub fn hash_algorithm(&self) -> &str {
        &self.hash_algorithm
    }

    /// The parsed hash algorithm.
    pub fn hash(&self) -> Result<HashAlgorithm> {
        self.hash_algorithm.parse()
    }

    pub fn key_size_bits(&self) -> u32 {
        self.key_size_bits
    }

    pub fn nonce_length_bytes(&self) -> u32 {
        self.nonce_length_bytes
    }

    pub fn salt_length_bytes(&self) -> u32 {
        self.salt_length_bytes
    }

    pub fn kdf_iteration_count(&self) -> u32 {
        self.kdf_iteration_count
    }

    pub fn tag_length_bits(&self) -> u32 {
        self.tag_length_bits
    }

    pub(crate) fn key_len(&self) -> usize {
        (self.key_size_bits / 8) as usize
    }

    pub(crate) fn nonce_len(&self) -> usize {
        self.nonce_length_bytes as usize
    }

    pub(crate) fn salt_len(&self) -> usize {
        self.salt_length_bytes as usize
    }
}

impl Default for SecurityParameters {
    fn default() -> Self {
        Self::recommended()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommended_matches_explicit_construction() {
        let built = SecurityParameters::new("SHA-512", 256, 32, 64, 10_000, 128).unwrap();
        assert_eq!(built, SecurityParameters::recommended());
    }

    #[test]
    fn zero_fields_are_rejected() {
        assert!(SecurityParameters::new("SHA-512", 256, 0, 64, 10_000, 128).is_err());
        assert!(SecurityParameters::new("SHA-512", 256, 32, 0, 10_000, 128).is_err());
        assert!(SecurityParameters::new("SHA-512", 256, 32, 64, 0, 128).is_err());
        assert!(matches!(
            SecurityParameters::new("SHA-512", 0, 32, 64, 10_000, 128),
            Err(VaultError::Configuration(_))
        ));
    }

    #[test]
    fn unknown_hash_is_rejected() {
        assert!(matches!(
            SecurityParameters::new("MD5", 256, 32, 64, 10_000, 128),
            Err(VaultError::Configuration(_))
        ));
    }

    #[test]
    fn hash_names_are_normalized() {
        let params = SecurityParameters::new("sha256", 128, 12, 16, 1, 128).unwrap();
        assert_eq!(params.hash_algorithm(), "SHA-256");
        assert_eq!(params.hash().unwrap(), HashAlgorithm::Sha256);
    }

    #[test]
    fn unsupported_cipher_sizes_are_rejected() {
        assert!(SecurityParameters::new("SHA-512", 192, 32, 64, 10, 128).is_err());
        assert!(SecurityParameters::new("SHA-512", 256, 32, 64, 10, 96).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let good = r#"{"hash_algorithm":"SHA-384","key_size_bits":256,"nonce_length_bytes":16,
            "salt_length_bytes":32,"kdf_iteration_count":5,"tag_length_bits":128}"#;
        let params: SecurityParameters = serde_json::from_str(good).unwrap();
        assert_eq!(params.hash().unwrap(), HashAlgorithm::Sha384);

        let bad = r#"{"hash_algorithm":"SHA-384","key_size_bits":256,"nonce_length_bytes":0,
            "salt_length_bytes":32,"kdf_iteration_count":5,"tag_length_bits":128}"#;
        assert!(serde_json::from_str::<SecurityParameters>(bad).is_err());
    }
}
