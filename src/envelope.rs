//! The encryption envelope and its persisted shape.
//!
//! An envelope bundles the non-secret material needed to decrypt one
//! ciphertext given the right password. It is created once when encryption
//! completes and never mutated. Ciphertext bytes are stored next to it by the
//! collaborator, never inside it.
//!
//! Byte fields serialize as standard base64 strings:
//!
//! ```json
//! {
//!   "nonce": "...", "salt": "...", "integrity_digest": "...", "cipher_iv": "...",
//!   "parameters": { "hash_algorithm": "SHA-512", "key_size_bits": 256, ... }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::SecurityParameters;

/// Non-secret material produced by one encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionEnvelope {
    #[serde(with = "base64_bytes")]
    pub(crate) nonce: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub(crate) salt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub(crate) integrity_digest: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub(crate) cipher_iv: Vec<u8>,
    pub(crate) parameters: SecurityParameters,
}

impl EncryptionEnvelope {
    /// Rebuild an envelope from persisted fields.
    pub fn from_parts(
        nonce: Vec<u8>,
        salt: Vec<u8>,
        integrity_digest: Vec<u8>,
        cipher_iv: Vec<u8>,
        parameters: SecurityParameters,
    ) -> Self {
        Self {
            nonce,
            salt,
            integrity_digest,
            cipher_iv,
            parameters,
        }
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn integrity_digest(&self) -> &[u8] {
        &self.integrity_digest
    }

    pub fn cipher_iv(&self) -> &[u8] {
        &self.cipher_iv
    }

    /// The snapshot this envelope was produced under.
    pub fn parameters(&self) -> &SecurityParameters {
        &self.parameters
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Serde adapter storing `Vec<u8>` as a standard base64 string.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
