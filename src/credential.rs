//! User credential protection.
//!
//! A credential is the user's password encrypted under a key derived from that
//! same password, plus a digest of the encrypted bytes. Verification succeeds
//! iff decrypting the stored record with the supplied password yields bytes
//! equal to the supplied password. This is reversible by anyone holding the
//! password, unlike a one-way hash; the construction is kept as-is because
//! changing it changes the security properties of stored records.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::crypto::{self, ChunkCipher, IV_LEN};
use crate::envelope::{base64_bytes, EncryptionEnvelope};
use crate::error::{Result, VaultError};
use crate::keys;
use crate::params::SecurityParameters;
use crate::random::{random_bytes, RandomSource, SystemRandomSource};

/// A protected user password. Replaced wholesale on password change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub(crate) envelope: EncryptionEnvelope,
    #[serde(with = "base64_bytes")]
    pub(crate) encrypted_secret: Vec<u8>,
}

impl Credential {
    pub fn envelope(&self) -> &EncryptionEnvelope {
        &self.envelope
    }

    pub fn encrypted_secret(&self) -> &[u8] {
        &self.encrypted_secret
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Applies the stream primitives to a single in-memory secret.
#[derive(Debug)]
pub struct CredentialVault<R: RandomSource = SystemRandomSource> {
    rng: R,
}

impl Default for CredentialVault<SystemRandomSource> {
    fn default() -> Self {
        Self::new(SystemRandomSource::new())
    }
}

impl<R: RandomSource> CredentialVault<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Encrypt `secret` under a key derived from itself and a fresh salt.
    pub fn protect(&self, secret: &str, parameters: &SecurityParameters) -> Result<Credential> {
        let hash = parameters.hash()?;
        let salt = random_bytes(&self.rng, parameters.salt_len())?;
        let nonce = random_bytes(&self.rng, parameters.nonce_len())?;
        let cipher_iv = random_bytes(&self.rng, IV_LEN)?;

        let key = keys::derive(secret.as_bytes(), &salt, parameters)?;
        let cipher = ChunkCipher::new(&key, &cipher_iv, &nonce)?;

        let mut encrypted_secret = secret.as_bytes().to_vec();
        cipher.seal(0, true, &mut encrypted_secret)?;
        let integrity_digest = crypto::digest_of(hash, &encrypted_secret);

        debug!(hash = %hash, "credential protected");
        Ok(Credential {
            envelope: EncryptionEnvelope {
                nonce,
                salt,
                integrity_digest,
                cipher_iv,
                parameters: parameters.clone(),
            },
            encrypted_secret,
        })
    }

    /// Check `supplied` against a stored credential.
    ///
    /// `Ok(true)` only if the stored digest matches and the record decrypts to
    /// exactly `supplied`. A wrong password is `Ok(false)`; a record whose
    /// digest no longer matches is `IntegrityCheckFailed`.
    pub fn verify(&self, credential: &Credential, supplied: &str) -> Result<bool> {
        let envelope = &credential.envelope;
        let hash = envelope.parameters.hash()?;

        let recomputed = crypto::digest_of(hash, &credential.encrypted_secret);
        if !crypto::constant_time_eq(&recomputed, &envelope.integrity_digest) {
            warn!("credential record failed its integrity check");
            return Err(VaultError::IntegrityCheckFailed);
        }

        let key = keys::derive(supplied.as_bytes(), &envelope.salt, &envelope.parameters)?;
        let cipher = match ChunkCipher::new(&key, &envelope.cipher_iv, &envelope.nonce) {
            Ok(cipher) => cipher,
            Err(_) => return Err(VaultError::IntegrityCheckFailed),
        };

        let mut frame = credential.encrypted_secret.clone();
        let matches = match cipher.open(0, true, &mut frame) {
            Ok(plaintext) => crypto::constant_time_eq(plaintext, supplied.as_bytes()),
            Err(_) => false,
        };
        frame.zeroize();

        debug!(matches, "credential verified");
        Ok(matches)
    }

    /// Verify `current`, then protect `new` under fresh material and the
    /// given (usually newer) snapshot. The old envelope is never reused.
    pub fn replace(
        &self,
        credential: &Credential,
        current: &str,
        new: &str,
        parameters: &SecurityParameters,
    ) -> Result<Credential> {
        if !self.verify(credential, current)? {
            return Err(VaultError::IntegrityCheckFailed);
        }
        self.protect(new, parameters)
    }
}
