//! Chunked authenticated encryption of byte streams.
//!
//! The engine moves data through a fixed-size buffer so memory stays bounded
//! regardless of payload size. Both directions share one chunking discipline:
//!
//! ```text
//! ciphertext = frame_0 || frame_1 || ... || frame_n
//! frame_i    = AES-GCM(chunk_i) || tag (16 bytes)
//! |chunk_i|  = CHUNK_LEN for i < n, 0..=CHUNK_LEN for i = n
//! ```
//!
//! The final frame is always present, even for empty input, and is marked
//! final in its associated data. A digest of the plaintext is accumulated
//! alongside and compared in constant time once the stream is exhausted.
//!
//! Sources and sinks are taken by value (pass `&mut` to keep ownership), so
//! every handle the engine holds is released on all exit paths.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::crypto::{self, ChunkCipher, Digest, CHUNK_LEN, IV_LEN, TAG_LEN};
use crate::envelope::EncryptionEnvelope;
use crate::error::{Result, VaultError};
use crate::keys;
use crate::params::SecurityParameters;
use crate::policy::{CapabilityPassword, PasswordPolicy};
use crate::random::{random_bytes, RandomSource, SystemRandomSource};

/// Cooperative cancellation flag, checked before every chunk.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VaultError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Streaming encryption engine.
///
/// Holds no mutable state: the random source and password policy are fixed at
/// construction and every operation works on its own local buffers, so one
/// engine can serve concurrent uploads and downloads.
#[derive(Debug)]
pub struct StreamCipherEngine<R: RandomSource = SystemRandomSource> {
    rng: R,
    policy: PasswordPolicy,
}

impl StreamCipherEngine<SystemRandomSource> {
    /// An engine drawing from the operating system CSPRNG.
    pub fn with_system_random(policy: PasswordPolicy) -> Result<Self> {
        Self::new(SystemRandomSource::new(), policy)
    }
}

impl<R: RandomSource> StreamCipherEngine<R> {
    pub fn new(rng: R, policy: PasswordPolicy) -> Result<Self> {
        policy.check()?;
        Ok(Self { rng, policy })
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// A fresh password satisfying the engine's policy.
    pub fn generate_password(&self) -> Result<CapabilityPassword> {
        Ok(self.policy.generate(&self.rng)?.into())
    }

    /// Encrypt `source` into `sink` under `parameters`.
    ///
    /// Uses `password` if given, otherwise generates one from the policy.
    /// Returns the password and the envelope once the sink has been fully
    /// written and flushed.
    pub fn encrypt<S: Read, W: Write>(
        &self,
        source: S,
        sink: W,
        parameters: &SecurityParameters,
        password: Option<&str>,
    ) -> Result<(CapabilityPassword, EncryptionEnvelope)> {
        self.encrypt_with(source, sink, parameters, password, &CancelToken::new())
    }

    /// [`encrypt`](Self::encrypt) with cooperative cancellation.
    pub fn encrypt_with<S: Read, W: Write>(
        &self,
        mut source: S,
        mut sink: W,
        parameters: &SecurityParameters,
        password: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<(CapabilityPassword, EncryptionEnvelope)> {
        let hash = parameters.hash()?;
        let password = match password {
            Some(p) => CapabilityPassword::new(p),
            None => self.generate_password()?,
        };

        let salt = random_bytes(&self.rng, parameters.salt_len())?;
        let nonce = random_bytes(&self.rng, parameters.nonce_len())?;
        let cipher_iv = random_bytes(&self.rng, IV_LEN)?;

        let key = keys::derive(password.expose_secret().as_bytes(), &salt, parameters)?;
        let cipher = ChunkCipher::new(&key, &cipher_iv, &nonce)?;
        drop(key);

        let mut digest = Digest::new(hash);
        let mut current = Vec::with_capacity(CHUNK_LEN + TAG_LEN);
        let mut lookahead = Vec::with_capacity(CHUNK_LEN + TAG_LEN);
        let mut index: u64 = 0;
        let mut total: u64 = 0;

        read_up_to(&mut source, &mut current, CHUNK_LEN)?;
        loop {
            cancel.check()?;

            let is_final = current.len() < CHUNK_LEN || {
                read_up_to(&mut source, &mut lookahead, CHUNK_LEN)?;
                lookahead.is_empty()
            };

            digest.update(&current);
            total += current.len() as u64;
            cipher.seal(index, is_final, &mut current)?;
            sink.write_all(&current)?;

            if is_final {
                break;
            }
            std::mem::swap(&mut current, &mut lookahead);
            index = index.checked_add(1).ok_or(VaultError::EncryptionFailure)?;
        }
        sink.flush()?;

        debug!(
            bytes = total,
            chunks = index + 1,
            hash = %hash,
            "stream encrypted"
        );

        let envelope = EncryptionEnvelope {
            nonce,
            salt,
            integrity_digest: digest.finish(),
            cipher_iv,
            parameters: parameters.clone(),
        };
        Ok((password, envelope))
    }

    /// Decrypt `source` into `sink` using `password` and `envelope`.
    ///
    /// Any mismatch, whether from a wrong password, a corrupted or truncated
    /// ciphertext, or a tampered envelope, yields `IntegrityCheckFailed`.
    /// Each chunk reaches the sink only after its own tag verifies, but
    /// earlier chunks may already have been written when a later one fails;
    /// the caller owns the sink and must discard it on error.
    pub fn decrypt<S: Read, W: Write>(
        &self,
        password: &str,
        envelope: &EncryptionEnvelope,
        source: S,
        sink: W,
    ) -> Result<()> {
        self.decrypt_with(password, envelope, source, sink, &CancelToken::new())
    }

    /// [`decrypt`](Self::decrypt) with cooperative cancellation.
    pub fn decrypt_with<S: Read, W: Write>(
        &self,
        password: &str,
        envelope: &EncryptionEnvelope,
        source: S,
        sink: W,
        cancel: &CancelToken,
    ) -> Result<()> {
        let result = decrypt_stream(password, envelope, source, sink, cancel);
        if let Err(VaultError::IntegrityCheckFailed) = &result {
            warn!("stream integrity check failed");
        }
        result
    }
}

fn decrypt_stream<S: Read, W: Write>(
    password: &str,
    envelope: &EncryptionEnvelope,
    mut source: S,
    mut sink: W,
    cancel: &CancelToken,
) -> Result<()> {
    let parameters = &envelope.parameters;
    let hash = parameters.hash()?;

    let key = keys::derive(password.as_bytes(), &envelope.salt, parameters)?;
    let cipher = ChunkCipher::new(&key, &envelope.cipher_iv, &envelope.nonce)
        .map_err(|_| VaultError::IntegrityCheckFailed)?;
    drop(key);

    let frame_len = CHUNK_LEN + TAG_LEN;
    let mut digest = Digest::new(hash);
    let mut current = Vec::with_capacity(frame_len);
    let mut lookahead = Vec::with_capacity(frame_len);
    let mut index: u64 = 0;
    let mut total: u64 = 0;

    read_up_to(&mut source, &mut current, frame_len)?;
    loop {
        cancel.check()?;

        let is_final = current.len() < frame_len || {
            read_up_to(&mut source, &mut lookahead, frame_len)?;
            lookahead.is_empty()
        };

        let plaintext = cipher.open(index, is_final, &mut current)?;
        digest.update(plaintext);
        total += plaintext.len() as u64;
        sink.write_all(plaintext)?;

        if is_final {
            break;
        }
        std::mem::swap(&mut current, &mut lookahead);
        index = index
            .checked_add(1)
            .ok_or(VaultError::IntegrityCheckFailed)?;
    }
    sink.flush()?;

    if !crypto::constant_time_eq(&digest.finish(), &envelope.integrity_digest) {
        return Err(VaultError::IntegrityCheckFailed);
    }

    debug!(bytes = total, chunks = index + 1, "stream decrypted");
    Ok(())
}

/// Replace `buf` with up to `limit` bytes from `source`, stopping early only
/// at end of stream.
fn read_up_to<S: Read>(source: &mut S, buf: &mut Vec<u8>, limit: usize) -> Result<()> {
    buf.clear();
    source.by_ref().take(limit as u64).read_to_end(buf)?;
    Ok(())
}
