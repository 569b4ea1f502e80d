//! # capvault
//!
//! Capability-based encrypted file vault engine.
//!
//! An uploaded file is immediately encrypted under a freshly generated,
//! single-purpose password. That password, not the file, is the access
//! capability handed back to the uploader. User credentials are protected by
//! the same parameter-versioned symmetric scheme.
//!
//! ## Layers
//!
//! ```text
//! CapabilityIssuer        orchestration, audit
//!   ├── StreamCipherEngine  chunked AES-GCM + integrity digest
//!   ├── CredentialVault     the same primitives on one in-memory secret
//!   ├── keys                PBKDF2-HMAC key derivation
//!   ├── PasswordPolicy      generation and validation
//!   └── SecurityParameters  immutable per-record algorithm snapshot
//! ```
//!
//! ## Public API
//!
//! The public surface is intentionally narrow. `crypto` stays private: all
//! encryption goes through the engine, the credential vault or the issuer.

pub mod audit;
pub mod config;
pub mod credential;
pub(crate) mod crypto;
pub mod envelope;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod params;
pub mod policy;
pub mod random;
pub mod store;
pub mod stream;

pub use config::VaultConfig;
pub use credential::{Credential, CredentialVault};
pub use envelope::EncryptionEnvelope;
pub use error::{Result, VaultError};
pub use issuer::CapabilityIssuer;
pub use params::{HashAlgorithm, SecurityParameters};
pub use policy::{CapabilityPassword, PasswordPolicy, PolicyViolation};
pub use random::{RandomSource, SystemRandomSource};
pub use store::{EnvelopeStore, MemoryEnvelopeStore};
pub use stream::{CancelToken, StreamCipherEngine};

/// Plaintext bytes per chunk. Encryption and decryption share this value.
pub const CHUNK_LEN: usize = crypto::CHUNK_LEN;

/// Size of the AES-GCM authentication tag appended to every chunk.
pub const TAG_LEN: usize = crypto::TAG_LEN;

/// Generate a capability password under `policy` from the system CSPRNG.
///
/// Convenience for callers that need a password without an engine, e.g. to
/// reset a user's credential out of band.
pub fn generate_password(policy: &PasswordPolicy) -> Result<CapabilityPassword> {
    let rng = SystemRandomSource::new();
    Ok(policy.generate(&rng)?.into())
}
