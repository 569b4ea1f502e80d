//! Error types for capvault.
//!
//! Every error variant is a distinct failure mode of the vault engine. Error
//! messages are intentionally minimal. They signal *what* failed without
//! revealing *why* in ways that could leak cryptographic state: a wrong
//! password and a tampered ciphertext produce the same `IntegrityCheckFailed`.

use thiserror::Error;

use crate::policy::PolicyViolation;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, VaultError>;

/// The single error type for all capvault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A parameter snapshot, policy or configuration file is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The key derivation primitive rejected its inputs.
    #[error("key derivation failed")]
    KeyDerivation,

    /// Digest, tag or credential comparison mismatch. Covers wrong passwords
    /// and tampering alike.
    #[error("integrity check failed")]
    IntegrityCheckFailed,

    /// The collaborator holds no record for the requested identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// A password does not satisfy the configured policy.
    #[error("password policy violation: {}", join_violations(.0))]
    PolicyViolation(Vec<PolicyViolation>),

    /// The random source failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// The cipher rejected a key or refused to seal a chunk.
    #[error("encryption failed")]
    EncryptionFailure,

    /// The caller cancelled the operation before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Reading the source or writing the sink failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An envelope, credential or config document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
