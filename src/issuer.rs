//! Upload and download orchestration.
//!
//! The issuer glues the engine to collaborator-supplied streams:
//! 1. Upload: generate a capability password, encrypt, hand back
//!    (password, envelope)
//! 2. Download: re-derive from the caller's password and replay decryption
//! 3. Credentials: issue, register, verify and change user passwords
//! 4. Append every outcome to the bounded audit log, then hand it to sinks
//!
//! The issuer never persists passwords. Storing envelopes and ciphertext is
//! the collaborator's job, optionally through an [`EnvelopeStore`].

use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditLog, AuditOutcome, AuditRecord, AuditSink};
use crate::config::VaultConfig;
use crate::credential::{Credential, CredentialVault};
use crate::envelope::EncryptionEnvelope;
use crate::error::{Result, VaultError};
use crate::params::SecurityParameters;
use crate::policy::{CapabilityPassword, PasswordPolicy};
use crate::random::{RandomSource, SystemRandomSource};
use crate::store::EnvelopeStore;
use crate::stream::{CancelToken, StreamCipherEngine};

/// Coordinates uploads, downloads and credentials under one configuration.
///
/// `Send + Sync`: the snapshot and policy are read-only. The audit log and the
/// sinks sit behind separate locks, taken only after an operation has
/// finished, so no cryptographic work waits on audit I/O.
pub struct CapabilityIssuer<R: RandomSource = SystemRandomSource> {
    engine: StreamCipherEngine<Arc<R>>,
    credentials: CredentialVault<Arc<R>>,
    parameters: SecurityParameters,
    audit: Mutex<AuditLog>,
    sinks: Mutex<Vec<Box<dyn AuditSink>>>,
}

impl CapabilityIssuer<SystemRandomSource> {
    /// An issuer drawing from the operating system CSPRNG.
    pub fn new(config: VaultConfig) -> Result<Self> {
        Self::with_random(SystemRandomSource::new(), config)
    }
}

impl<R: RandomSource> CapabilityIssuer<R> {
    pub fn with_random(rng: R, config: VaultConfig) -> Result<Self> {
        let rng = Arc::new(rng);
        Ok(Self {
            engine: StreamCipherEngine::new(Arc::clone(&rng), config.policy)?,
            credentials: CredentialVault::new(rng),
            parameters: config.parameters,
            audit: Mutex::new(AuditLog::with_capacity(config.audit_capacity)),
            sinks: Mutex::new(Vec::new()),
        })
    }

    /// The snapshot attached to every new envelope and credential.
    pub fn parameters(&self) -> &SecurityParameters {
        &self.parameters
    }

    pub fn policy(&self) -> &PasswordPolicy {
        self.engine.policy()
    }

    pub fn engine(&self) -> &StreamCipherEngine<Arc<R>> {
        &self.engine
    }

    /// Add a sink to receive a copy of every audit record.
    pub fn add_audit_sink(&self, sink: Box<dyn AuditSink>) {
        lock(&self.sinks).push(sink);
    }

    /// A snapshot of the most recent audit records, at most the configured
    /// `audit_capacity`.
    pub fn audit_log(&self) -> AuditLog {
        lock(&self.audit).clone()
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Encrypt an upload under a freshly generated capability password.
    pub fn issue_for_upload<S: Read, W: Write>(
        &self,
        source: S,
        sink: W,
    ) -> Result<(CapabilityPassword, EncryptionEnvelope)> {
        self.issue_for_upload_with(source, sink, &CancelToken::new())
    }

    pub fn issue_for_upload_with<S: Read, W: Write>(
        &self,
        source: S,
        sink: W,
        cancel: &CancelToken,
    ) -> Result<(CapabilityPassword, EncryptionEnvelope)> {
        let result = self
            .engine
            .encrypt_with(source, sink, &self.parameters, None, cancel);
        self.record(AuditAction::Upload, None, &result);
        if result.is_ok() {
            info!(hash = %self.parameters.hash_algorithm(), "capability issued for upload");
        }
        result
    }

    /// Encrypt an upload and persist its envelope under `file_id`.
    ///
    /// Nothing is stored unless encryption completed.
    pub fn issue_and_store<S: Read, W: Write>(
        &self,
        store: &dyn EnvelopeStore,
        file_id: &str,
        source: S,
        sink: W,
    ) -> Result<CapabilityPassword> {
        self.issue_and_store_with(store, file_id, source, sink, &CancelToken::new())
    }

    pub fn issue_and_store_with<S: Read, W: Write>(
        &self,
        store: &dyn EnvelopeStore,
        file_id: &str,
        source: S,
        sink: W,
        cancel: &CancelToken,
    ) -> Result<CapabilityPassword> {
        let result = self
            .engine
            .encrypt_with(source, sink, &self.parameters, None, cancel)
            .and_then(|(password, envelope)| {
                store.put(file_id, envelope)?;
                Ok(password)
            });
        self.record(AuditAction::Upload, Some(file_id), &result);
        result
    }

    /// Decrypt a download with the caller's capability password.
    ///
    /// On `IntegrityCheckFailed` the sink may hold partial output; the caller
    /// discards it.
    pub fn resolve_for_download<S: Read, W: Write>(
        &self,
        password: &str,
        envelope: &EncryptionEnvelope,
        source: S,
        sink: W,
    ) -> Result<()> {
        self.resolve_for_download_with(password, envelope, source, sink, &CancelToken::new())
    }

    pub fn resolve_for_download_with<S: Read, W: Write>(
        &self,
        password: &str,
        envelope: &EncryptionEnvelope,
        source: S,
        sink: W,
        cancel: &CancelToken,
    ) -> Result<()> {
        let result = self
            .engine
            .decrypt_with(password, envelope, source, sink, cancel);
        self.record(AuditAction::Download, None, &result);
        result
    }

    /// Look up the envelope for `file_id` and decrypt.
    ///
    /// `NotFound` comes from the store, never from the engine.
    pub fn resolve_by_id<S: Read, W: Write>(
        &self,
        store: &dyn EnvelopeStore,
        file_id: &str,
        password: &str,
        source: S,
        sink: W,
    ) -> Result<()> {
        self.resolve_by_id_with(store, file_id, password, source, sink, &CancelToken::new())
    }

    pub fn resolve_by_id_with<S: Read, W: Write>(
        &self,
        store: &dyn EnvelopeStore,
        file_id: &str,
        password: &str,
        source: S,
        sink: W,
        cancel: &CancelToken,
    ) -> Result<()> {
        let result = store.get(file_id).and_then(|envelope| {
            self.engine.decrypt_with(password, &envelope, source, sink, cancel)
        });
        self.record(AuditAction::Download, Some(file_id), &result);
        result
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    /// Generate a policy-compliant initial password and protect it.
    pub fn issue_initial_credential(&self) -> Result<(CapabilityPassword, Credential)> {
        let result = self.engine.generate_password().and_then(|password| {
            let credential = self
                .credentials
                .protect(password.expose_secret(), &self.parameters)?;
            Ok((password, credential))
        });
        self.record(AuditAction::CredentialIssued, None, &result);
        result
    }

    /// Protect a user-chosen password after checking it against the policy.
    pub fn register_credential(&self, secret: &str) -> Result<Credential> {
        let result = self
            .engine
            .policy()
            .ensure_compliant(secret)
            .and_then(|_| self.credentials.protect(secret, &self.parameters));
        self.record(AuditAction::CredentialIssued, None, &result);
        result
    }

    /// `Ok(true)` iff `secret` is the password protected by `credential`.
    pub fn verify_credential(&self, credential: &Credential, secret: &str) -> Result<bool> {
        let result = self.credentials.verify(credential, secret);
        let outcome = match &result {
            Ok(true) => AuditOutcome::Success,
            Ok(false) => AuditOutcome::IntegrityFailure,
            Err(err) => outcome_of(err),
        };
        let hash = credential.envelope().parameters().hash_algorithm();
        self.record_outcome(AuditAction::CredentialVerified, outcome, None, hash);
        result
    }

    /// Replace a credential. `new` must satisfy the policy and `current` must
    /// verify; the replacement is protected under the current snapshot.
    pub fn change_credential(
        &self,
        credential: &Credential,
        current: &str,
        new: &str,
    ) -> Result<Credential> {
        let result = self
            .engine
            .policy()
            .ensure_compliant(new)
            .and_then(|_| {
                self.credentials.replace(credential, current, new, &self.parameters)
            });
        self.record(AuditAction::CredentialChanged, None, &result);
        result
    }

    // -----------------------------------------------------------------------
    // Audit
    // -----------------------------------------------------------------------

    fn record<T>(&self, action: AuditAction, file_id: Option<&str>, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => AuditOutcome::Success,
            Err(err) => outcome_of(err),
        };
        self.record_outcome(action, outcome, file_id, self.parameters.hash_algorithm());
    }

    fn record_outcome(
        &self,
        action: AuditAction,
        outcome: AuditOutcome,
        file_id: Option<&str>,
        hash_algorithm: &str,
    ) {
        match outcome {
            AuditOutcome::Success => debug!(?action, ?file_id, "vault operation succeeded"),
            _ => warn!(?action, ?outcome, ?file_id, "vault operation failed"),
        }

        let mut record = AuditRecord::new(action, outcome).with_hash_algorithm(hash_algorithm);
        if let Some(id) = file_id {
            record = record.with_file_id(id);
        }

        lock(&self.audit).append(record.clone());
        for sink in lock(&self.sinks).iter_mut() {
            sink.append(record.clone());
        }
    }
}

/// Audit state stays usable after a panicking sink.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn outcome_of(err: &VaultError) -> AuditOutcome {
    match err {
        VaultError::IntegrityCheckFailed => AuditOutcome::IntegrityFailure,
        VaultError::NotFound(_) => AuditOutcome::NotFound,
        VaultError::PolicyViolation(_) => AuditOutcome::PolicyRejected,
        _ => AuditOutcome::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEnvelopeStore;

    fn issuer() -> CapabilityIssuer {
        let config = VaultConfig {
            parameters: SecurityParameters::new("SHA-512", 256, 32, 64, 10, 128).unwrap(),
            ..VaultConfig::default()
        };
        CapabilityIssuer::new(config).unwrap()
    }

    #[test]
    fn upload_download_audit() {
        let issuer = issuer();
        let mut ciphertext = Vec::new();
        let (password, envelope) = issuer
            .issue_for_upload(&b"move me"[..], &mut ciphertext)
            .unwrap();

        let mut plaintext = Vec::new();
        issuer
            .resolve_for_download(
                password.expose_secret(),
                &envelope,
                ciphertext.as_slice(),
                &mut plaintext,
            )
            .unwrap();
        assert_eq!(plaintext, b"move me");

        let log = issuer.audit_log();
        assert_eq!(log.len(), 2);
        let actions: Vec<_> = log.iter().map(|r| (r.action, r.outcome)).collect();
        assert_eq!(
            actions,
            vec![
                (AuditAction::Upload, AuditOutcome::Success),
                (AuditAction::Download, AuditOutcome::Success),
            ]
        );
    }

    #[test]
    fn unknown_file_id_is_not_found() {
        let issuer = issuer();
        let store = MemoryEnvelopeStore::new();
        let result = issuer.resolve_by_id(&store, "missing", "whatever", &b""[..], Vec::new());
        assert!(matches!(result, Err(VaultError::NotFound(id)) if id == "missing"));

        let record = issuer.audit_log().iter().last().cloned().unwrap();
        assert_eq!(record.outcome, AuditOutcome::NotFound);
        assert_eq!(record.file_id.as_deref(), Some("missing"));
    }

    #[test]
    fn weak_registration_is_rejected() {
        let issuer = issuer();
        let result = issuer.register_credential("short");
        assert!(matches!(result, Err(VaultError::PolicyViolation(v)) if !v.is_empty()));
    }

    #[test]
    fn audit_log_stays_within_configured_capacity() {
        let issuer = CapabilityIssuer::new(VaultConfig {
            parameters: SecurityParameters::new("SHA-256", 128, 12, 16, 1, 128).unwrap(),
            audit_capacity: 4,
            ..VaultConfig::default()
        })
        .unwrap();

        for _ in 0..25 {
            issuer.issue_for_upload(&b"x"[..], Vec::new()).unwrap();
        }
        let log = issuer.audit_log();
        assert_eq!(log.len(), 4);
        assert_eq!(log.capacity(), 4);
    }

    #[test]
    fn cancelled_store_upload_stores_nothing() {
        let issuer = issuer();
        let store = MemoryEnvelopeStore::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result =
            issuer.issue_and_store_with(&store, "file-1", &b"data"[..], Vec::new(), &cancel);
        assert!(matches!(result, Err(VaultError::Cancelled)));
        assert!(store.is_empty());
        assert_eq!(
            issuer.audit_log().iter().last().map(|r| r.outcome),
            Some(AuditOutcome::Error)
        );
    }

    #[test]
    fn cancelled_download_by_id_writes_nothing() {
        let issuer = issuer();
        let store = MemoryEnvelopeStore::new();
        let mut ciphertext = Vec::new();
        let password = issuer
            .issue_and_store(&store, "file-1", &b"data"[..], &mut ciphertext)
            .unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let mut plaintext = Vec::new();
        let result = issuer.resolve_by_id_with(
            &store,
            "file-1",
            password.expose_secret(),
            ciphertext.as_slice(),
            &mut plaintext,
            &cancel,
        );
        assert!(matches!(result, Err(VaultError::Cancelled)));
        assert!(plaintext.is_empty());
    }
}
