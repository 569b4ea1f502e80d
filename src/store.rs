//! Envelope persistence seam.
//!
//! Persisting envelopes is the collaborator's job. The engine only needs to
//! look one up by an opaque file identifier, which is what [`EnvelopeStore`]
//! expresses. [`MemoryEnvelopeStore`] is a process-local implementation for
//! tests, demos and single-node deployments.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::envelope::EncryptionEnvelope;
use crate::error::{Result, VaultError};

/// An opaque identifier the collaborator assigns to an uploaded file.
pub type FileId = String;

/// Where envelopes live between upload and download.
pub trait EnvelopeStore: Send + Sync {
    /// Persist the envelope for `file_id`, replacing any previous one.
    fn put(&self, file_id: &str, envelope: EncryptionEnvelope) -> Result<()>;

    /// Fetch the envelope for `file_id`, or `NotFound`.
    fn get(&self, file_id: &str) -> Result<EncryptionEnvelope>;

    /// Forget the envelope for `file_id`. Removing an unknown id is a no-op.
    fn remove(&self, file_id: &str) -> Result<()>;
}

/// A `HashMap`-backed store.
///
/// Every map operation is a single insert, lookup or removal, so a panic in
/// another thread cannot leave the map half-updated; a poisoned lock is
/// recovered rather than reported.
#[derive(Debug, Default)]
pub struct MemoryEnvelopeStore {
    envelopes: RwLock<HashMap<FileId, EncryptionEnvelope>>,
}

impl MemoryEnvelopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<FileId, EncryptionEnvelope>> {
        self.envelopes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<FileId, EncryptionEnvelope>> {
        self.envelopes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EnvelopeStore for MemoryEnvelopeStore {
    fn put(&self, file_id: &str, envelope: EncryptionEnvelope) -> Result<()> {
        self.write().insert(file_id.to_string(), envelope);
        Ok(())
    }

    fn get(&self, file_id: &str) -> Result<EncryptionEnvelope> {
        self.read()
            .get(file_id)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(file_id.to_string()))
    }

    fn remove(&self, file_id: &str) -> Result<()> {
        self.write().remove(file_id);
        Ok(())
    }
}
