//! Immutable audit logging.
//!
//! Records every upload, download and credential operation the issuer
//! performs. The in-memory log is append-only, bounded, and never holds
//! passwords, keys or plaintext. Pluggable sinks receive every record for
//! durable storage in files, databases, etc.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sink that receives audit records. Implement this to forward records
/// to a file, database, or other persistent store.
pub trait AuditSink: Send {
    /// Append a record. Called for every audited operation.
    fn append(&mut self, record: AuditRecord);
}

/// What kind of operation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Upload,
    Download,
    CredentialIssued,
    CredentialVerified,
    CredentialChanged,
}

/// How the operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    /// Wrong password or tampered data. The two are not distinguished.
    IntegrityFailure,
    NotFound,
    PolicyRejected,
    Error,
}

/// A permanent record of a vault operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    /// The collaborator's file identifier, when the operation had one.
    pub file_id: Option<String>,
    /// Hash algorithm of the parameter snapshot involved, when known.
    pub hash_algorithm: Option<String>,
    /// When the operation completed.
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            action,
            outcome,
            file_id: None,
            hash_algorithm: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn with_hash_algorithm(mut self, hash_algorithm: impl Into<String>) -> Self {
        self.hash_algorithm = Some(hash_algorithm.into());
        self
    }
}

/// Records retained in memory when the configuration does not say otherwise.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1024;

/// A bounded, append-only window over the most recent vault operations.
///
/// Once `capacity` records are held, each append evicts the oldest one. A
/// capacity of zero retains nothing; records then live only in sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    records: VecDeque<AuditRecord>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_AUDIT_CAPACITY)),
            capacity,
        }
    }

    /// Append a record, evicting the oldest one if the log is full.
    pub fn append(&mut self, record: AuditRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, AuditRecord> {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Built-in sink: file
// ---------------------------------------------------------------------------

/// Writes audit records as JSON lines (one per record) to a file.
/// Creates the file if it doesn't exist; appends if it does.
pub struct FileAuditSink {
    file: std::fs::File,
}

impl FileAuditSink {
    /// Open or create a file for append-only audit logging.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&mut self, record: AuditRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(%err, "failed to serialize audit record");
                return;
            }
        };
        if let Err(err) = writeln!(self.file, "{line}").and_then(|_| self.file.flush()) {
            tracing::error!(%err, "failed to write audit record");
        }
    }
}
