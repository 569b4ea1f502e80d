//! Vault configuration.
//!
//! The collaborator owns where configuration comes from; this module only
//! defines its shape and validation. A JSON document looks like:
//!
//! ```json
//! {
//!   "parameters": {
//!     "hash_algorithm": "SHA-512", "key_size_bits": 256, "nonce_length_bytes": 32,
//!     "salt_length_bytes": 64, "kdf_iteration_count": 10000, "tag_length_bits": 128
//!   },
//!   "policy": { "minimum_length": 12, "generated_length": 32 },
//!   "audit_capacity": 1024
//! }
//! ```
//!
//! Omitted sections and policy fields fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audit::DEFAULT_AUDIT_CAPACITY;
use crate::error::{Result, VaultError};
use crate::params::SecurityParameters;
use crate::policy::PasswordPolicy;

/// The currently active parameter snapshot and password policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Snapshot attached to every new envelope and credential.
    pub parameters: SecurityParameters,
    pub policy: PasswordPolicy,
    /// Audit records the issuer keeps in memory. `0` sends records to sinks
    /// only.
    pub audit_capacity: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            parameters: SecurityParameters::default(),
            policy: PasswordPolicy::default(),
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl VaultConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VaultError::Configuration(format!("invalid config: {e}")))?;
        config.policy.check()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            VaultError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
