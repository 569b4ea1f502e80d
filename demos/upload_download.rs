//! Minimal example: an upload handed back as a capability, then downloaded.
//!
//! Demonstrates capability issuance, envelope storage, credential handling and
//! audit logging with file persistence.
//! Run with: `RUST_LOG=capvault=debug cargo run --example upload_download`

use capvault::audit::FileAuditSink;
use capvault::{CapabilityIssuer, EnvelopeStore, MemoryEnvelopeStore, VaultConfig, VaultError};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 1. Setup
    let issuer = CapabilityIssuer::new(VaultConfig::default())?;
    let store = MemoryEnvelopeStore::new();

    // Optional: persist audit log to file
    let audit_path = PathBuf::from(std::env::temp_dir()).join("capvault_audit.jsonl");
    issuer.add_audit_sink(Box::new(FileAuditSink::new(&audit_path)?));

    // 2. Upload: the password is the capability; only the envelope is kept
    let mut ciphertext = Vec::new();
    let password = issuer.issue_and_store(
        &store,
        "invoice-2291",
        &b"Invoice #2291, amount due: 420.00"[..],
        &mut ciphertext,
    )?;
    println!("Uploaded invoice-2291 ({} ciphertext bytes)", ciphertext.len());
    println!("Share link: /download/invoice-2291?key={}", password.expose_secret());
    println!("Stored envelope: {}", store.get("invoice-2291")?.to_json()?);

    // 3. Download with the capability
    let mut plaintext = Vec::new();
    issuer.resolve_by_id(
        &store,
        "invoice-2291",
        password.expose_secret(),
        ciphertext.as_slice(),
        &mut plaintext,
    )?;
    println!("Downloaded: {}", String::from_utf8_lossy(&plaintext));

    // 4. A wrong capability is indistinguishable from tampering
    let guessed = issuer.resolve_by_id(
        &store,
        "invoice-2291",
        "guessed-key",
        ciphertext.as_slice(),
        Vec::new(),
    );
    match guessed {
        Err(VaultError::IntegrityCheckFailed) => println!("Wrong key rejected"),
        other => println!("Unexpected: {other:?}"),
    }

    // 5. Credentials
    let (initial, credential) = issuer.issue_initial_credential()?;
    let credential =
        issuer.change_credential(&credential, initial.expose_secret(), "My-Own-Choice-42")?;
    println!(
        "Credential verifies: {}",
        issuer.verify_credential(&credential, "My-Own-Choice-42")?
    );

    // 6. Audit log
    let log = issuer.audit_log();
    println!("Audit log: {} record(s)", log.len());
    for record in log.iter() {
        println!(
            "  {:?} {:?} {} @ {:?}",
            record.action,
            record.outcome,
            record.file_id.as_deref().unwrap_or("-"),
            record.timestamp
        );
    }
    println!("Full audit also written to: {}", audit_path.display());

    Ok(())
}
