mod support;

use capvault::{
    CapabilityIssuer, EncryptionEnvelope, PasswordPolicy, SecurityParameters, StreamCipherEngine,
    VaultConfig, VaultError, CHUNK_LEN, TAG_LEN,
};
use proptest::prelude::*;

use support::{fast_params, sample_bytes, SeededRandom};

fn engine() -> StreamCipherEngine {
    StreamCipherEngine::with_system_random(PasswordPolicy::default()).unwrap()
}

fn round_trip(
    engine: &StreamCipherEngine,
    params: &SecurityParameters,
    plaintext: &[u8],
) -> Vec<u8> {
    let mut ciphertext = Vec::new();
    let (password, envelope) = engine
        .encrypt(plaintext, &mut ciphertext, params, None)
        .unwrap();

    let mut recovered = Vec::new();
    engine
        .decrypt(password.expose_secret(), &envelope, ciphertext.as_slice(), &mut recovered)
        .unwrap();
    recovered
}

#[test]
fn concrete_scenario() {
    // "FileContent" under SHA-512 / 256-bit key / 32-byte nonce / 64-byte salt /
    // 10 000 iterations / 128-bit tag.
    let params = SecurityParameters::new("SHA-512", 256, 32, 64, 10_000, 128).unwrap();
    let engine = engine();

    let mut ciphertext = Vec::new();
    let (password, envelope) = engine
        .encrypt(&b"FileContent"[..], &mut ciphertext, &params, None)
        .unwrap();
    assert_eq!(ciphertext.len(), 11 + TAG_LEN);

    let mut plaintext = Vec::new();
    engine
        .decrypt(password.expose_secret(), &envelope, ciphertext.as_slice(), &mut plaintext)
        .unwrap();
    assert_eq!(plaintext, b"FileContent");

    let wrong = engine.decrypt("wrong-password", &envelope, ciphertext.as_slice(), Vec::new());
    assert!(matches!(wrong, Err(VaultError::IntegrityCheckFailed)));

    let mut tampered_digest = envelope.integrity_digest().to_vec();
    tampered_digest[0] ^= 0xff;
    let corrupted = EncryptionEnvelope::from_parts(
        envelope.nonce().to_vec(),
        envelope.salt().to_vec(),
        tampered_digest,
        envelope.cipher_iv().to_vec(),
        envelope.parameters().clone(),
    );

    let result = engine.decrypt(
        password.expose_secret(),
        &corrupted,
        ciphertext.as_slice(),
        Vec::new(),
    );
    assert!(matches!(result, Err(VaultError::IntegrityCheckFailed)));
}

#[test]
fn boundary_sizes_round_trip() {
    let engine = engine();
    let params = fast_params();
    for len in [
        0,
        1,
        15,
        16,
        17,
        CHUNK_LEN - 1,
        CHUNK_LEN,
        CHUNK_LEN + 1,
        3 * CHUNK_LEN,
        3 * CHUNK_LEN + 12_345,
    ] {
        let plaintext = sample_bytes(len);
        assert_eq!(round_trip(&engine, &params, &plaintext), plaintext, "len {len}");
    }
}

#[test]
fn every_supported_snapshot_round_trips() {
    let engine = engine();
    for hash in ["SHA-256", "SHA-384", "SHA-512"] {
        for key_bits in [128, 256] {
            let params = SecurityParameters::new(hash, key_bits, 12, 16, 2, 128).unwrap();
            let plaintext = sample_bytes(1000);
            assert_eq!(round_trip(&engine, &params, &plaintext), plaintext);
        }
    }
}

#[test]
fn old_records_survive_parameter_upgrade() {
    let old_config = VaultConfig {
        parameters: SecurityParameters::new("SHA-256", 128, 12, 16, 2, 128).unwrap(),
        ..VaultConfig::default()
    };
    let old_issuer = CapabilityIssuer::new(old_config).unwrap();
    let mut ciphertext = Vec::new();
    let (password, envelope) = old_issuer
        .issue_for_upload(&b"legacy upload"[..], &mut ciphertext)
        .unwrap();

    // Persist and reload the envelope the way a collaborator would.
    let stored = envelope.to_json().unwrap();

    let new_config = VaultConfig {
        parameters: SecurityParameters::new("SHA-512", 256, 32, 64, 3, 128).unwrap(),
        ..VaultConfig::default()
    };
    let new_issuer = CapabilityIssuer::new(new_config).unwrap();
    let reloaded = EncryptionEnvelope::from_json(&stored).unwrap();
    assert_eq!(reloaded.parameters().hash_algorithm(), "SHA-256");

    let mut plaintext = Vec::new();
    new_issuer
        .resolve_for_download(
            password.expose_secret(),
            &reloaded,
            ciphertext.as_slice(),
            &mut plaintext,
        )
        .unwrap();
    assert_eq!(plaintext, b"legacy upload");

    let (_, fresh) = new_issuer
        .issue_for_upload(&b"new upload"[..], Vec::new())
        .unwrap();
    assert_eq!(fresh.parameters().hash_algorithm(), "SHA-512");
}

#[test]
fn injected_randomness_makes_encryption_reproducible() {
    let a = StreamCipherEngine::new(SeededRandom::new(7), PasswordPolicy::default()).unwrap();
    let b = StreamCipherEngine::new(SeededRandom::new(7), PasswordPolicy::default()).unwrap();

    let mut ct_a = Vec::new();
    let mut ct_b = Vec::new();
    let (pw_a, env_a) = a.encrypt(&b"same input"[..], &mut ct_a, &fast_params(), None).unwrap();
    let (pw_b, env_b) = b.encrypt(&b"same input"[..], &mut ct_b, &fast_params(), None).unwrap();

    assert_eq!(pw_a, pw_b);
    assert_eq!(env_a, env_b);
    assert_eq!(ct_a, ct_b);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn arbitrary_plaintext_round_trips(
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let engine = engine();
        prop_assert_eq!(round_trip(&engine, &fast_params(), &plaintext), plaintext);
    }
}
