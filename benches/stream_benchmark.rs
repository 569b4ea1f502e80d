use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use capvault::{PasswordPolicy, SecurityParameters, StreamCipherEngine};

fn benchmark_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");

    // One iteration keeps PBKDF2 out of the throughput numbers.
    let params = SecurityParameters::new("SHA-512", 256, 32, 64, 1, 128).unwrap();
    let engine = StreamCipherEngine::with_system_random(PasswordPolicy::default()).unwrap();

    let sizes = [("1KB", 1024), ("64KB", 64 * 1024), ("1MB", 1024 * 1024)];

    for (name, size) in sizes {
        let payload = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(
            criterion::BenchmarkId::new("encrypt", name),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let mut ciphertext = Vec::with_capacity(payload.len() + 64);
                    engine
                        .encrypt(black_box(payload.as_slice()), &mut ciphertext, &params, None)
                        .unwrap();
                    ciphertext
                });
            },
        );

        let mut ciphertext = Vec::new();
        let (password, envelope) = engine
            .encrypt(payload.as_slice(), &mut ciphertext, &params, None)
            .unwrap();

        group.bench_with_input(
            criterion::BenchmarkId::new("decrypt", name),
            &ciphertext,
            |b, ciphertext| {
                b.iter(|| {
                    let mut plaintext = Vec::with_capacity(size);
                    engine
                        .decrypt(
                            password.expose_secret(),
                            &envelope,
                            black_box(ciphertext.as_slice()),
                            &mut plaintext,
                        )
                        .unwrap();
                    plaintext
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_stream);
criterion_main!(benches);
