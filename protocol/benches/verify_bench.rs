// Verifier-pipeline benchmarks.
//
// Covers the Groth16 setup, proof generation, and the consensus-side
// verification entry points, plus the serial/commitment primitives that
// feed them. Verification is the number that matters: it runs on the
// consensus thread for every confidential transaction.

use criterion::{criterion_group, criterion_main, Criterion};

use ark_std::rand::{rngs::StdRng, SeedableRng};

use veil_protocol::crypto::hash::keccak256;
use veil_protocol::zk::primitives::{comm, initial_serial, prf};
use veil_protocol::zk::prover::TransferProver;

fn bench_setup(c: &mut Criterion) {
    c.bench_function("zk/dev_ceremony_setup", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(42);
            TransferProver::setup(&mut rng)
        });
    });
}

fn bench_primitives(c: &mut Criterion) {
    let a = keccak256(b"a");
    let r = keccak256(b"r");

    c.bench_function("zk/prf", |b| b.iter(|| prf(&a, &r)));
    c.bench_function("zk/comm", |b| b.iter(|| comm(1_000_000, &r)));
    c.bench_function("zk/initial_serial", |b| b.iter(initial_serial));
}

fn bench_prove_mint(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let (prover, _verifier) = TransferProver::setup(&mut rng);

    let old = keccak256(b"old balance");
    let serial = keccak256(b"serial");
    let commitment = keccak256(b"new balance");

    c.bench_function("zk/prove_mint", |b| {
        b.iter(|| prover.prove_mint(&old, &serial, &commitment, 500).unwrap());
    });
}

fn bench_verify_mint(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let (prover, verifier) = TransferProver::setup(&mut rng);

    let old = keccak256(b"old balance");
    let serial = keccak256(b"serial");
    let commitment = keccak256(b"new balance");
    let proof = prover
        .prove_mint(&old, &serial, &commitment, 500)
        .unwrap()
        .to_bytes();

    c.bench_function("zk/verify_mint", |b| {
        b.iter(|| {
            verifier
                .verify_mint(&old, &serial, &commitment, 500, &proof)
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_setup,
    bench_primitives,
    bench_prove_mint,
    bench_verify_mint
);
criterion_main!(benches);
