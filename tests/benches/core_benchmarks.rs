//! # Ledger Finality Core Benchmarks
//!
//! | Area | Operation | Scaling |
//! |------|-----------|---------|
//! | lf-02 Dependency Resolution | topological sort of a backchain | linear in edges |
//! | lf-03 Notarisation | canonical request encoding | n log n in inputs |
//! | shared-crypto | Ed25519 sign and verify | constant |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lf_02_dependency_resolution::TopologicalSort;
use lf_03_notarisation::NotarisationRequest;
use rand::seq::SliceRandom;
use rand::Rng;
use shared_crypto::Ed25519KeyPair;
use shared_types::{encoding, SecureHash, StateRef};
use std::collections::BTreeSet;
use std::time::Duration;

// ============================================================================
// LF-02: Topological sort
// ============================================================================

/// A chain of `len` transactions where each also depends on a random
/// earlier one, shuffled.
fn backchain(len: usize) -> Vec<(SecureHash, BTreeSet<SecureHash>)> {
    let mut rng = rand::thread_rng();
    let ids: Vec<SecureHash> = (0..len)
        .map(|i| SecureHash::sha256(&(i as u64).to_le_bytes()))
        .collect();
    let mut nodes: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let mut deps = BTreeSet::new();
            if i > 0 {
                deps.insert(ids[i - 1]);
                deps.insert(ids[rng.gen_range(0..i)]);
            }
            (*id, deps)
        })
        .collect();
    nodes.shuffle(&mut rng);
    nodes
}

fn bench_topological_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("lf-02-topological-sort");
    group.measurement_time(Duration::from_secs(5));

    for size in [10usize, 100, 1_000, 5_000] {
        let nodes = backchain(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sort", size), &nodes, |b, nodes| {
            b.iter(|| {
                let mut sort = TopologicalSort::new();
                for (id, deps) in nodes {
                    sort.add(*id, deps.clone()).unwrap();
                }
                black_box(sort.complete())
            })
        });
    }
    group.finish();
}

// ============================================================================
// LF-03: Request canonicalisation
// ============================================================================

fn bench_request_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("lf-03-request-encoding");
    let tx_id = SecureHash::sha256(b"tx");

    for inputs in [1usize, 16, 256] {
        let mut rng = rand::thread_rng();
        let mut refs: Vec<StateRef> = (0..inputs)
            .map(|i| StateRef::new(SecureHash::sha256(&[(i % 7) as u8]), rng.gen_range(0..4)))
            .collect();
        refs.shuffle(&mut rng);

        group.throughput(Throughput::Elements(inputs as u64));
        group.bench_with_input(BenchmarkId::new("new_and_encode", inputs), &refs, |b, refs| {
            b.iter(|| {
                let request = NotarisationRequest::new(refs.iter().copied(), tx_id);
                black_box(encoding::encode(&request).unwrap())
            })
        });
    }
    group.finish();
}

// ============================================================================
// Signatures
// ============================================================================

fn bench_ed25519(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared-crypto-ed25519");
    let key = Ed25519KeyPair::from_seed([7; 32]);
    let message = SecureHash::sha256(b"transaction id");
    let signature = key.sign(message.as_bytes());
    let public = key.public_key();

    group.bench_function("sign", |b| b.iter(|| black_box(key.sign(message.as_bytes()))));
    group.bench_function("verify", |b| {
        b.iter(|| black_box(public.verify(message.as_bytes(), &signature).is_ok()))
    });
    group.finish();
}

criterion_group!(benches, bench_topological_sort, bench_request_encoding, bench_ed25519);
criterion_main!(benches);
