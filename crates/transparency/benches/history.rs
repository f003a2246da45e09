use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use veritree_crypto::{Digest, HashAlgorithm};
use veritree_storage::MemStore;
use veritree_transparency::history::HistoryTree;

fn event(version: u64) -> Digest {
    HashAlgorithm::Sha256
        .hasher()
        .digest(&[&version.to_be_bytes()])
}

fn populated(n: u64) -> (HistoryTree, Arc<MemStore>) {
    let store = Arc::new(MemStore::new());
    let mut tree = HistoryTree::new(HashAlgorithm::Sha256, store.clone(), 1 << 12);
    for version in 0..n {
        let (_, mutations) = tree.add(&event(version), version).unwrap();
        store.mutate(&mutations).unwrap();
    }
    (tree, store)
}

fn bench_add(c: &mut Criterion) {
    c.bench_function("history add 1k", |b| {
        b.iter(|| {
            let store = Arc::new(MemStore::new());
            let mut tree = HistoryTree::new(HashAlgorithm::Sha256, store.clone(), 1 << 12);
            for version in 0..1000 {
                let (_, mutations) = tree.add(&event(version), version).unwrap();
                store.mutate(&mutations).unwrap();
            }
        })
    });
}

fn bench_prove_membership(c: &mut Criterion) {
    let (tree, _store) = populated(1024);
    let mut index = 0u64;
    c.bench_function("history prove membership @1k", |b| {
        b.iter(|| {
            index = (index + 7) % 1024;
            tree.prove_membership(index, 1023).unwrap()
        })
    });
}

fn bench_prove_consistency(c: &mut Criterion) {
    let (tree, _store) = populated(1024);
    let mut start = 0u64;
    c.bench_function("history prove consistency @1k", |b| {
        b.iter(|| {
            start = (start + 13) % 1023;
            tree.prove_consistency(start, 1023).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_add,
    bench_prove_membership,
    bench_prove_consistency
);
criterion_main!(benches);
