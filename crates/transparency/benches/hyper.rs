use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use veritree_crypto::{Digest, HashAlgorithm};
use veritree_storage::MemStore;
use veritree_transparency::hyper::HyperTree;

fn event(version: u64) -> Digest {
    HashAlgorithm::Sha256
        .hasher()
        .digest(&[&version.to_be_bytes()])
}

fn populated(n: u64) -> (HyperTree, Arc<MemStore>) {
    let store = Arc::new(MemStore::new());
    let tree = HyperTree::new(HashAlgorithm::Sha256, store.clone()).unwrap();
    for version in 0..n {
        let (_, mutations) = tree.add(&event(version), version).unwrap();
        store.mutate(&mutations).unwrap();
    }
    (tree, store)
}

fn bench_add(c: &mut Criterion) {
    c.bench_function("hyper add 256", |b| {
        b.iter(|| {
            let store = Arc::new(MemStore::new());
            let tree = HyperTree::new(HashAlgorithm::Sha256, store.clone()).unwrap();
            for version in 0..256 {
                let (_, mutations) = tree.add(&event(version), version).unwrap();
                store.mutate(&mutations).unwrap();
            }
        })
    });
}

fn bench_query_membership(c: &mut Criterion) {
    let (tree, _store) = populated(256);
    let mut version = 0u64;
    c.bench_function("hyper query membership @256", |b| {
        b.iter(|| {
            version = (version + 7) % 256;
            tree.query_membership(&event(version)).unwrap().unwrap()
        })
    });
}

fn bench_verify_membership(c: &mut Criterion) {
    let (tree, store) = populated(256);
    let digest = event(17);
    let proof = tree.query_membership(&digest).unwrap().unwrap();
    let (root, mutations) = tree.add(&event(17), 17).unwrap();
    store.mutate(&mutations).unwrap();
    c.bench_function("hyper verify membership @256", |b| {
        b.iter(|| tree.verify_membership(&proof, 17, &digest, &root))
    });
}

criterion_group!(
    benches,
    bench_add,
    bench_query_membership,
    bench_verify_membership
);
criterion_main!(benches);
