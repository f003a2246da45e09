//! The hyper tree: a fixed-depth sparse Merkle tree keyed by event digest.
//!
//! One reader/writer lock serializes mutations (`add`, `rebuild_cache`)
//! against shared-mode queries; verification is lock-free because a proof's
//! audit path is self-contained.

mod position;
mod proof;
mod pruner;
mod resolver;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use veritree_crypto::{Digest, HashAlgorithm, Hasher};
use veritree_storage::{Mutation, Prefix, Store, StoreError};

use crate::cache::{Cache, ModifiableCache, SimpleCache};
use crate::error::TreeError;
use crate::metrics;
use crate::position::TreePosition;
use crate::visit::{AuditPathVisitor, CachingVisitor, CollectMutationsVisitor, ComputeHashVisitor};

pub use position::{HyperNavigator, HyperPosition};
pub use proof::QueryProof;
pub use pruner::{InsertPruner, PruningContext, SearchPruner, VerifyPruner};
pub use resolver::SingleTargetedCacheResolver;

/// The per-height hashes of entirely empty subtrees.
///
/// `table[0]` is `H(0x00, 0x00)` and each later entry hashes the previous
/// one with itself.
pub(crate) fn default_hashes(hasher: &dyn Hasher) -> Vec<Digest> {
    let bits = hasher.output_bits() as usize;
    let mut table = Vec::with_capacity(bits);
    table.push(hasher.digest(&[&[0x00], &[0x00]]));
    for height in 1..bits {
        let previous = &table[height - 1];
        table.push(hasher.digest(&[previous.as_ref(), previous.as_ref()]));
    }
    table
}

/// The digest-keyed sparse Merkle tree over all appended events.
pub struct HyperTree {
    algorithm: HashAlgorithm,
    hasher: Box<dyn Hasher>,
    store: Arc<dyn Store>,
    cache_level: u16,
    default_hashes: Vec<Digest>,
    cache: RwLock<SimpleCache>,
    closed: AtomicBool,
}

impl HyperTree {
    /// Builds a hyper tree over `store` and warms its cache from the
    /// persisted band.
    pub fn new(algorithm: HashAlgorithm, store: Arc<dyn Store>) -> Result<Self, TreeError> {
        let hasher = algorithm.hasher();
        let bits = hasher.output_bits();
        let cache_level = bits - (bits / 10).max(2);
        let default_hashes = default_hashes(&*hasher);

        let tree = Self {
            algorithm,
            hasher,
            store,
            cache_level,
            default_hashes,
            cache: RwLock::new(SimpleCache::new()),
            closed: AtomicBool::new(false),
        };
        tree.rebuild_cache()?;
        Ok(tree)
    }

    fn ensure_open(&self) -> Result<(), TreeError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TreeError::Closed);
        }
        Ok(())
    }

    fn resolver(&self, key: &Digest) -> SingleTargetedCacheResolver {
        SingleTargetedCacheResolver::new(
            self.hasher.output_bits(),
            self.cache_level,
            key.as_bytes().to_vec(),
        )
    }

    /// Inserts the event digest at `version`, returning the new commitment
    /// and the mutation batch, which always ends with the
    /// `(IndexPrefix, digest, version)` row.
    pub fn add(
        &self,
        event_digest: &Digest,
        version: u64,
    ) -> Result<(Digest, Vec<Mutation>), TreeError> {
        self.ensure_open()?;
        metrics::HYPER_OPS.with_label_values(&["add"]).inc();
        tracing::debug!(version, "inserting event into hyper tree");

        let mut cache = self.cache.write();
        let resolver = self.resolver(event_digest);
        let value = version.to_be_bytes().to_vec();
        let pruned = {
            let context = PruningContext {
                navigator: HyperNavigator::new(self.hasher.output_bits()),
                resolver: &resolver,
                cache: &*cache,
                store: &*self.store,
                default_hashes: &self.default_hashes,
            };
            InsertPruner::new(event_digest.as_bytes().to_vec(), value.clone(), context).prune()?
        };

        let compute = ComputeHashVisitor::with_defaults(&*self.hasher, &self.default_hashes);
        let caching = CachingVisitor::new(compute, &mut *cache);
        let mut collect = CollectMutationsVisitor::new(caching, Prefix::HyperCache);
        let root = pruned.post_order(&mut collect);

        let mut mutations = collect.into_mutations();
        mutations.push(Mutation::new(
            Prefix::Index,
            event_digest.as_bytes().to_vec(),
            value,
        ));
        Ok((root, mutations))
    }

    /// Looks the event digest up and, when present, builds a proof of its
    /// membership; `None` means the digest was never inserted.
    pub fn query_membership(
        &self,
        event_digest: &Digest,
    ) -> Result<Option<QueryProof>, TreeError> {
        self.ensure_open()?;
        metrics::HYPER_OPS.with_label_values(&["query_membership"]).inc();
        tracing::debug!(event = %event_digest, "querying hyper membership");

        let pair = match self.store.get(Prefix::Index, event_digest.as_bytes()) {
            Ok(pair) => pair,
            Err(StoreError::KeyNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let cache = self.cache.read();
        let resolver = self.resolver(event_digest);
        let context = PruningContext {
            navigator: HyperNavigator::new(self.hasher.output_bits()),
            resolver: &resolver,
            cache: &*cache,
            store: &*self.store,
            default_hashes: &self.default_hashes,
        };
        let pruned = SearchPruner::new(event_digest.as_bytes().to_vec(), context).prune()?;

        let compute = ComputeHashVisitor::with_defaults(&*self.hasher, &self.default_hashes);
        let mut audit = AuditPathVisitor::new(compute);
        pruned.post_order(&mut audit);

        Ok(Some(QueryProof::new(
            Digest::from(pair.key),
            pair.value,
            audit.into_path(),
            self.algorithm,
        )))
    }

    /// Checks a proof against an expected commitment.
    ///
    /// Lock-free: the proof's audit path is the only hash source, so
    /// verification never touches the store or the cache.
    pub fn verify_membership(
        &self,
        proof: &QueryProof,
        version: u64,
        event_digest: &Digest,
        expected: &Digest,
    ) -> bool {
        metrics::HYPER_OPS.with_label_values(&["verify_membership"]).inc();
        proof.verify(version, event_digest, expected)
    }

    /// Warms the in-memory cache from the persisted band, then recomputes
    /// every interior position above the cache level bottom-up,
    /// substituting the empty-subtree hash for absent children. A fresh
    /// store leaves the cache empty.
    pub fn rebuild_cache(&self) -> Result<(), TreeError> {
        self.ensure_open()?;
        tracing::info!("warming up hyper cache");

        let mut cache = self.cache.write();
        let rows = self.store.get_all(Prefix::HyperCache)?;
        let boundary: Vec<HyperPosition> = rows
            .iter()
            .filter_map(|pair| HyperPosition::parse(&pair.key))
            .filter(|pos| pos.height() == self.cache_level + 1)
            .collect();
        cache.fill(&mut rows.into_iter().map(|pair| (pair.key, Digest::from(pair.value))));

        if cache.size() == 0 {
            tracing::info!("warm-up done, cache empty");
            return Ok(());
        }

        let navigator = HyperNavigator::new(self.hasher.output_bits());
        let mut current = boundary;
        while let Some(first) = current.first() {
            if first.height() + 1 >= self.hasher.output_bits() {
                // The root is recomputed by every operation.
                break;
            }
            let mut parents: Vec<HyperPosition> =
                current.iter().map(|pos| navigator.parent(pos)).collect();
            parents.sort();
            parents.dedup();

            for parent in &parents {
                let left = navigator.left(parent);
                let right = navigator.right(parent);
                let left_digest = cache
                    .get(&left.bytes())
                    .unwrap_or_else(|| self.default_hashes[left.height() as usize].clone());
                let right_digest = cache
                    .get(&right.bytes())
                    .unwrap_or_else(|| self.default_hashes[right.height() as usize].clone());
                let digest = self.hasher.salted(
                    &parent.bytes(),
                    &[left_digest.as_ref(), right_digest.as_ref()],
                );
                cache.put(parent.bytes(), digest);
            }
            current = parents;
        }

        tracing::info!(entries = cache.size(), "warm-up done");
        Ok(())
    }

    /// Drops the tree's handles; later mutations and queries fail with
    /// [`TreeError::Closed`]. Verification stays available because it is
    /// stateless.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[cfg(test)]
    fn warm_entries(&self) -> usize {
        self.cache.read().size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use veritree_storage::MemStore;

    fn digest(byte: u8) -> Digest {
        Digest::new(vec![byte])
    }

    fn tree(store: &Arc<MemStore>) -> HyperTree {
        HyperTree::new(HashAlgorithm::Xor, store.clone()).unwrap()
    }

    fn add_and_store(tree: &HyperTree, store: &MemStore, event: &Digest, version: u64) -> Digest {
        let (root, mutations) = tree.add(event, version).unwrap();
        store.mutate(&mutations).unwrap();
        root
    }

    #[test]
    fn test_cache_level_leaves_a_two_level_band() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);
        // 8-bit hash: band at heights 7 and 8.
        assert_eq!(tree.cache_level, 6);
        assert_eq!(tree.default_hashes.len(), 8);
        // XOR of two zero bytes stays zero at every height.
        assert!(tree.default_hashes.iter().all(|d| d == &digest(0x00)));
    }

    #[test]
    fn test_single_insert_round_trips() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);

        let root = add_and_store(&tree, &store, &digest(0xa5), 7);
        // Leaf hash folds be64(7); every sibling is empty.
        assert_eq!(root, digest(0x07));

        let proof = tree.query_membership(&digest(0xa5)).unwrap().unwrap();
        assert_eq!(proof.version(), Some(7));
        assert!(proof.audit_path().is_empty());
        assert!(tree.verify_membership(&proof, 7, &digest(0xa5), &root));
        assert!(!tree.verify_membership(&proof, 8, &digest(0xa5), &root));
        assert!(!tree.verify_membership(&proof, 7, &digest(0xa5), &digest(0x01)));
    }

    #[test]
    fn test_add_batch_carries_band_nodes_and_index_row() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);

        let (_, mutations) = tree.add(&digest(0xa5), 7).unwrap();
        // Two band nodes (heights 7 and 8) plus the index row.
        assert_eq!(mutations.len(), 3);
        assert_eq!(mutations[2].prefix, Prefix::Index);
        assert_eq!(mutations[2].key, vec![0xa5]);
        assert_eq!(mutations[2].value, 7u64.to_be_bytes().to_vec());
        assert!(mutations[..2]
            .iter()
            .all(|m| m.prefix == Prefix::HyperCache));
    }

    #[test]
    fn test_roots_accumulate_over_inserts() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);

        assert_eq!(add_and_store(&tree, &store, &digest(0x00), 0), digest(0x00));
        assert_eq!(add_and_store(&tree, &store, &digest(0xff), 1), digest(0x01));
        assert_eq!(add_and_store(&tree, &store, &digest(0xa5), 2), digest(0x03));
    }

    #[test]
    fn test_query_collects_non_empty_siblings() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);
        add_and_store(&tree, &store, &digest(0x00), 0);
        add_and_store(&tree, &store, &digest(0xff), 1);
        let root = add_and_store(&tree, &store, &digest(0xa5), 2);

        let proof = tree.query_membership(&digest(0xff)).unwrap().unwrap();
        let path = proof.audit_path();
        assert_eq!(path.len(), 2);
        // The left half holds 0x00, the sibling subtree at height 6 holds 0xa5.
        assert_eq!(
            path.get(&HyperPosition::new(vec![0x00], 7).bytes()),
            Some(&digest(0x00))
        );
        assert_eq!(
            path.get(&HyperPosition::new(vec![0x80], 6).bytes()),
            Some(&digest(0x02))
        );

        assert!(tree.verify_membership(&proof, 1, &digest(0xff), &root));
        assert!(!tree.verify_membership(&proof, 2, &digest(0xff), &root));
        assert!(!tree.verify_membership(&proof, 1, &digest(0xa5), &root));
    }

    #[test]
    fn test_query_returns_none_for_absent_digests() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);
        add_and_store(&tree, &store, &digest(0xa5), 0);

        assert!(tree.query_membership(&digest(0x55)).unwrap().is_none());
    }

    #[test]
    fn test_reinsert_updates_the_version() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);
        add_and_store(&tree, &store, &digest(0xa5), 0);
        let root = add_and_store(&tree, &store, &digest(0xa5), 5);

        assert_eq!(root, digest(0x05));
        let proof = tree.query_membership(&digest(0xa5)).unwrap().unwrap();
        assert_eq!(proof.version(), Some(5));
        assert!(tree.verify_membership(&proof, 5, &digest(0xa5), &root));
    }

    #[test]
    fn test_rebuild_cache_is_idempotent() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);
        for (i, byte) in [0x00u8, 0xff, 0xa5, 0x3c].into_iter().enumerate() {
            add_and_store(&tree, &store, &digest(byte), i as u64);
        }

        let warm = tree.warm_entries();
        assert!(warm > 0);
        tree.rebuild_cache().unwrap();
        assert_eq!(tree.warm_entries(), warm);
    }

    #[test]
    fn test_restart_rebuilds_an_equivalent_cache() {
        let store = Arc::new(MemStore::new());
        let first = tree(&store);
        for (i, byte) in [0x00u8, 0xff, 0xa5].into_iter().enumerate() {
            add_and_store(&first, &store, &digest(byte), i as u64);
        }
        let root = add_and_store(&first, &store, &digest(0x3c), 3);

        // A fresh tree over the same store serves identical proofs and
        // extends the log to the same commitment.
        let second = tree(&store);
        assert_eq!(second.warm_entries(), first.warm_entries());
        let proof = second.query_membership(&digest(0xa5)).unwrap().unwrap();
        assert!(second.verify_membership(&proof, 2, &digest(0xa5), &root));

        let (expected, _) = first.add(&digest(0x77), 4).unwrap();
        let (actual, _) = second.add(&digest(0x77), 4).unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_empty_store_leaves_the_cache_cold() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);
        assert_eq!(tree.warm_entries(), 0);
    }

    #[test]
    fn test_verify_rejects_mismatched_digest_width() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);
        let root = add_and_store(&tree, &store, &digest(0xa5), 0);
        let proof = tree.query_membership(&digest(0xa5)).unwrap().unwrap();

        let wide = Digest::new(vec![0xa5, 0x00]);
        assert!(!tree.verify_membership(&proof, 0, &wide, &root));
    }

    #[test]
    fn test_closed_tree_rejects_mutations_and_queries() {
        let store = Arc::new(MemStore::new());
        let tree = tree(&store);
        let root = add_and_store(&tree, &store, &digest(0xa5), 7);
        let proof = tree.query_membership(&digest(0xa5)).unwrap().unwrap();
        tree.close();

        assert!(matches!(tree.add(&digest(0x01), 8), Err(TreeError::Closed)));
        assert!(matches!(
            tree.query_membership(&digest(0xa5)),
            Err(TreeError::Closed)
        ));
        assert!(matches!(tree.rebuild_cache(), Err(TreeError::Closed)));
        // Verification is stateless and keeps working.
        assert!(tree.verify_membership(&proof, 7, &digest(0xa5), &root));
    }
}
