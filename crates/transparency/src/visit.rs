//! Pruned operation trees and the visitors that walk them.
//!
//! A pruner builds one [`Pruned`] value tree per operation; it lives for
//! that call only. Visitors compose by wrapping: the outer visitor receives
//! the digest the inner visitor produced for each node, so a write path
//! stacks compute-hash → caching → collect-mutations while a proof path
//! stacks compute-hash → audit-path. Composition is fixed at construction.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use veritree_crypto::{Digest, Hasher};
use veritree_storage::{Mutation, Prefix};

use crate::cache::{Cache, ModifiableCache};
use crate::position::TreePosition;

/// A node of a pruned operation tree.
///
/// `Collectable` marks the digests an operation wants back out: the insert
/// pruners wrap nodes whose hashes must be cached and persisted, the search
/// pruners wrap the audit-path siblings a proof must carry.
#[derive(Debug)]
pub enum Pruned<P: TreePosition> {
    /// A leaf carrying its payload bytes.
    Leaf { pos: P, value: Vec<u8> },
    /// A node whose digest was served by a cache; its subtree is elided.
    Cached { pos: P, digest: Digest },
    /// A hyper-tree node whose subtree is entirely empty.
    Default { pos: P },
    /// An interior node computed from both children.
    Computed {
        pos: P,
        left: Box<Pruned<P>>,
        right: Box<Pruned<P>>,
    },
    /// A history frontier node whose right subtree has no events yet.
    Partial { pos: P, left: Box<Pruned<P>> },
    /// Marks the wrapped node's digest for collection by an outer visitor.
    Collectable { pos: P, child: Box<Pruned<P>> },
}

impl<P: TreePosition> Pruned<P> {
    /// The position this node addresses.
    pub fn pos(&self) -> &P {
        match self {
            Pruned::Leaf { pos, .. }
            | Pruned::Cached { pos, .. }
            | Pruned::Default { pos }
            | Pruned::Computed { pos, .. }
            | Pruned::Partial { pos, .. }
            | Pruned::Collectable { pos, .. } => pos,
        }
    }

    /// Walks the tree bottom-up, producing the root digest.
    pub fn post_order<V: Visitor<P>>(&self, visitor: &mut V) -> Digest {
        match self {
            Pruned::Leaf { pos, value } => visitor.visit_leaf(pos, value),
            Pruned::Cached { pos, digest } => visitor.visit_cached(pos, digest),
            Pruned::Default { pos } => visitor.visit_default(pos),
            Pruned::Computed { pos, left, right } => {
                let left = left.post_order(visitor);
                let right = right.post_order(visitor);
                visitor.visit_computed(pos, left, right)
            }
            Pruned::Partial { pos, left } => {
                let left = left.post_order(visitor);
                visitor.visit_partial(pos, left)
            }
            Pruned::Collectable { pos, child } => {
                let digest = child.post_order(visitor);
                visitor.visit_collectable(pos, digest)
            }
        }
    }
}

/// One callback per [`Pruned`] variant, driven in post-order.
pub trait Visitor<P: TreePosition> {
    fn visit_leaf(&mut self, pos: &P, value: &[u8]) -> Digest;
    fn visit_cached(&mut self, pos: &P, digest: &Digest) -> Digest;
    fn visit_default(&mut self, pos: &P) -> Digest;
    fn visit_computed(&mut self, pos: &P, left: Digest, right: Digest) -> Digest;
    fn visit_partial(&mut self, pos: &P, left: Digest) -> Digest;
    fn visit_collectable(&mut self, pos: &P, child: Digest) -> Digest;
}

/// The innermost visitor: realizes the hash contract.
///
/// Leaves and interior nodes are salted with their position bytes; partial
/// frontier nodes hash only their left child; cached digests pass through;
/// default nodes come from the per-height empty-subtree table.
pub struct ComputeHashVisitor<'a> {
    hasher: &'a dyn Hasher,
    default_hashes: &'a [Digest],
}

impl<'a> ComputeHashVisitor<'a> {
    /// For trees that never produce `Default` nodes.
    pub fn new(hasher: &'a dyn Hasher) -> Self {
        Self {
            hasher,
            default_hashes: &[],
        }
    }

    pub fn with_defaults(hasher: &'a dyn Hasher, default_hashes: &'a [Digest]) -> Self {
        Self {
            hasher,
            default_hashes,
        }
    }
}

impl<P: TreePosition> Visitor<P> for ComputeHashVisitor<'_> {
    fn visit_leaf(&mut self, pos: &P, value: &[u8]) -> Digest {
        self.hasher.salted(&pos.bytes(), &[value])
    }

    fn visit_cached(&mut self, _pos: &P, digest: &Digest) -> Digest {
        digest.clone()
    }

    fn visit_default(&mut self, pos: &P) -> Digest {
        self.default_hashes[pos.height() as usize].clone()
    }

    fn visit_computed(&mut self, pos: &P, left: Digest, right: Digest) -> Digest {
        self.hasher
            .salted(&pos.bytes(), &[left.as_ref(), right.as_ref()])
    }

    fn visit_partial(&mut self, pos: &P, left: Digest) -> Digest {
        self.hasher.salted(&pos.bytes(), &[left.as_ref()])
    }

    fn visit_collectable(&mut self, _pos: &P, child: Digest) -> Digest {
        child
    }
}

/// Writes collectable digests into a modifiable cache.
pub struct CachingVisitor<'a, V> {
    inner: V,
    cache: &'a mut dyn ModifiableCache,
}

impl<'a, V> CachingVisitor<'a, V> {
    pub fn new(inner: V, cache: &'a mut dyn ModifiableCache) -> Self {
        Self { inner, cache }
    }
}

impl<P: TreePosition, V: Visitor<P>> Visitor<P> for CachingVisitor<'_, V> {
    fn visit_leaf(&mut self, pos: &P, value: &[u8]) -> Digest {
        self.inner.visit_leaf(pos, value)
    }

    fn visit_cached(&mut self, pos: &P, digest: &Digest) -> Digest {
        self.inner.visit_cached(pos, digest)
    }

    fn visit_default(&mut self, pos: &P) -> Digest {
        self.inner.visit_default(pos)
    }

    fn visit_computed(&mut self, pos: &P, left: Digest, right: Digest) -> Digest {
        self.inner.visit_computed(pos, left, right)
    }

    fn visit_partial(&mut self, pos: &P, left: Digest) -> Digest {
        self.inner.visit_partial(pos, left)
    }

    fn visit_collectable(&mut self, pos: &P, child: Digest) -> Digest {
        let digest = self.inner.visit_collectable(pos, child);
        self.cache.put(pos.bytes(), digest.clone());
        digest
    }
}

/// Queues a durable mutation for every collectable digest.
pub struct CollectMutationsVisitor<V> {
    inner: V,
    prefix: Prefix,
    mutations: Vec<Mutation>,
}

impl<V> CollectMutationsVisitor<V> {
    pub fn new(inner: V, prefix: Prefix) -> Self {
        Self {
            inner,
            prefix,
            mutations: Vec::new(),
        }
    }

    /// The mutation batch gathered during the walk.
    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

impl<P: TreePosition, V: Visitor<P>> Visitor<P> for CollectMutationsVisitor<V> {
    fn visit_leaf(&mut self, pos: &P, value: &[u8]) -> Digest {
        self.inner.visit_leaf(pos, value)
    }

    fn visit_cached(&mut self, pos: &P, digest: &Digest) -> Digest {
        self.inner.visit_cached(pos, digest)
    }

    fn visit_default(&mut self, pos: &P) -> Digest {
        self.inner.visit_default(pos)
    }

    fn visit_computed(&mut self, pos: &P, left: Digest, right: Digest) -> Digest {
        self.inner.visit_computed(pos, left, right)
    }

    fn visit_partial(&mut self, pos: &P, left: Digest) -> Digest {
        self.inner.visit_partial(pos, left)
    }

    fn visit_collectable(&mut self, pos: &P, child: Digest) -> Digest {
        let digest = self.inner.visit_collectable(pos, child);
        self.mutations.push(Mutation::new(
            self.prefix,
            pos.bytes(),
            digest.as_bytes().to_vec(),
        ));
        digest
    }
}

/// Records collectable digests into an [`AuditPath`].
pub struct AuditPathVisitor<V> {
    inner: V,
    path: AuditPath,
}

impl<V> AuditPathVisitor<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            path: AuditPath::default(),
        }
    }

    /// The audit path gathered during the walk.
    pub fn into_path(self) -> AuditPath {
        self.path
    }
}

impl<P: TreePosition, V: Visitor<P>> Visitor<P> for AuditPathVisitor<V> {
    fn visit_leaf(&mut self, pos: &P, value: &[u8]) -> Digest {
        self.inner.visit_leaf(pos, value)
    }

    fn visit_cached(&mut self, pos: &P, digest: &Digest) -> Digest {
        self.inner.visit_cached(pos, digest)
    }

    fn visit_default(&mut self, pos: &P) -> Digest {
        self.inner.visit_default(pos)
    }

    fn visit_computed(&mut self, pos: &P, left: Digest, right: Digest) -> Digest {
        self.inner.visit_computed(pos, left, right)
    }

    fn visit_partial(&mut self, pos: &P, left: Digest) -> Digest {
        self.inner.visit_partial(pos, left)
    }

    fn visit_collectable(&mut self, pos: &P, child: Digest) -> Digest {
        let digest = self.inner.visit_collectable(pos, child);
        self.path.insert(pos.bytes(), digest.clone());
        digest
    }
}

/// The sibling digests a verifier needs to recompute a root, keyed by
/// position bytes.
///
/// Implements [`Cache`] so verification can run the same pruned traversal
/// as proving, with the proof itself as the hash source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPath {
    entries: BTreeMap<Vec<u8>, Digest>,
}

impl AuditPath {
    pub fn insert(&mut self, position: Vec<u8>, digest: Digest) {
        self.entries.insert(position, digest);
    }

    pub fn get(&self, position: &[u8]) -> Option<&Digest> {
        self.entries.get(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Digest)> {
        self.entries.iter()
    }
}

impl Cache for AuditPath {
    fn get(&self, key: &[u8]) -> Option<Digest> {
        self.entries.get(key).cloned()
    }
}

/// Renders a pruned tree top-down for debug logging.
pub struct PrintVisitor;

impl PrintVisitor {
    pub fn render<P: TreePosition>(tree: &Pruned<P>) -> String {
        let mut out = String::new();
        Self::walk(tree, 0, &mut out);
        out
    }

    fn walk<P: TreePosition>(node: &Pruned<P>, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        let _ = match node {
            Pruned::Leaf { pos, value } => {
                writeln!(out, "{pad}leaf {pos:?} value={}", hex::encode(value))
            }
            Pruned::Cached { pos, digest } => writeln!(out, "{pad}cached {pos:?} {digest}"),
            Pruned::Default { pos } => writeln!(out, "{pad}default {pos:?}"),
            Pruned::Computed { pos, .. } => writeln!(out, "{pad}node {pos:?}"),
            Pruned::Partial { pos, .. } => writeln!(out, "{pad}partial {pos:?}"),
            Pruned::Collectable { pos, .. } => writeln!(out, "{pad}collectable {pos:?}"),
        };
        match node {
            Pruned::Computed { left, right, .. } => {
                Self::walk(left, depth + 1, out);
                Self::walk(right, depth + 1, out);
            }
            Pruned::Partial { left, .. } => Self::walk(left, depth + 1, out),
            Pruned::Collectable { child, .. } => Self::walk(child, depth + 1, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SimpleCache;
    use pretty_assertions::assert_eq;
    use veritree_crypto::HashAlgorithm;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct TestPosition(u8, u16);

    impl TreePosition for TestPosition {
        fn bytes(&self) -> Vec<u8> {
            vec![self.0, self.1 as u8]
        }

        fn height(&self) -> u16 {
            self.1
        }
    }

    /// node(0,1) over leaf(0) and a collectable cached leaf(1).
    fn sample() -> Pruned<TestPosition> {
        Pruned::Collectable {
            pos: TestPosition(0, 1),
            child: Box::new(Pruned::Computed {
                pos: TestPosition(0, 1),
                left: Box::new(Pruned::Leaf {
                    pos: TestPosition(0, 0),
                    value: vec![0x0f],
                }),
                right: Box::new(Pruned::Collectable {
                    pos: TestPosition(1, 0),
                    child: Box::new(Pruned::Cached {
                        pos: TestPosition(1, 0),
                        digest: Digest::new(vec![0xf0]),
                    }),
                }),
            }),
        }
    }

    #[test]
    fn test_compute_hash_chain() {
        let hasher = HashAlgorithm::Xor.hasher();
        let mut compute = ComputeHashVisitor::new(&*hasher);

        // XOR folds: leaf 0x0f, cached 0xf0, node 0x0f ^ 0xf0 = 0xff.
        assert_eq!(sample().post_order(&mut compute), Digest::new(vec![0xff]));
    }

    #[test]
    fn test_caching_visitor_records_collectables() {
        let hasher = HashAlgorithm::Xor.hasher();
        let mut cache = SimpleCache::new();
        let compute = ComputeHashVisitor::new(&*hasher);
        let mut caching = CachingVisitor::new(compute, &mut cache);

        let root = sample().post_order(&mut caching);
        assert_eq!(root, Digest::new(vec![0xff]));
        assert_eq!(cache.size(), 2);
        assert_eq!(
            Cache::get(&cache, &TestPosition(0, 1).bytes()),
            Some(Digest::new(vec![0xff]))
        );
        assert_eq!(
            Cache::get(&cache, &TestPosition(1, 0).bytes()),
            Some(Digest::new(vec![0xf0]))
        );
    }

    #[test]
    fn test_collect_mutations_visitor_queues_batch() {
        let hasher = HashAlgorithm::Xor.hasher();
        let mut cache = SimpleCache::new();
        let compute = ComputeHashVisitor::new(&*hasher);
        let caching = CachingVisitor::new(compute, &mut cache);
        let mut collect = CollectMutationsVisitor::new(caching, Prefix::HistoryCache);

        sample().post_order(&mut collect);
        let mutations = collect.into_mutations();

        assert_eq!(mutations.len(), 2);
        // Post-order: the cached leaf surfaces before its parent.
        assert_eq!(mutations[0].key, TestPosition(1, 0).bytes());
        assert_eq!(mutations[0].value, vec![0xf0]);
        assert_eq!(mutations[1].key, TestPosition(0, 1).bytes());
        assert_eq!(mutations[1].value, vec![0xff]);
        assert!(mutations.iter().all(|m| m.prefix == Prefix::HistoryCache));
    }

    #[test]
    fn test_audit_path_visitor_records_collectables() {
        let hasher = HashAlgorithm::Xor.hasher();
        let compute = ComputeHashVisitor::new(&*hasher);
        let mut audit = AuditPathVisitor::new(compute);

        sample().post_order(&mut audit);
        let path = audit.into_path();

        assert_eq!(path.len(), 2);
        assert_eq!(
            path.get(&TestPosition(1, 0).bytes()),
            Some(&Digest::new(vec![0xf0]))
        );
    }

    #[test]
    fn test_default_nodes_use_the_table() {
        let hasher = HashAlgorithm::Xor.hasher();
        let defaults = vec![Digest::new(vec![0x00]), Digest::new(vec![0x11])];
        let mut compute = ComputeHashVisitor::with_defaults(&*hasher, &defaults);

        let node = Pruned::Default {
            pos: TestPosition(0, 1),
        };
        assert_eq!(node.post_order(&mut compute), Digest::new(vec![0x11]));
    }

    #[test]
    fn test_print_visitor_renders_structure() {
        let rendered = PrintVisitor::render(&sample());
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("collectable"));
        assert!(lines[1].trim_start().starts_with("node"));
        assert!(lines[2].contains("leaf"));
    }
}
