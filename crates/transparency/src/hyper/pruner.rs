//! Top-down constructors of pruned hyper-tree traversals.
//!
//! Each traversal descends along the key's bits. Above the cache level it
//! consults the warm cache for off-path siblings; at the cache level it
//! fetches the subtree's stored leaves once and builds the dense remainder
//! in memory, treating absent children as empty subtrees.

use veritree_crypto::Digest;
use veritree_storage::{KvPair, Prefix, Store};

use crate::cache::Cache;
use crate::error::TreeError;
use crate::position::TreePosition;
use crate::visit::Pruned;

use super::position::{get_bit, HyperNavigator, HyperPosition};
use super::resolver::SingleTargetedCacheResolver;

/// The ephemeral bundle a pruner traverses with; owns nothing.
pub struct PruningContext<'a> {
    pub navigator: HyperNavigator,
    pub resolver: &'a SingleTargetedCacheResolver,
    pub cache: &'a dyn Cache,
    pub store: &'a dyn Store,
    pub default_hashes: &'a [Digest],
}

impl PruningContext<'_> {
    fn fetch_leaves(&self, pos: &HyperPosition) -> Result<Vec<KvPair>, TreeError> {
        let (start, end) = self.navigator.subtree_range(pos);
        Ok(self.store.get_range(Prefix::Index, &start, &end)?)
    }
}

/// Builds the dense subtree below the cache level from a sorted leaf list.
fn build_dense(
    navigator: &HyperNavigator,
    pos: HyperPosition,
    leaves: &[KvPair],
) -> Pruned<HyperPosition> {
    if leaves.is_empty() {
        return Pruned::Default { pos };
    }
    if pos.is_leaf() {
        return Pruned::Leaf {
            pos,
            value: leaves[0].value.clone(),
        };
    }
    let split_bit = navigator.num_bits() - pos.height();
    let split = leaves.partition_point(|pair| !get_bit(&pair.key, split_bit));
    let left = build_dense(navigator, navigator.left(&pos), &leaves[..split]);
    let right = build_dense(navigator, navigator.right(&pos), &leaves[split..]);
    Pruned::Computed {
        pos,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn collectable(node: Pruned<HyperPosition>) -> Pruned<HyperPosition> {
    let pos = node.pos().clone();
    Pruned::Collectable {
        pos,
        child: Box::new(node),
    }
}

/// Builds the write-path traversal for inserting one `(key, version)` leaf.
///
/// Every on-path node above the cache level is wrapped `Collectable` so its
/// recomputed digest lands in the warm cache and the mutation batch.
pub struct InsertPruner<'a> {
    key: Vec<u8>,
    value: Vec<u8>,
    context: PruningContext<'a>,
}

impl<'a> InsertPruner<'a> {
    pub fn new(key: Vec<u8>, value: Vec<u8>, context: PruningContext<'a>) -> Self {
        Self {
            key,
            value,
            context,
        }
    }

    pub fn prune(&self) -> Result<Pruned<HyperPosition>, TreeError> {
        self.traverse(self.context.navigator.root())
    }

    fn traverse(&self, pos: HyperPosition) -> Result<Pruned<HyperPosition>, TreeError> {
        if self.context.resolver.should_get_from_cache(&pos) {
            return Ok(match self.context.cache.get(&pos.bytes()) {
                Some(digest) => Pruned::Cached { pos, digest },
                None => Pruned::Default { pos },
            });
        }

        if pos.height() <= self.context.resolver.cache_level() {
            let mut leaves = self.context.fetch_leaves(&pos)?;
            if self.context.navigator.descends(&pos, &self.key) {
                upsert(&mut leaves, &self.key, &self.value);
            }
            return Ok(build_dense(&self.context.navigator, pos, &leaves));
        }

        let left = self.traverse(self.context.navigator.left(&pos))?;
        let right = self.traverse(self.context.navigator.right(&pos))?;
        Ok(collectable(Pruned::Computed {
            pos,
            left: Box::new(left),
            right: Box::new(right),
        }))
    }
}

fn upsert(leaves: &mut Vec<KvPair>, key: &[u8], value: &[u8]) {
    match leaves.binary_search_by(|pair| pair.key.as_slice().cmp(key)) {
        Ok(found) => leaves[found].value = value.to_vec(),
        Err(slot) => leaves.insert(slot, KvPair::new(key.to_vec(), value.to_vec())),
    }
}

/// Builds the read-path traversal for a membership query.
///
/// No writes happen; every non-empty off-path sibling is wrapped
/// `Collectable` for the audit-path visitor. Empty siblings stay bare: the
/// verifier substitutes the default hash for any position missing from the
/// proof.
pub struct SearchPruner<'a> {
    key: Vec<u8>,
    context: PruningContext<'a>,
}

impl<'a> SearchPruner<'a> {
    pub fn new(key: Vec<u8>, context: PruningContext<'a>) -> Self {
        Self { key, context }
    }

    pub fn prune(&self) -> Result<Pruned<HyperPosition>, TreeError> {
        self.traverse(self.context.navigator.root())
    }

    fn traverse(&self, pos: HyperPosition) -> Result<Pruned<HyperPosition>, TreeError> {
        if self.context.resolver.should_get_from_cache(&pos) {
            return Ok(match self.context.cache.get(&pos.bytes()) {
                Some(digest) => collectable(Pruned::Cached { pos, digest }),
                None => Pruned::Default { pos },
            });
        }

        if pos.height() <= self.context.resolver.cache_level() {
            let leaves = self.context.fetch_leaves(&pos)?;
            if self.context.navigator.descends(&pos, &self.key) {
                return self.descend(pos, &leaves);
            }
            return Ok(match build_dense(&self.context.navigator, pos, &leaves) {
                node @ Pruned::Default { .. } => node,
                node => collectable(node),
            });
        }

        let left = self.traverse(self.context.navigator.left(&pos))?;
        let right = self.traverse(self.context.navigator.right(&pos))?;
        Ok(Pruned::Computed {
            pos,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Walks the key path inside the dense subtree, collecting the sibling
    /// of every step.
    fn descend(
        &self,
        pos: HyperPosition,
        leaves: &[KvPair],
    ) -> Result<Pruned<HyperPosition>, TreeError> {
        if pos.is_leaf() {
            // The index row exists, so the leaf must be here.
            let pair = leaves
                .iter()
                .find(|pair| pair.key == self.key)
                .ok_or_else(|| TreeError::CacheMiss(format!("{pos:?}")))?;
            return Ok(Pruned::Leaf {
                pos,
                value: pair.value.clone(),
            });
        }

        let navigator = &self.context.navigator;
        let split_bit = navigator.num_bits() - pos.height();
        let split = leaves.partition_point(|pair| !get_bit(&pair.key, split_bit));
        let (left_pos, right_pos) = (navigator.left(&pos), navigator.right(&pos));

        let (node, sibling) = if get_bit(&self.key, split_bit) {
            let sibling = build_dense(navigator, left_pos, &leaves[..split]);
            let node = self.descend(right_pos, &leaves[split..])?;
            (node, sibling)
        } else {
            let sibling = build_dense(navigator, right_pos, &leaves[split..]);
            let node = self.descend(left_pos, &leaves[..split])?;
            (node, sibling)
        };
        let sibling = match sibling {
            empty @ Pruned::Default { .. } => empty,
            other => collectable(other),
        };

        let (left, right) = if get_bit(&self.key, split_bit) {
            (sibling, node)
        } else {
            (node, sibling)
        };
        Ok(Pruned::Computed {
            pos,
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}

/// Rebuilds the root from an audit path acting as the cache.
///
/// Siblings absent from the proof must be empty subtrees; the leaf is
/// recomputed from the caller-supplied version bytes. No store access.
pub struct VerifyPruner<'a> {
    key: Vec<u8>,
    value: Vec<u8>,
    navigator: HyperNavigator,
    cache: &'a dyn Cache,
}

impl<'a> VerifyPruner<'a> {
    pub fn new(key: Vec<u8>, value: Vec<u8>, navigator: HyperNavigator, cache: &'a dyn Cache) -> Self {
        Self {
            key,
            value,
            navigator,
            cache,
        }
    }

    pub fn prune(&self) -> Pruned<HyperPosition> {
        self.traverse(self.navigator.root())
    }

    fn traverse(&self, pos: HyperPosition) -> Pruned<HyperPosition> {
        if !self.navigator.descends(&pos, &self.key) {
            return match self.cache.get(&pos.bytes()) {
                Some(digest) => Pruned::Cached { pos, digest },
                None => Pruned::Default { pos },
            };
        }
        if pos.is_leaf() {
            return Pruned::Leaf {
                pos,
                value: self.value.clone(),
            };
        }
        let left = self.traverse(self.navigator.left(&pos));
        let right = self.traverse(self.navigator.right(&pos));
        Pruned::Computed {
            pos,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}
