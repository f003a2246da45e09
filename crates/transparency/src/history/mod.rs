//! The history tree: a perfect binary Merkle tree over the event sequence.
//!
//! Serialization of appends is the caller's job (the log sequencer owns a
//! single `add` in flight); proofs may run concurrently with each other and
//! with the writer because the read path only consults durable state.

mod position;
mod proof;
mod pruner;
mod resolver;

use std::sync::Arc;

use veritree_crypto::{Digest, HashAlgorithm, Hasher};
use veritree_storage::{Mutation, Prefix, Store};

use crate::cache::{LruReadThroughCache, PassThroughCache};
use crate::error::TreeError;
use crate::metrics;
use crate::visit::{
    AuditPathVisitor, CachingVisitor, CollectMutationsVisitor, ComputeHashVisitor, PrintVisitor,
};

pub use position::{depth, HistoryPosition};
pub use proof::{IncrementalProof, MembershipProof};
pub use pruner::{InsertPruner, PruningContext, SearchPruner, VerifyPruner};
pub use resolver::{
    CacheResolver, DoubleTargetedCacheResolver, IncrementalCacheResolver,
    SingleTargetedCacheResolver,
};

/// The version-indexed Merkle tree over all appended events.
pub struct HistoryTree {
    algorithm: HashAlgorithm,
    hasher: Box<dyn Hasher>,
    write_cache: LruReadThroughCache,
    read_cache: PassThroughCache,
    closed: bool,
}

impl HistoryTree {
    /// Builds a history tree over `store`, keeping up to `cache_size`
    /// frozen hashes warm for the write path.
    pub fn new(algorithm: HashAlgorithm, store: Arc<dyn Store>, cache_size: usize) -> Self {
        Self {
            algorithm,
            hasher: algorithm.hasher(),
            write_cache: LruReadThroughCache::new(Prefix::HistoryCache, store.clone(), cache_size),
            read_cache: PassThroughCache::new(Prefix::HistoryCache, store),
            closed: false,
        }
    }

    /// Appends the event digest at `version`, returning the new commitment
    /// and the mutation batch the caller must persist atomically before the
    /// next version becomes visible.
    pub fn add(
        &mut self,
        event_digest: &Digest,
        version: u64,
    ) -> Result<(Digest, Vec<Mutation>), TreeError> {
        if self.closed {
            return Err(TreeError::Closed);
        }
        metrics::HISTORY_OPS.with_label_values(&["add"]).inc();
        tracing::debug!(version, "appending event to history tree");

        let resolver = SingleTargetedCacheResolver::new(version);
        let pruned = {
            let context = PruningContext {
                resolver: &resolver,
                cache: &self.write_cache,
            };
            InsertPruner::new(version, event_digest.as_bytes(), context).prune()?
        };
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!("pruned insert tree:\n{}", PrintVisitor::render(&pruned));
        }

        let compute = ComputeHashVisitor::new(&*self.hasher);
        let caching = CachingVisitor::new(compute, &mut self.write_cache);
        let mut collect = CollectMutationsVisitor::new(caching, Prefix::HistoryCache);
        let root = pruned.post_order(&mut collect);

        Ok((root, collect.into_mutations()))
    }

    /// Proves that the event at `index` is covered by the commitment at
    /// `version`; requires `index <= version`.
    pub fn prove_membership(
        &self,
        index: u64,
        version: u64,
    ) -> Result<MembershipProof, TreeError> {
        if self.closed {
            return Err(TreeError::Closed);
        }
        metrics::HISTORY_OPS.with_label_values(&["prove_membership"]).inc();
        tracing::debug!(index, version, "proving membership");

        let resolver: Box<dyn CacheResolver> = if index == version {
            Box::new(SingleTargetedCacheResolver::new(version))
        } else {
            Box::new(DoubleTargetedCacheResolver::new(index, version))
        };
        let context = PruningContext {
            resolver: &*resolver,
            cache: &self.read_cache,
        };
        let pruned = SearchPruner::new(version, Some(index), context).prune()?;

        let compute = ComputeHashVisitor::new(&*self.hasher);
        let mut audit = AuditPathVisitor::new(compute);
        pruned.post_order(&mut audit);

        Ok(MembershipProof::new(
            index,
            version,
            audit.into_path(),
            self.algorithm,
        ))
    }

    /// Proves that the commitment at `end` extends the commitment at
    /// `start`; requires `start <= end`.
    pub fn prove_consistency(&self, start: u64, end: u64) -> Result<IncrementalProof, TreeError> {
        if self.closed {
            return Err(TreeError::Closed);
        }
        metrics::HISTORY_OPS.with_label_values(&["prove_consistency"]).inc();
        tracing::debug!(start, end, "proving consistency");

        let resolver = IncrementalCacheResolver::new(start, end);
        let context = PruningContext {
            resolver: &resolver,
            cache: &self.read_cache,
        };
        let pruned = SearchPruner::new(end, None, context).prune()?;

        let compute = ComputeHashVisitor::new(&*self.hasher);
        let mut audit = AuditPathVisitor::new(compute);
        pruned.post_order(&mut audit);

        Ok(IncrementalProof::new(
            start,
            end,
            audit.into_path(),
            self.algorithm,
        ))
    }

    /// Drops the tree's handles; every later operation fails with
    /// [`TreeError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
    }
}
