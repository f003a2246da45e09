//! History proofs and their stateless verification.

use serde::{Deserialize, Serialize};
use veritree_crypto::{Digest, HashAlgorithm};

use crate::error::TreeError;
use crate::visit::{AuditPath, ComputeHashVisitor};

use super::pruner::{PruningContext, VerifyPruner};
use super::resolver::{
    CacheResolver, DoubleTargetedCacheResolver, IncrementalCacheResolver,
    SingleTargetedCacheResolver,
};

/// Proof that the event at `index` is covered by the commitment at
/// `version`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    index: u64,
    version: u64,
    audit_path: AuditPath,
    algorithm: HashAlgorithm,
}

impl MembershipProof {
    pub fn new(
        index: u64,
        version: u64,
        audit_path: AuditPath,
        algorithm: HashAlgorithm,
    ) -> Self {
        Self {
            index,
            version,
            audit_path,
            algorithm,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn audit_path(&self) -> &AuditPath {
        &self.audit_path
    }

    /// Rebuilds the commitment this proof claims, starting from the event
    /// digest at the target leaf and the audit path everywhere else.
    pub fn recompute_root(&self, event_digest: &Digest) -> Result<Digest, TreeError> {
        let hasher = self.algorithm.hasher();
        let resolver: Box<dyn CacheResolver> = if self.index == self.version {
            Box::new(SingleTargetedCacheResolver::new(self.version))
        } else {
            Box::new(DoubleTargetedCacheResolver::new(self.index, self.version))
        };
        let context = PruningContext {
            resolver: &*resolver,
            cache: &self.audit_path,
        };
        let pruned = VerifyPruner::new(
            self.version,
            Some((self.index, event_digest.as_bytes())),
            context,
        )
        .prune()?;

        let mut compute = ComputeHashVisitor::new(&*hasher);
        Ok(pruned.post_order(&mut compute))
    }

    /// Whether the recomputed commitment matches `expected`.
    pub fn verify(&self, event_digest: &Digest, expected: &Digest) -> bool {
        match self.recompute_root(event_digest) {
            Ok(root) => &root == expected,
            Err(_) => false,
        }
    }
}

/// Proof that the commitment at `end` extends the commitment at `start`
/// without rewriting history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalProof {
    start: u64,
    end: u64,
    audit_path: AuditPath,
    algorithm: HashAlgorithm,
}

impl IncrementalProof {
    pub fn new(start: u64, end: u64, audit_path: AuditPath, algorithm: HashAlgorithm) -> Self {
        Self {
            start,
            end,
            audit_path,
            algorithm,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn audit_path(&self) -> &AuditPath {
        &self.audit_path
    }

    /// Rebuilds both commitments from the audit path alone.
    pub fn recompute_roots(&self) -> Result<(Digest, Digest), TreeError> {
        let hasher = self.algorithm.hasher();
        let resolver = IncrementalCacheResolver::new(self.start, self.end);
        let mut roots = [Digest::default(), Digest::default()];

        for (slot, bound) in roots.iter_mut().zip([self.start, self.end]) {
            let context = PruningContext {
                resolver: &resolver,
                cache: &self.audit_path,
            };
            let pruned = VerifyPruner::new(bound, None, context).prune()?;
            let mut compute = ComputeHashVisitor::new(&*hasher);
            *slot = pruned.post_order(&mut compute);
        }

        let [start_root, end_root] = roots;
        Ok((start_root, end_root))
    }

    /// Whether the recomputed commitments match the two the caller trusts.
    pub fn verify(&self, start_root: &Digest, end_root: &Digest) -> bool {
        match self.recompute_roots() {
            Ok((start, end)) => &start == start_root && &end == end_root,
            Err(_) => false,
        }
    }
}
