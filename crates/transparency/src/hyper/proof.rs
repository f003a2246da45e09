//! Hyper-tree membership proofs and their stateless verification.

use serde::{Deserialize, Serialize};
use veritree_crypto::{Digest, HashAlgorithm};

use crate::visit::{AuditPath, ComputeHashVisitor};

use super::position::HyperNavigator;
use super::pruner::VerifyPruner;
use super::default_hashes;

/// Proof that `key` was inserted into the hyper tree, carrying the stored
/// version bytes and the non-empty siblings along the key's path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryProof {
    key: Digest,
    #[serde(with = "serde_bytes")]
    value: Vec<u8>,
    audit_path: AuditPath,
    algorithm: HashAlgorithm,
}

impl QueryProof {
    pub fn new(key: Digest, value: Vec<u8>, audit_path: AuditPath, algorithm: HashAlgorithm) -> Self {
        Self {
            key,
            value,
            audit_path,
            algorithm,
        }
    }

    pub fn key(&self) -> &Digest {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The insertion version recorded for the key, when well-formed.
    pub fn version(&self) -> Option<u64> {
        self.value
            .as_slice()
            .try_into()
            .ok()
            .map(u64::from_be_bytes)
    }

    pub fn audit_path(&self) -> &AuditPath {
        &self.audit_path
    }

    /// Rebuilds the commitment this proof claims for `event_digest` at
    /// `version`, substituting the empty-subtree hash for any sibling the
    /// proof does not carry.
    pub fn recompute_root(&self, version: u64, event_digest: &Digest) -> Digest {
        let hasher = self.algorithm.hasher();
        let navigator = HyperNavigator::new(hasher.output_bits());
        let defaults = default_hashes(&*hasher);

        let pruned = VerifyPruner::new(
            event_digest.as_bytes().to_vec(),
            version.to_be_bytes().to_vec(),
            navigator,
            &self.audit_path,
        )
        .prune();

        let mut compute = ComputeHashVisitor::with_defaults(&*hasher, &defaults);
        pruned.post_order(&mut compute)
    }

    /// Whether the recomputed commitment matches `expected`.
    pub fn verify(&self, version: u64, event_digest: &Digest, expected: &Digest) -> bool {
        if &self.key != event_digest {
            return false;
        }
        // A digest from a different hasher cannot address the tree.
        if event_digest.len() * 8 != self.algorithm.hasher().output_bits() as usize {
            return false;
        }
        self.recompute_root(version, event_digest) == *expected
    }
}
