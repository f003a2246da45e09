//! Per-operation predicates deciding which positions are served from cache.
//!
//! A position qualifies when it is frozen at the operation's version bound
//! and no traversal target descends into it; everything else is recursed
//! and recomputed. Decisions are pure and deterministic.

use super::position::HistoryPosition;

/// Decides whether a position's digest must come from the cache.
pub trait CacheResolver {
    fn should_get_from_cache(&self, pos: &HistoryPosition) -> bool;
}

/// One target leaf: the add path, and membership proofs where
/// `index == version`.
pub struct SingleTargetedCacheResolver {
    version: u64,
}

impl SingleTargetedCacheResolver {
    pub fn new(version: u64) -> Self {
        Self { version }
    }
}

impl CacheResolver for SingleTargetedCacheResolver {
    fn should_get_from_cache(&self, pos: &HistoryPosition) -> bool {
        pos.frozen_at(self.version)
    }
}

/// Two target leaves: membership proofs where `index != version`.
pub struct DoubleTargetedCacheResolver {
    index: u64,
    version: u64,
}

impl DoubleTargetedCacheResolver {
    pub fn new(index: u64, version: u64) -> Self {
        Self { index, version }
    }
}

impl CacheResolver for DoubleTargetedCacheResolver {
    fn should_get_from_cache(&self, pos: &HistoryPosition) -> bool {
        pos.frozen_at(self.version) && !pos.contains(self.index)
    }
}

/// Four target leaves bracketing a consistency window: the proving
/// traversal descends exactly as deep as both verification passes
/// (bounded at `start` and at `end`) will need.
pub struct IncrementalCacheResolver {
    targets: [u64; 4],
    end: u64,
}

impl IncrementalCacheResolver {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            targets: [start, (start + 1).min(end), end.saturating_sub(1).max(start), end],
            end,
        }
    }
}

impl CacheResolver for IncrementalCacheResolver {
    fn should_get_from_cache(&self, pos: &HistoryPosition) -> bool {
        pos.frozen_at(self.end) && !self.targets.iter().any(|target| pos.contains(*target))
    }
}
