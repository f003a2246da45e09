//! The storage contract consumed by veritree's tree engines.
//!
//! Durability is the caller's concern: the engines emit [`Mutation`] batches
//! and expect whoever owns the write loop to persist them atomically through
//! [`Store::mutate`]. A disk-backed store lives outside this workspace; the
//! [`MemStore`] here backs tests and benches.

#![warn(rust_2018_idioms, unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use thiserror::Error;

/// The key spaces a [`Store`] partitions.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Prefix {
    /// Event digest to big-endian version, maintained by the hyper tree.
    Index,
    /// Frozen history-tree node hashes keyed by position bytes.
    HistoryCache,
    /// Hyper-tree band node hashes keyed by position bytes.
    HyperCache,
}

impl Prefix {
    /// The single byte this prefix occupies in encoded keys.
    pub fn byte(&self) -> u8 {
        match self {
            Prefix::Index => 0x00,
            Prefix::HistoryCache => 0x01,
            Prefix::HyperCache => 0x02,
        }
    }
}

/// A key/value row read back from a [`Store`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KvPair {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }
}

/// A single durable write, queued during a tree operation and persisted by
/// the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub prefix: Prefix,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Mutation {
    pub fn new(prefix: Prefix, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { prefix, key, value }
    }
}

/// Errors surfaced by a [`Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Sentinel for an absent key; callers treat this as data, not failure.
    #[error("key not found")]
    KeyNotFound,

    /// A failure in the backing engine, surfaced verbatim.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Prefix-partitioned key/value persistence.
///
/// Implementations must make [`Store::mutate`] atomic across the whole
/// batch; the tree engines rely on that for crash consistency.
pub trait Store: Send + Sync {
    /// Reads one row; [`StoreError::KeyNotFound`] when absent.
    fn get(&self, prefix: Prefix, key: &[u8]) -> Result<KvPair, StoreError>;

    /// Reads every row under a prefix, in no guaranteed order.
    fn get_all(&self, prefix: Prefix) -> Result<Vec<KvPair>, StoreError>;

    /// Reads the rows whose keys fall within `[start, end]`, in key order.
    fn get_range(&self, prefix: Prefix, start: &[u8], end: &[u8])
        -> Result<Vec<KvPair>, StoreError>;

    /// Applies a batch of writes atomically.
    fn mutate(&self, batch: &[Mutation]) -> Result<(), StoreError>;
}

/// An in-memory [`Store`] for tests and benches.
#[derive(Default)]
pub struct MemStore {
    rows: RwLock<BTreeMap<(u8, Vec<u8>), Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn get(&self, prefix: Prefix, key: &[u8]) -> Result<KvPair, StoreError> {
        let rows = self.rows.read();
        match rows.get(&(prefix.byte(), key.to_vec())) {
            Some(value) => Ok(KvPair::new(key.to_vec(), value.clone())),
            None => Err(StoreError::KeyNotFound),
        }
    }

    fn get_all(&self, prefix: Prefix) -> Result<Vec<KvPair>, StoreError> {
        let rows = self.rows.read();
        Ok(rows
            .range((
                Bound::Included((prefix.byte(), Vec::new())),
                Bound::Unbounded,
            ))
            .take_while(|((p, _), _)| *p == prefix.byte())
            .map(|((_, key), value)| KvPair::new(key.clone(), value.clone()))
            .collect())
    }

    fn get_range(
        &self,
        prefix: Prefix,
        start: &[u8],
        end: &[u8],
    ) -> Result<Vec<KvPair>, StoreError> {
        let rows = self.rows.read();
        Ok(rows
            .range((
                Bound::Included((prefix.byte(), start.to_vec())),
                Bound::Included((prefix.byte(), end.to_vec())),
            ))
            .map(|((_, key), value)| KvPair::new(key.clone(), value.clone()))
            .collect())
    }

    fn mutate(&self, batch: &[Mutation]) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        for mutation in batch {
            rows.insert(
                (mutation.prefix.byte(), mutation.key.clone()),
                mutation.value.clone(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_returns_sentinel_for_absent_keys() {
        let store = MemStore::new();
        assert!(matches!(
            store.get(Prefix::Index, b"missing"),
            Err(StoreError::KeyNotFound)
        ));
    }

    #[test]
    fn test_mutate_is_visible_per_prefix() {
        let store = MemStore::new();
        store
            .mutate(&[
                Mutation::new(Prefix::Index, vec![0xaa], vec![1]),
                Mutation::new(Prefix::HistoryCache, vec![0xaa], vec![2]),
            ])
            .unwrap();

        assert_eq!(store.get(Prefix::Index, &[0xaa]).unwrap().value, vec![1]);
        assert_eq!(
            store.get(Prefix::HistoryCache, &[0xaa]).unwrap().value,
            vec![2]
        );
        assert!(matches!(
            store.get(Prefix::HyperCache, &[0xaa]),
            Err(StoreError::KeyNotFound)
        ));
    }

    #[test]
    fn test_get_range_is_inclusive_and_ordered() {
        let store = MemStore::new();
        let batch: Vec<Mutation> = (0u8..8)
            .map(|i| Mutation::new(Prefix::Index, vec![i], vec![i]))
            .collect();
        store.mutate(&batch).unwrap();

        let rows = store.get_range(Prefix::Index, &[2], &[5]).unwrap();
        let keys: Vec<u8> = rows.iter().map(|pair| pair.key[0]).collect();
        assert_eq!(keys, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_get_all_returns_only_the_prefix() {
        let store = MemStore::new();
        store
            .mutate(&[
                Mutation::new(Prefix::HyperCache, vec![0x01], vec![1]),
                Mutation::new(Prefix::HyperCache, vec![0x02], vec![2]),
                Mutation::new(Prefix::Index, vec![0x03], vec![3]),
            ])
            .unwrap();

        let rows = store.get_all(Prefix::HyperCache).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|pair| pair.value.len() == 1));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let store = MemStore::new();
        store
            .mutate(&[Mutation::new(Prefix::Index, vec![0x01], vec![1])])
            .unwrap();
        store
            .mutate(&[Mutation::new(Prefix::Index, vec![0x01], vec![9])])
            .unwrap();

        assert_eq!(store.get(Prefix::Index, &[0x01]).unwrap().value, vec![9]);
    }
}
