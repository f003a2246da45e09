//! Hash caches layered over the store.
//!
//! Read paths use a [`PassThroughCache`] so proofs always observe durable
//! state; the history write path keeps a bounded [`LruReadThroughCache`]
//! warm, and the hyper tree holds its whole cached band in a
//! [`SimpleCache`] rebuilt at startup. Durability never flows through a
//! cache: `put` touches memory only, and the mutation batch emitted by the
//! operation is the source of truth.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Mutex;
use veritree_crypto::Digest;
use veritree_storage::{Prefix, Store, StoreError};

/// Read access to position-keyed digests.
pub trait Cache {
    /// Looks up the digest cached for `key` (position bytes).
    fn get(&self, key: &[u8]) -> Option<Digest>;
}

/// A cache that can also be written and warmed.
pub trait ModifiableCache: Cache {
    /// Records a digest in memory.
    fn put(&mut self, key: Vec<u8>, digest: Digest);

    /// Bulk-loads entries, e.g. from a store scan at startup.
    fn fill(&mut self, entries: &mut dyn Iterator<Item = (Vec<u8>, Digest)>);

    /// The number of entries currently held in memory.
    fn size(&self) -> usize;
}

/// Delegates every lookup to the store; never caches.
pub struct PassThroughCache {
    prefix: Prefix,
    store: Arc<dyn Store>,
}

impl PassThroughCache {
    pub fn new(prefix: Prefix, store: Arc<dyn Store>) -> Self {
        Self { prefix, store }
    }
}

impl Cache for PassThroughCache {
    fn get(&self, key: &[u8]) -> Option<Digest> {
        match self.store.get(self.prefix, key) {
            Ok(pair) => Some(Digest::from(pair.value)),
            Err(StoreError::KeyNotFound) => None,
            Err(err) => {
                tracing::error!(prefix = ?self.prefix, %err, "cache read failed");
                None
            }
        }
    }
}

/// A bounded LRU over the store.
///
/// `get` consults memory first and promotes store hits; `put` writes memory
/// only. Eviction follows access order.
pub struct LruReadThroughCache {
    prefix: Prefix,
    store: Arc<dyn Store>,
    entries: Mutex<lru::LruCache<Vec<u8>, Digest>>,
}

impl LruReadThroughCache {
    pub fn new(prefix: Prefix, store: Arc<dyn Store>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            prefix,
            store,
            entries: Mutex::new(lru::LruCache::new(capacity)),
        }
    }
}

impl Cache for LruReadThroughCache {
    fn get(&self, key: &[u8]) -> Option<Digest> {
        let mut entries = self.entries.lock();
        if let Some(digest) = entries.get(key) {
            return Some(digest.clone());
        }
        match self.store.get(self.prefix, key) {
            Ok(pair) => {
                let digest = Digest::from(pair.value);
                entries.put(key.to_vec(), digest.clone());
                Some(digest)
            }
            Err(StoreError::KeyNotFound) => None,
            Err(err) => {
                tracing::error!(prefix = ?self.prefix, %err, "cache read failed");
                None
            }
        }
    }
}

impl ModifiableCache for LruReadThroughCache {
    fn put(&mut self, key: Vec<u8>, digest: Digest) {
        self.entries.lock().put(key, digest);
    }

    fn fill(&mut self, entries: &mut dyn Iterator<Item = (Vec<u8>, Digest)>) {
        let mut cached = self.entries.lock();
        for (key, digest) in entries {
            cached.put(key, digest);
        }
    }

    fn size(&self) -> usize {
        self.entries.lock().len()
    }
}

/// An unbounded in-memory cache; the hyper tree's warm band.
#[derive(Default)]
pub struct SimpleCache {
    entries: HashMap<Vec<u8>, Digest>,
}

impl SimpleCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for SimpleCache {
    fn get(&self, key: &[u8]) -> Option<Digest> {
        self.entries.get(key).cloned()
    }
}

impl ModifiableCache for SimpleCache {
    fn put(&mut self, key: Vec<u8>, digest: Digest) {
        self.entries.insert(key, digest);
    }

    fn fill(&mut self, entries: &mut dyn Iterator<Item = (Vec<u8>, Digest)>) {
        self.entries.extend(entries);
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}
