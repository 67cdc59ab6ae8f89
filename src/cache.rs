//! Snapshot storage boundary and the built-in in-memory store.
//!
//! The coordinator only depends on the [`CacheStore`] trait; eviction and
//! expiry policy live entirely behind it. [`MemoryStore`] is the default
//! implementation: a mutex-guarded LRU keyed by the opaque request key.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use lru::LruCache;

use crate::{config::CacheConfig, snapshot::Snapshot};

/// Thread-safe key → snapshot store.
///
/// External contract: implementations must be safe for concurrent callers.
/// There is no ordering guarantee between a `put` and a concurrent `get` for
/// the same key beyond eventual visibility. Errors are surfaced so the
/// coordinator can degrade to uncached operation instead of crashing.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Arc<Snapshot>>>;
    fn put(&self, key: &str, snapshot: Arc<Snapshot>) -> anyhow::Result<()>;
}

/// In-memory LRU snapshot store.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<LruCache<String, Arc<Snapshot>>>,
}

impl MemoryStore {
    pub fn new(cfg: &CacheConfig) -> Self {
        let cap = NonZeroUsize::new(cfg.max_entries.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Arc<Snapshot>>> {
        let mut cache = self.inner.lock().unwrap();
        Ok(cache.get(key).cloned())
    }

    fn put(&self, key: &str, snapshot: Arc<Snapshot>) -> anyhow::Result<()> {
        let mut cache = self.inner.lock().unwrap();
        cache.put(key.to_string(), snapshot);
        Ok(())
    }
}
