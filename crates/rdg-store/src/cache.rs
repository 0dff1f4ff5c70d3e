// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Small cache for decoded property columns, keyed by `(scope, name)`, with
//! a pluggable replacement policy: entry-count LRU or a byte budget.
//!
//! One mutex owns both the map and the recency order; it is held only for
//! O(1) operations. Eviction callbacks run strictly after the lock is
//! released, so a callback may re-enter the cache or reach back into the
//! owning graph (e.g. to mark a column absent) without deadlocking.

use lru::LruCache;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyScope {
    Node,
    Edge,
}

impl PropertyScope {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyScope::Node => "node",
            PropertyScope::Edge => "edge",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: PropertyScope,
    pub name: String,
}

impl CacheKey {
    pub fn new(scope: PropertyScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

type SizeOfFn<V> = Box<dyn Fn(&V) -> usize + Send + Sync>;
type EvictCb = Box<dyn Fn(&CacheKey) + Send + Sync>;

pub enum CachePolicy<V> {
    /// Bound the number of entries.
    Lru { max_entries: usize },
    /// Bound the combined value size. A single entry may exceed the budget;
    /// eviction never empties the cache below one entry on its own.
    SizeBudget { max_bytes: usize, sizeof: SizeOfFn<V> },
}

impl<V> std::fmt::Debug for CachePolicy<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachePolicy::Lru { max_entries } => {
                f.debug_struct("Lru").field("max_entries", max_entries).finish()
            }
            CachePolicy::SizeBudget { max_bytes, .. } => f
                .debug_struct("SizeBudget")
                .field("max_bytes", max_bytes)
                .finish(),
        }
    }
}

pub struct PropertyCache<V> {
    entries: Mutex<LruCache<CacheKey, V>>,
    policy: CachePolicy<V>,
    evict_cb: Option<EvictCb>,
    total_bytes: AtomicUsize,
}

impl<V: Clone> std::fmt::Debug for PropertyCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyCache")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .field("bytes", &self.bytes())
            .finish()
    }
}

impl<V: Clone> PropertyCache<V> {
    pub fn new(policy: CachePolicy<V>) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            policy,
            evict_cb: None,
            total_bytes: AtomicUsize::new(0),
        }
    }

    /// Install a callback invoked (outside the cache lock) with each
    /// evicted key.
    pub fn with_evict_cb(mut self, cb: impl Fn(&CacheKey) + Send + Sync + 'static) -> Self {
        self.evict_cb = Some(Box::new(cb));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Presence test; does not refresh recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains(key)
    }

    /// Look up and move the entry to the front of the recency order.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        let evicted = {
            let mut entries = self.entries.lock();
            if let CachePolicy::SizeBudget { sizeof, .. } = &self.policy {
                self.total_bytes.fetch_add(sizeof(&value), Ordering::Relaxed);
            }
            if let Some(old) = entries.put(key, value)
                && let CachePolicy::SizeBudget { sizeof, .. } = &self.policy
            {
                self.total_bytes.fetch_sub(sizeof(&old), Ordering::Relaxed);
            }
            self.evict_locked(&mut entries)
        };
        self.run_evict_cb(&evicted);
    }

    /// Re-run the eviction loop; useful after the policy's budget was the
    /// reason an external holder released column memory.
    pub fn evict_if_necessary(&self) {
        let evicted = {
            let mut entries = self.entries.lock();
            self.evict_locked(&mut entries)
        };
        self.run_evict_cb(&evicted);
    }

    fn evict_locked(&self, entries: &mut LruCache<CacheKey, V>) -> Vec<CacheKey> {
        let mut evicted = Vec::new();
        match &self.policy {
            CachePolicy::Lru { max_entries } => {
                while entries.len() > *max_entries {
                    let Some((key, _)) = entries.pop_lru() else {
                        break;
                    };
                    evicted.push(key);
                }
            }
            CachePolicy::SizeBudget { max_bytes, sizeof } => {
                while self.total_bytes.load(Ordering::Relaxed) > *max_bytes && entries.len() > 1 {
                    let Some((key, value)) = entries.pop_lru() else {
                        break;
                    };
                    self.total_bytes.fetch_sub(sizeof(&value), Ordering::Relaxed);
                    evicted.push(key);
                }
            }
        }
        evicted
    }

    fn run_evict_cb(&self, evicted: &[CacheKey]) {
        if let Some(cb) = &self.evict_cb {
            for key in evicted {
                cb(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn key(name: &str) -> CacheKey {
        CacheKey::new(PropertyScope::Node, name)
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = PropertyCache::new(CachePolicy::Lru { max_entries: 2 });
        cache.insert(key("k1"), 1u32);
        cache.insert(key("k2"), 2);
        // touching k1 makes k2 the eviction victim
        assert_eq!(cache.get(&key("k1")), Some(1));
        cache.insert(key("k3"), 3);

        assert!(!cache.contains(&key("k2")));
        assert!(cache.contains(&key("k1")));
        assert!(cache.contains(&key("k3")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_size_budget_allows_one_oversized_entry() {
        let cache = PropertyCache::new(CachePolicy::SizeBudget {
            max_bytes: 10,
            sizeof: Box::new(|v: &Vec<u8>| v.len()),
        });
        cache.insert(key("big"), vec![0u8; 64]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes(), 64);

        cache.insert(key("small"), vec![0u8; 4]);
        // the older oversized entry goes, the newer one stays
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key("small")));
        assert_eq!(cache.bytes(), 4);
    }

    #[test]
    fn test_evict_cb_runs_outside_lock() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let cache = Arc::new(
            PropertyCache::new(CachePolicy::Lru { max_entries: 1 })
                .with_evict_cb(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
        );
        cache.insert(key("a"), 1u8);
        cache.insert(key("b"), 2);
        cache.insert(key("c"), 3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_replacing_entry_updates_bytes() {
        let cache = PropertyCache::new(CachePolicy::SizeBudget {
            max_bytes: 100,
            sizeof: Box::new(|v: &Vec<u8>| v.len()),
        });
        cache.insert(key("a"), vec![0u8; 8]);
        cache.insert(key("a"), vec![0u8; 3]);
        assert_eq!(cache.bytes(), 3);
        assert_eq!(cache.len(), 1);
    }
}
