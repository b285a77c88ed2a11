// src/engine/cache.rs
//
// RawImageCache: count-bounded LRU of decoded buffers keyed by content signature.
//
// Layout: a slab of nodes threaded into a doubly linked recency list (head = most
// recently used, tail = least) plus a signature -> slot index. Every public call
// takes the single mutex for its whole duration, so no partial update is visible.

use crate::engine::buffer::RawImageBuffer;
use crate::engine::config::{CacheConfig, DEFAULT_CACHE_CAPACITY};
use crate::engine::signature::ContentSignature;
use crate::error::{RawImageError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

const NIL: usize = usize::MAX;

struct Node {
    signature: ContentSignature,
    buffer: Option<Arc<RawImageBuffer>>,
    prev: usize,
    next: usize,
}

/// Counters since construction (or the last `clear`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub overwrites: u64,
    pub evictions: u64,
}

struct LruState {
    nodes: Vec<Node>,
    free: Vec<usize>,
    index: HashMap<ContentSignature, usize>,
    head: usize,
    tail: usize,
    stats: CacheStats,
}

impl LruState {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: NIL,
            tail: NIL,
            stats: CacheStats::default(),
        }
    }

    fn detach(&mut self, i: usize) {
        let (prev, next) = (self.nodes[i].prev, self.nodes[i].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.nodes[i].prev = NIL;
        self.nodes[i].next = NIL;
    }

    fn push_front(&mut self, i: usize) {
        self.nodes[i].prev = NIL;
        self.nodes[i].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = i;
        }
        self.head = i;
        if self.tail == NIL {
            self.tail = i;
        }
    }

    fn touch(&mut self, i: usize) {
        if self.head != i {
            self.detach(i);
            self.push_front(i);
        }
    }

    fn alloc(&mut self, signature: ContentSignature, buffer: Arc<RawImageBuffer>) -> usize {
        let node = Node {
            signature,
            buffer: Some(buffer),
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, i: usize) -> Option<Arc<RawImageBuffer>> {
        self.detach(i);
        self.index.remove(&self.nodes[i].signature);
        self.free.push(i);
        self.nodes[i].buffer.take()
    }

    fn signatures_mru(&self) -> Vec<ContentSignature> {
        let mut out = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while cursor != NIL {
            out.push(self.nodes[cursor].signature);
            cursor = self.nodes[cursor].next;
        }
        out
    }
}

/// Signature-keyed LRU store of raw buffers, safe to share across threads.
pub struct RawImageCache {
    capacity: usize,
    state: Mutex<LruState>,
}

impl std::fmt::Debug for RawImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawImageCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl Default for RawImageCache {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            state: Mutex::new(LruState::new()),
        }
    }
}

impl RawImageCache {
    /// Cache holding at most `capacity` entries. A zero capacity is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RawImageError::invalid_parameter(
                "capacity",
                "0",
                "cache capacity must be at least 1",
            ));
        }
        Ok(Self {
            capacity,
            state: Mutex::new(LruState::new()),
        })
    }

    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        Self::new(config.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or overwrite, marking the entry most recently used, then evict from
    /// the least recently used end until the count is within capacity.
    pub fn set(&self, signature: ContentSignature, buffer: impl Into<Arc<RawImageBuffer>>) {
        let buffer = buffer.into();
        let mut state = self.state.lock();
        if let Some(&i) = state.index.get(&signature) {
            state.nodes[i].buffer = Some(buffer);
            state.touch(i);
            state.stats.overwrites += 1;
            trace!(target: "raw_image_cache::cache", %signature, "overwrite");
            return;
        }

        let i = state.alloc(signature, buffer);
        state.push_front(i);
        state.index.insert(signature, i);
        state.stats.insertions += 1;

        while state.index.len() > self.capacity {
            let victim = state.tail;
            let evicted = state.nodes[victim].signature;
            state.release(victim);
            state.stats.evictions += 1;
            debug!(
                target: "raw_image_cache::cache",
                signature = %evicted,
                capacity = self.capacity,
                "evicted least recently used entry"
            );
        }
    }

    /// Look up a buffer, marking it most recently used on a hit.
    ///
    /// Absence is `None`, never an empty buffer. A stored entry that is not
    /// structurally valid is dropped and reported as a miss.
    pub fn try_get(&self, signature: &ContentSignature) -> Option<Arc<RawImageBuffer>> {
        let mut state = self.state.lock();
        let slot = state.index.get(signature).copied();
        let Some(i) = slot else {
            state.stats.misses += 1;
            trace!(target: "raw_image_cache::cache", %signature, "miss");
            return None;
        };

        let valid = state.nodes[i]
            .buffer
            .as_ref()
            .is_some_and(|b| b.is_structurally_valid());
        if !valid {
            state.release(i);
            state.stats.misses += 1;
            debug!(
                target: "raw_image_cache::cache",
                %signature,
                "dropped structurally invalid entry"
            );
            return None;
        }

        state.touch(i);
        state.stats.hits += 1;
        state.nodes[i].buffer.clone()
    }

    /// Presence check that does not change recency.
    pub fn contains(&self, signature: &ContentSignature) -> bool {
        self.state.lock().index.contains_key(signature)
    }

    pub fn remove(&self, signature: &ContentSignature) -> Option<Arc<RawImageBuffer>> {
        let mut state = self.state.lock();
        let i = *state.index.get(signature)?;
        state.release(i)
    }

    pub fn clear(&self) {
        *self.state.lock() = LruState::new();
    }

    /// Snapshot of resident signatures, most recently used first.
    pub fn signatures_mru(&self) -> Vec<ContentSignature> {
        self.state.lock().signatures_mru()
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sig(n: u32) -> ContentSignature {
        ContentSignature::compute(&n.to_le_bytes())
    }

    fn buf(v: u8) -> RawImageBuffer {
        RawImageBuffer::filled(2, 2, [v, v, v, 255]).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            RawImageCache::new(0),
            Err(RawImageError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_default_capacity_is_80() {
        assert_eq!(RawImageCache::default().capacity(), 80);
    }

    #[test]
    fn test_set_then_get() {
        let cache = RawImageCache::new(4).unwrap();
        cache.set(sig(1), buf(10));
        let got = cache.try_get(&sig(1)).unwrap();
        assert_eq!(got.pixel(0, 0), [10, 10, 10, 255]);
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = RawImageCache::new(4).unwrap();
        assert!(cache.try_get(&sig(99)).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_eviction_is_least_recently_used() {
        let cache = RawImageCache::new(3).unwrap();
        for n in 0..4 {
            cache.set(sig(n), buf(n as u8));
        }
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&sig(0)));
        assert_eq!(cache.signatures_mru(), vec![sig(3), sig(2), sig(1)]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let cache = RawImageCache::new(3).unwrap();
        for n in 0..3 {
            cache.set(sig(n), buf(n as u8));
        }
        assert!(cache.try_get(&sig(0)).is_some());
        cache.set(sig(3), buf(3));
        assert!(cache.contains(&sig(0)));
        assert!(!cache.contains(&sig(1)));
    }

    #[test]
    fn test_overwrite_counts_as_touch_not_insert() {
        let cache = RawImageCache::new(2).unwrap();
        cache.set(sig(0), buf(0));
        cache.set(sig(1), buf(1));
        cache.set(sig(0), buf(50));
        cache.set(sig(2), buf(2));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&sig(1)));
        assert_eq!(cache.try_get(&sig(0)).unwrap().pixel(0, 0)[0], 50);
        let stats = cache.stats();
        assert_eq!(stats.insertions, 3);
        assert_eq!(stats.overwrites, 1);
    }

    #[test]
    fn test_invalid_entry_is_treated_as_miss_and_dropped() {
        let cache = RawImageCache::new(2).unwrap();
        let empty = RawImageBuffer::new(0, 0, Vec::new()).unwrap();
        cache.set(sig(7), empty);
        assert!(cache.try_get(&sig(7)).is_none());
        assert!(!cache.contains(&sig(7)));
    }

    #[test]
    fn test_remove_and_slot_reuse() {
        let cache = RawImageCache::new(3).unwrap();
        cache.set(sig(0), buf(0));
        cache.set(sig(1), buf(1));
        assert!(cache.remove(&sig(0)).is_some());
        assert!(cache.remove(&sig(0)).is_none());
        cache.set(sig(2), buf(2));
        cache.set(sig(3), buf(3));
        assert_eq!(cache.signatures_mru(), vec![sig(3), sig(2), sig(1)]);
    }

    #[test]
    fn test_clear_resets() {
        let cache = RawImageCache::new(3).unwrap();
        cache.set(sig(0), buf(0));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_contains_does_not_touch() {
        let cache = RawImageCache::new(2).unwrap();
        cache.set(sig(0), buf(0));
        cache.set(sig(1), buf(1));
        assert!(cache.contains(&sig(0)));
        cache.set(sig(2), buf(2));
        assert!(!cache.contains(&sig(0)));
    }

    #[test]
    fn test_concurrent_writers_and_readers_respect_capacity() {
        let cache = Arc::new(RawImageCache::new(16).unwrap());
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for n in 0..200u32 {
                        let key = sig(t * 1000 + n);
                        cache.set(key, buf(n as u8));
                        let _ = cache.try_get(&key);
                        let _ = cache.try_get(&sig(n));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
        assert_eq!(cache.signatures_mru().len(), 16);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 8 * 200 * 2);
        assert_eq!(stats.insertions, 8 * 200);
        assert_eq!(stats.evictions, 8 * 200 - 16);
    }
}
