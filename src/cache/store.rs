//! Expiring Store Module
//!
//! TTL-bearing entries of one segment: a key index plus a doubly linked list
//! kept sorted by expiration time, so the janitor only ever looks at the front.
//!
//! The list lives in an arena. Slots 0 and 1 are the head and tail sentinels;
//! `prev`/`next` are slot indices and freed slots are recycled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::cache::entry::is_expired;

const HEAD: usize = 0;
const TAIL: usize = 1;

// == Entry Handle ==
/// Position of an entry in the expiration list.
///
/// Only valid while the list lock that produced it is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHandle(usize);

struct Node<V> {
    /// None for sentinels and free slots
    key: Option<Arc<str>>,
    value: Option<Arc<V>>,
    expires_at: Instant,
    prev: usize,
    next: usize,
}

impl<V> Node<V> {
    fn sentinel(at: Instant) -> Self {
        Self {
            key: None,
            value: None,
            expires_at: at,
            prev: HEAD,
            next: TAIL,
        }
    }
}

// == Expiration List ==
/// Key index and deadline-ordered list, guarded as one unit by the store lock.
///
/// Order is ascending by `expires_at`: the entry closest to the head sentinel
/// expires first. Entries with equal deadlines keep insertion order.
pub struct ExpirationList<V> {
    nodes: Vec<Node<V>>,
    free: Vec<usize>,
    index: HashMap<Arc<str>, usize>,
}

impl<V> ExpirationList<V> {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            nodes: vec![Node::sentinel(now), Node::sentinel(now)],
            free: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<&Node<V>> {
        self.index.get(key).map(|&idx| &self.nodes[idx])
    }

    fn deadline(&self, key: &str) -> Option<Instant> {
        self.lookup(key).map(|node| node.expires_at)
    }

    fn is_live(&self, key: &str, now: Instant) -> bool {
        self.deadline(key)
            .is_some_and(|expires_at| !is_expired(expires_at, now))
    }

    // == Set ==
    /// Inserts or overwrites `key`, moving it to the slot matching its new deadline.
    pub fn set(&mut self, key: &str, value: Arc<V>, expires_at: Instant) {
        if let Some(&idx) = self.index.get(key) {
            self.unlink(idx);
            let node = &mut self.nodes[idx];
            node.value = Some(value);
            node.expires_at = expires_at;
            self.insert_ordered(idx);
        } else {
            let key: Arc<str> = Arc::from(key);
            let idx = self.alloc(Arc::clone(&key), value, expires_at);
            self.insert_ordered(idx);
            self.index.insert(key, idx);
        }
        debug_assert_eq!(self.index.len() + self.free.len() + 2, self.nodes.len());
    }

    // == Remove ==
    /// Unlinks `key` and returns its value and deadline.
    pub fn remove(&mut self, key: &str) -> Option<(Arc<V>, Instant)> {
        let idx = *self.index.get(key)?;
        let expires_at = self.nodes[idx].expires_at;
        self.release(idx).map(|value| (value, expires_at))
    }

    // == First Expired ==
    /// Returns the entry nearest the head sentinel if its deadline has passed.
    pub fn first_expired(&self, now: Instant) -> Option<EntryHandle> {
        let first = self.nodes[HEAD].next;
        if first != TAIL && is_expired(self.nodes[first].expires_at, now) {
            Some(EntryHandle(first))
        } else {
            None
        }
    }

    // == Delete Expired Entry ==
    /// Unlinks the node behind `handle` and drops its key from the index.
    pub fn delete_expired_entry(&mut self, handle: EntryHandle) {
        let EntryHandle(idx) = handle;
        debug_assert!(idx != HEAD && idx != TAIL, "sentinels are never evicted");
        debug_assert!(self.nodes[idx].key.is_some(), "handle points at a free slot");
        self.release(idx);
    }

    fn alloc(&mut self, key: Arc<str>, value: Arc<V>, expires_at: Instant) -> usize {
        let node = Node {
            key: Some(key),
            value: Some(value),
            expires_at,
            prev: HEAD,
            next: TAIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<Arc<V>> {
        self.unlink(idx);
        let node = &mut self.nodes[idx];
        let value = node.value.take();
        if let Some(key) = node.key.take() {
            self.index.remove(&key);
        }
        self.free.push(idx);
        value
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_after(&mut self, idx: usize, at: usize) {
        let next = self.nodes[at].next;
        self.nodes[idx].prev = at;
        self.nodes[idx].next = next;
        self.nodes[at].next = idx;
        self.nodes[next].prev = idx;
    }

    /// Places `idx` directly before the first entry with a strictly later deadline.
    ///
    /// Equal deadlines keep insertion order. The scan walks backwards from the
    /// tail and lands on the same slot a forward walk from the head would;
    /// fresh writes usually carry the latest deadline, so it stops after a
    /// few steps.
    fn insert_ordered(&mut self, idx: usize) {
        let expires_at = self.nodes[idx].expires_at;
        let mut at = self.nodes[TAIL].prev;
        while at != HEAD && self.nodes[at].expires_at > expires_at {
            at = self.nodes[at].prev;
        }
        self.link_after(idx, at);
    }

    /// Keys and deadlines from head to tail.
    #[cfg(test)]
    pub(crate) fn entries(&self) -> Vec<(String, Instant)> {
        let mut out = Vec::with_capacity(self.len());
        let mut cur = self.nodes[HEAD].next;
        while cur != TAIL && out.len() <= self.nodes.len() {
            let node = &self.nodes[cur];
            let key = node.key.as_deref().unwrap_or_default().to_string();
            out.push((key, node.expires_at));
            cur = node.next;
        }
        out
    }

    /// Walks the list and cross-checks it against the index.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut prev = HEAD;
        let mut cur = self.nodes[HEAD].next;
        let mut seen = 0usize;
        let mut last_deadline: Option<Instant> = None;

        while cur != TAIL {
            if seen > self.index.len() {
                return Err("list is longer than the index or cyclic".to_string());
            }
            let node = &self.nodes[cur];
            if node.prev != prev {
                return Err(format!("broken back link at slot {}", cur));
            }
            let key = node
                .key
                .as_ref()
                .ok_or_else(|| format!("free slot {} is linked", cur))?;
            if self.index.get(key) != Some(&cur) {
                return Err(format!("key {:?} is not indexed at slot {}", key, cur));
            }
            if last_deadline.is_some_and(|last| last > node.expires_at) {
                return Err(format!("deadline order broken at key {:?}", key));
            }
            last_deadline = Some(node.expires_at);
            seen += 1;
            prev = cur;
            cur = node.next;
        }

        if self.nodes[TAIL].prev != prev {
            return Err("tail sentinel back link is stale".to_string());
        }
        if seen != self.index.len() {
            return Err(format!(
                "list holds {} entries but index holds {}",
                seen,
                self.index.len()
            ));
        }
        Ok(())
    }
}

// == Expiring Store ==
/// Thread-safe store for entries that carry a deadline.
///
/// All operations take the current time from the caller so the segment can
/// use one clock reading per operation.
pub struct ExpiringStore<V> {
    list: RwLock<ExpirationList<V>>,
}

impl<V> Default for ExpiringStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ExpiringStore<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            list: RwLock::new(ExpirationList::new()),
        }
    }

    // == Set ==
    /// Stores `value` under `key` until `expires_at`, overwriting any previous entry.
    pub fn set(&self, key: &str, value: Arc<V>, expires_at: Instant) {
        self.list.write().set(key, value, expires_at);
    }

    // == Add ==
    /// Stores `value` only if `key` has no live entry.
    ///
    /// An entry whose deadline has passed counts as absent and is replaced.
    /// Returns `true` when the value was written.
    pub fn add(&self, key: &str, value: Arc<V>, expires_at: Instant, now: Instant) -> bool {
        let list = self.list.upgradable_read();
        if list.is_live(key, now) {
            return false;
        }
        let mut list = RwLockUpgradableReadGuard::upgrade(list);
        list.set(key, value, expires_at);
        true
    }

    // == Get ==
    /// Returns the value for `key` if its deadline has not passed.
    ///
    /// An expired entry is removed on the spot.
    pub fn get(&self, key: &str, now: Instant) -> Option<Arc<V>> {
        {
            let list = self.list.read();
            let node = list.lookup(key)?;
            if !is_expired(node.expires_at, now) {
                return node.value.clone();
            }
        }

        let mut list = self.list.write();
        // A writer may have refreshed the key between the two locks
        if list
            .deadline(key)
            .is_some_and(|expires_at| is_expired(expires_at, now))
        {
            list.remove(key);
        }
        None
    }

    // == Remove ==
    /// Deletes `key`, returning its value if it was still live.
    pub fn remove(&self, key: &str, now: Instant) -> Option<Arc<V>> {
        let (value, expires_at) = self.list.write().remove(key)?;
        (!is_expired(expires_at, now)).then_some(value)
    }

    // == Evict Expired ==
    /// Removes up to `max` expired entries from the head of the list.
    ///
    /// Stops at the first live entry. Returns the number of entries removed.
    pub fn evict_expired(&self, now: Instant, max: usize) -> usize {
        let mut list = self.list.write();
        let mut removed = 0;
        while removed < max {
            match list.first_expired(now) {
                Some(handle) => {
                    list.delete_expired_entry(handle);
                    removed += 1;
                }
                None => break,
            }
        }
        removed
    }

    // == Length ==
    /// Number of entries held, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.list.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.read().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> Vec<(String, Instant)> {
        self.list.read().entries()
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        self.list.read().check_invariants()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(base: Instant, n: u64) -> Instant {
        base + Duration::from_secs(n)
    }

    fn keys(store: &ExpiringStore<u32>) -> Vec<String> {
        store.entries().into_iter().map(|(key, _)| key).collect()
    }

    #[test]
    fn test_store_new() {
        let store: ExpiringStore<u32> = ExpiringStore::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_store_set_and_get() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("key1", Arc::new(1), secs(now, 30));

        assert_eq!(store.get("key1", now).as_deref(), Some(&1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store: ExpiringStore<u32> = ExpiringStore::new();
        assert!(store.get("missing", Instant::now()).is_none());
    }

    #[test]
    fn test_store_keeps_deadline_order() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("c", Arc::new(3), secs(now, 30));
        store.set("a", Arc::new(1), secs(now, 10));
        store.set("b", Arc::new(2), secs(now, 20));
        store.set("d", Arc::new(4), secs(now, 40));

        assert_eq!(keys(&store), vec!["a", "b", "c", "d"]);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_store_equal_deadlines_keep_insertion_order() {
        let store = ExpiringStore::new();
        let now = Instant::now();
        let deadline = secs(now, 10);

        store.set("first", Arc::new(1), deadline);
        store.set("later", Arc::new(9), secs(now, 20));
        store.set("second", Arc::new(2), deadline);
        store.set("third", Arc::new(3), deadline);

        assert_eq!(keys(&store), vec!["first", "second", "third", "later"]);
    }

    #[test]
    fn test_store_overwrite_repositions_entry() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("a", Arc::new(1), secs(now, 10));
        store.set("b", Arc::new(2), secs(now, 20));
        store.set("a", Arc::new(3), secs(now, 30));

        assert_eq!(keys(&store), vec!["b", "a"]);
        assert_eq!(store.get("a", now).as_deref(), Some(&3));
        assert_eq!(store.len(), 2);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_store_add_is_noop_when_present() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        assert!(store.add("a", Arc::new(1), secs(now, 30), now));
        assert!(!store.add("a", Arc::new(2), secs(now, 60), now));

        assert_eq!(store.get("a", now).as_deref(), Some(&1));
        assert_eq!(store.entries()[0].1, secs(now, 30));
    }

    #[test]
    fn test_store_add_replaces_expired_entry() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("a", Arc::new(1), now);
        assert!(store.add("a", Arc::new(2), secs(now, 30), now));

        assert_eq!(store.get("a", now).as_deref(), Some(&2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_reclaims_expired_entry() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("a", Arc::new(1), secs(now, 1));
        store.set("b", Arc::new(2), secs(now, 5));

        let later = secs(now, 2);
        assert!(store.get("a", later).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(keys(&store), vec!["b"]);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_store_zero_ttl_is_expired_immediately() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("a", Arc::new(1), now);

        assert_eq!(store.len(), 1);
        assert!(store.get("a", now).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_remove() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("a", Arc::new(1), secs(now, 10));

        assert_eq!(store.remove("a", now).as_deref(), Some(&1));
        assert!(store.remove("a", now).is_none());
        assert!(store.is_empty());
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_store_remove_expired_returns_none() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("a", Arc::new(1), now);

        assert!(store.remove("a", now).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_expired_stops_at_first_live_entry() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        for i in 1..=5 {
            store.set(&format!("k{}", i), Arc::new(i), secs(now, i as u64));
        }

        let removed = store.evict_expired(secs(now, 3), usize::MAX);

        assert_eq!(removed, 3);
        assert_eq!(keys(&store), vec!["k4", "k5"]);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_evict_expired_respects_batch_limit() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        for i in 0..10 {
            store.set(&format!("k{}", i), Arc::new(i), now);
        }

        assert_eq!(store.evict_expired(now, 4), 4);
        assert_eq!(store.len(), 6);
        assert_eq!(store.evict_expired(now, 100), 6);
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_expired_on_empty_store() {
        let store: ExpiringStore<u32> = ExpiringStore::new();
        assert_eq!(store.evict_expired(Instant::now(), usize::MAX), 0);
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        for i in 0..4 {
            store.set(&format!("k{}", i), Arc::new(i), now);
        }
        store.evict_expired(now, usize::MAX);
        for i in 0..4 {
            store.set(&format!("n{}", i), Arc::new(i), secs(now, 10));
        }

        assert_eq!(store.list.read().nodes.len(), 6);
        assert_eq!(store.len(), 4);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_first_expired_and_delete_expired_entry() {
        let store = ExpiringStore::new();
        let now = Instant::now();

        store.set("old", Arc::new(1), now);
        store.set("new", Arc::new(2), secs(now, 10));

        let mut list = store.list.write();
        let handle = list.first_expired(now).expect("old entry is expired");
        list.delete_expired_entry(handle);

        assert!(list.first_expired(now).is_none());
        assert_eq!(list.len(), 1);
        assert!(list.check_invariants().is_ok());
    }
}
