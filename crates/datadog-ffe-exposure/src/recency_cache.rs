// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity key/value store with least-recently-used eviction.
//!
//! Entries live in a `Vec` slab and are threaded together by index into a
//! doubly-linked recency list. The head of the list is the most recently used
//! entry and the tail is the next eviction victim. A hash map from key to slab
//! index gives O(1) lookup, so every operation is O(1).
//!
//! ```text
//!   head (MRU)                                   tail (LRU)
//!   ┌───────┐  next  ┌───────┐  next  ┌───────┐
//!   │ key c │ ─────▶ │ key a │ ─────▶ │ key b │ ──▶ evicted first
//!   └───────┘ ◀───── └───────┘ ◀───── └───────┘
//!               prev            prev
//! ```
//!
//! Reads and writes both count as a use: `get`, `set` and `put` move the entry
//! to the head of the list.

use hashbrown::HashMap;
use std::borrow::Borrow;
use std::hash::Hash;

/// Default number of entries kept before eviction starts.
pub const DEFAULT_CAPACITY: usize = 65_536;

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Self {
        Node {
            key,
            value,
            prev: None,
            next: None,
        }
    }
}

/// Bounded key/value store evicting the least recently used entry on overflow.
#[derive(Debug, Clone)]
pub struct RecencyCache<K, V> {
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
}

impl<K, V> Default for RecencyCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K, V> RecencyCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is clamped to one so that the most recent write is
    /// always retrievable.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        RecencyCache {
            index: HashMap::new(),
            nodes: Vec::new(),
            head: None,
            tail: None,
            capacity: capacity.max(1),
        }
    }

    /// Returns the value stored under `key` and marks it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = *self.index.get(key)?;
        self.move_to_front(slot);
        Some(&self.nodes[slot].value)
    }

    /// Returns the value stored under `key` without touching its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.get(key).map(|&slot| &self.nodes[slot].value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.contains_key(key)
    }

    /// Inserts or updates `key`, evicting the least recently used entry if the
    /// cache is full.
    pub fn set(&mut self, key: K, value: V) {
        self.put(key, value);
    }

    /// Same as [`RecencyCache::set`] but hands back whatever was stored under
    /// `key` before this call.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            let previous = std::mem::replace(&mut self.nodes[slot].value, value);
            self.move_to_front(slot);
            return Some(previous);
        }

        let slot = match self.tail.filter(|_| self.index.len() >= self.capacity) {
            Some(victim) => {
                // Reuse the victim's slot so the slab never grows past capacity.
                self.unlink(victim);
                let evicted =
                    std::mem::replace(&mut self.nodes[victim], Node::new(key.clone(), value));
                self.index.remove(&evicted.key);
                victim
            }
            None => {
                self.nodes.push(Node::new(key.clone(), value));
                self.nodes.len() - 1
            }
        };

        self.push_front(slot);
        self.index.insert(key, slot);
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        std::iter::successors(self.head, move |&slot| self.nodes[slot].next).map(move |slot| {
            let node = &self.nodes[slot];
            (&node.key, &node.value)
        })
    }

    fn move_to_front(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.push_front(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;
        if let Some(head) = self.head {
            self.nodes[head].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys<V>(cache: &RecencyCache<String, V>) -> Vec<&str> {
        cache.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn test_get_promotes_before_eviction() {
        let mut cache = RecencyCache::new(2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        assert_eq!(cache.get("a"), Some(&1));
        cache.put("c".to_string(), 3);

        assert!(!cache.contains("b"));
        assert_eq!(cache.peek("a"), Some(&1));
        assert_eq!(cache.peek("c"), Some(&3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_evicts_oldest_key() {
        let mut cache = RecencyCache::new(3);
        for (i, key) in ["k1", "k2", "k3", "k4"].iter().enumerate() {
            cache.set(key.to_string(), i);
        }
        assert!(!cache.contains("k1"));
        assert_eq!(keys(&cache), vec!["k4", "k3", "k2"]);
    }

    #[test]
    fn test_get_changes_victim() {
        let mut cache = RecencyCache::new(3);
        for key in ["k1", "k2", "k3"] {
            cache.set(key.to_string(), ());
        }
        cache.get("k1");
        cache.set("k4".to_string(), ());

        assert!(cache.contains("k1"));
        assert!(!cache.contains("k2"));
    }

    #[test]
    fn test_put_returns_previous_value() {
        let mut cache = RecencyCache::new(4);
        assert_eq!(cache.put("a".to_string(), "one"), None);
        assert_eq!(cache.put("a".to_string(), "two"), Some("one"));
        assert_eq!(cache.put("a".to_string(), "two"), Some("two"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_update_counts_as_use() {
        let mut cache = RecencyCache::new(2);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.set("a".to_string(), 10);
        cache.set("c".to_string(), 3);

        assert_eq!(cache.peek("a"), Some(&10));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_miss_is_distinct_from_empty_value() {
        let mut cache = RecencyCache::new(2);
        cache.set("empty".to_string(), String::new());
        assert_eq!(cache.get("empty"), Some(&String::new()));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(keys(&cache), vec!["empty"]);
    }

    #[test]
    fn test_clear() {
        let mut cache = RecencyCache::new(2);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.capacity(), 2);

        cache.set("c".to_string(), 3);
        assert_eq!(keys(&cache), vec!["c"]);
    }

    #[test]
    fn test_zero_capacity_keeps_latest_write() {
        let mut cache = RecencyCache::new(0);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek("b"), Some(&2));
    }

    #[test]
    fn test_default_capacity() {
        let cache: RecencyCache<String, String> = RecencyCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Get(u8),
        Set(u8),
        Put(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Get),
            any::<u8>().prop_map(Op::Set),
            any::<u8>().prop_map(Op::Put),
        ]
    }

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(
            capacity in 1usize..16,
            ops in prop::collection::vec(op(), 0..200),
        ) {
            let mut cache = RecencyCache::new(capacity);
            for op in ops {
                match op {
                    Op::Get(k) => { cache.get(&k); }
                    Op::Set(k) => cache.set(k, k),
                    Op::Put(k) => { cache.put(k, k); }
                }
                prop_assert!(cache.len() <= capacity);
                prop_assert_eq!(cache.iter().count(), cache.len());
            }
        }

        #[test]
        fn prop_recency_order_matches_model(ops in prop::collection::vec(op(), 0..200)) {
            // Reference model: a Vec ordered MRU first.
            let capacity = 8;
            let mut cache = RecencyCache::new(capacity);
            let mut model: Vec<u8> = Vec::new();
            for op in ops {
                match op {
                    Op::Get(k) => {
                        let hit = cache.get(&(k % 16)).is_some();
                        let pos = model.iter().position(|&m| m == k % 16);
                        prop_assert_eq!(hit, pos.is_some());
                        if let Some(pos) = pos {
                            let key = model.remove(pos);
                            model.insert(0, key);
                        }
                    }
                    Op::Set(k) | Op::Put(k) => {
                        cache.put(k % 16, ());
                        model.retain(|&m| m != k % 16);
                        model.insert(0, k % 16);
                        model.truncate(capacity);
                    }
                }
                let order: Vec<u8> = cache.iter().map(|(k, _)| *k).collect();
                prop_assert_eq!(order, model.clone());
            }
        }
    }
}
