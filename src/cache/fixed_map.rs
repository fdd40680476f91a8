use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;


/// A map holding at most `capacity` keys.
///
/// Inserting a new key into a full map evicts the key that was inserted
/// first. Lookups do not affect the eviction order, so this is a FIFO rather
/// than an LRU.
#[derive(Debug, Clone)]
pub struct FixedMap<K, V> {
    map: HashMap<K, V>,
    // Newest key at the front
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> FixedMap<K, V> {
    /// Creates an empty map for `capacity` keys. A capacity of zero is
    /// raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key)
    }

    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get_mut(key)
    }

    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Inserts `value` under `key`, returning the evicted pair if a new key
    /// pushed the oldest one out.
    ///
    /// Replacing the value of a present key keeps its place in the eviction
    /// order.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.map.get_mut(&key) {
            *slot = value;
            return None;
        }

        let evicted = if self.map.len() >= self.capacity {
            self.order.pop_back()
                .and_then(|old| self.map.remove(&old).map(|v| (old, v)))
        } else {
            None
        };
        self.order.push_front(key.clone());
        self.map.insert(key, value);
        evicted
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.map.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| <K as Borrow<Q>>::borrow(k) == key) {
            self.order.remove(pos);
        }
        Some(value)
    }

    /// Keeps only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        self.map.retain(|k, v| keep(k, v));
        let map = &self.map;
        self.order.retain(|k| map.contains_key(k));
    }

    /// Iterates over all keys, newest first.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.order.iter()
    }
}
