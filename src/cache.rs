//! Fixed-capacity FIFO cache for hydrated records.
//!
//! Keys are kept in first-insertion order. Updating an existing key replaces
//! its value in place and does not refresh its position, so an old key that
//! is updated often is still the first to go. This is FIFO, not LRU.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Default capacity used for note list viewports.
pub const DEFAULT_CAPACITY: usize = 100;

/// Insertion-ordered map that evicts its oldest keys once full.
///
/// Single owner; not synchronized.
///
/// # Examples
///
/// ```
/// use inkvault::EvictingMap;
///
/// let mut map = EvictingMap::new(2);
/// map.add([("a", 1), ("b", 2)]);
/// map.add([("a", 10), ("c", 3)]);
///
/// // "a" kept its original slot, so it was evicted first.
/// assert!(!map.has(&"a"));
/// assert_eq!(map.get_all(), vec![(&"b", &2), (&"c", &3)]);
/// ```
#[derive(Debug, Clone)]
pub struct EvictingMap<K, V> {
    capacity: usize,
    order: VecDeque<K>,
    data: HashMap<K, V>,
}

impl<K, V> EvictingMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            data: HashMap::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Merges `entries` into the map, then evicts from the front until the
    /// map fits its capacity.
    ///
    /// Accepts anything iterable as key/value pairs: ordered `Vec`s, arrays,
    /// or a `HashMap` (whose iteration order then decides the tail order).
    pub fn add<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            if self.data.insert(key.clone(), value).is_none() {
                self.order.push_back(key);
            }
        }

        let extra = self.order.len().saturating_sub(self.capacity);
        if extra > 0 {
            tracing::trace!(evicted = extra, capacity = self.capacity, "evicting oldest cache entries");
            for key in self.order.drain(..extra) {
                self.data.remove(&key);
            }
        }
    }

    /// Removes the given keys. Absent keys are ignored.
    pub fn delete<'a, I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut removed = false;
        for key in keys {
            removed |= self.data.remove(key).is_some();
        }
        if removed {
            let data = &self.data;
            self.order.retain(|key| data.contains_key(key));
        }
    }

    pub fn has(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.data.get(key)
    }

    /// Returns every entry, oldest first.
    pub fn get_all(&self) -> Vec<(&K, &V)> {
        self.order
            .iter()
            .filter_map(|key| self.data.get_key_value(key))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
