//! Growable hash table with separate chaining.
//!
//! Buckets are singly linked chains. New keys are pushed at the head of their
//! chain. Once an insertion brings the load factor (`len / capacity`) to 0.75
//! the bucket array doubles and every node is moved by popping it off the head
//! of its old chain and pushing it onto the head of its new one, so nodes that
//! share a new bucket come out in reverse order.
//!
//! The table has no synchronization of its own; see
//! [`SequencedLedger`](crate::SequencedLedger) for the locked wrapper.

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};

/// Number of buckets a table starts with.
pub const DEFAULT_CAPACITY: usize = 16;

struct Node<K, V> {
    key: K,
    value: V,
    hash: u64,
    next: Link<K, V>,
}

type Link<K, V> = Option<Box<Node<K, V>>>;

/// Separate-chaining hash table that only ever grows.
pub struct ResizableChainTable<K, V, S = RandomState> {
    buckets: Vec<Link<K, V>>,
    len: usize,
    hasher: S,
}

impl<K: Hash + Eq, V> ResizableChainTable<K, V, RandomState> {
    /// Creates an empty table with [`DEFAULT_CAPACITY`] buckets.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty table with at least `capacity` buckets.
    ///
    /// The bucket count is rounded up to a power of two and never drops below
    /// [`DEFAULT_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> ResizableChainTable<K, V, S> {
    /// Creates an empty table using `hasher` to hash keys.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let capacity = capacity.max(DEFAULT_CAPACITY).next_power_of_two();
        Self {
            buckets: empty_buckets(capacity),
            len: 0,
            hasher,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Looks up the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.hasher.hash_one(key);
        let mut cursor = self.buckets[self.bucket_index(hash)].as_deref();
        while let Some(node) = cursor {
            if node.hash == hash && node.key == *key {
                return Some(&node.value);
            }
            cursor = node.next.as_deref();
        }
        None
    }

    /// Stores `value` under `key`, overwriting any existing value in place.
    ///
    /// Inserting a new key may double the bucket array.
    pub fn put(&mut self, key: K, value: V) {
        let hash = self.hasher.hash_one(&key);
        let idx = self.bucket_index(hash);

        let mut cursor = self.buckets[idx].as_deref_mut();
        while let Some(node) = cursor {
            if node.hash == hash && node.key == key {
                node.value = value;
                return;
            }
            cursor = node.next.as_deref_mut();
        }

        let head = self.buckets[idx].take();
        self.buckets[idx] = Some(Box::new(Node {
            key,
            value,
            hash,
            next: head,
        }));
        self.len += 1;

        // len / capacity >= 0.75
        if self.len * 4 >= self.buckets.len() * 3 {
            self.grow();
        }
    }

    /// Iterates over all entries in bucket order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            node: None,
        }
    }

    fn bucket_index(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn grow(&mut self) {
        let new_capacity = self.buckets.len() << 1;
        let mut new_buckets = empty_buckets(new_capacity);

        for bucket in self.buckets.iter_mut() {
            while let Some(mut node) = bucket.take() {
                *bucket = node.next.take();
                let idx = (node.hash as usize) & (new_capacity - 1);
                node.next = new_buckets[idx].take();
                new_buckets[idx] = Some(node);
            }
        }

        tracing::trace!(
            len = self.len,
            from = self.buckets.len(),
            to = new_capacity,
            "chain table resized"
        );
        self.buckets = new_buckets;
    }

    #[cfg(test)]
    fn chain(&self, idx: usize) -> Vec<&K> {
        let mut keys = Vec::new();
        let mut cursor = self.buckets[idx].as_deref();
        while let Some(node) = cursor {
            keys.push(&node.key);
            cursor = node.next.as_deref();
        }
        keys
    }
}

impl<K: Hash + Eq, V> Default for ResizableChainTable<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Drop for ResizableChainTable<K, V, S> {
    fn drop(&mut self) {
        // Unlink iteratively so long chains cannot overflow the stack.
        for bucket in self.buckets.iter_mut() {
            let mut link = bucket.take();
            while let Some(mut node) = link {
                link = node.next.take();
            }
        }
    }
}

impl<K, V, S> fmt::Debug for ResizableChainTable<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResizableChainTable")
            .field("len", &self.len)
            .field("capacity", &self.buckets.len())
            .finish()
    }
}

fn empty_buckets<K, V>(capacity: usize) -> Vec<Link<K, V>> {
    let mut buckets = Vec::with_capacity(capacity);
    buckets.resize_with(capacity, || None);
    buckets
}

/// Iterator over the entries of a [`ResizableChainTable`].
pub struct Iter<'a, K, V> {
    buckets: std::slice::Iter<'a, Link<K, V>>,
    node: Option<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                self.node = node.next.as_deref();
                return Some((&node.key, &node.value));
            }
            self.node = self.buckets.next()?.as_deref();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::hash::{BuildHasherDefault, Hasher};

    /// Hashes a `usize` to itself so bucket placement is predictable.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | u64::from(b);
            }
        }

        fn write_usize(&mut self, n: usize) {
            self.0 = n as u64;
        }
    }

    type IdentityTable = ResizableChainTable<usize, i64, BuildHasherDefault<IdentityHasher>>;

    fn identity_table() -> IdentityTable {
        ResizableChainTable::with_capacity_and_hasher(16, BuildHasherDefault::default())
    }

    #[test]
    fn test_get_missing() {
        let table: ResizableChainTable<usize, i64> = ResizableChainTable::new();
        assert_eq!(table.get(&3), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_put_overwrites_in_place() {
        let mut table = ResizableChainTable::new();
        table.put(7usize, 100i64);
        table.put(7, 250);
        assert_eq!(table.get(&7), Some(&250));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_resize_threshold() {
        let mut table = identity_table();
        // 11 / 16 < 0.75
        for key in 0..11 {
            table.put(key, key as i64);
        }
        assert_eq!(table.capacity(), 16);

        // 12 / 16 == 0.75 triggers the doubling.
        table.put(11, 11);
        assert_eq!(table.capacity(), 32);

        // Overwrites never grow the table.
        table.put(11, -1);
        assert_eq!(table.len(), 12);
        assert_eq!(table.capacity(), 32);
    }

    #[test]
    fn test_round_trip_across_thresholds() {
        // 12, 24 and 48 are the resize points for 16, 32 and 64 buckets.
        for k in [1usize, 11, 12, 13, 23, 24, 25, 47, 48, 49, 200] {
            let mut table = ResizableChainTable::new();
            for key in 0..k {
                table.put(key, (key * 10) as i64);
            }
            for key in 0..k {
                assert_eq!(table.get(&key), Some(&((key * 10) as i64)), "k={k} key={key}");
            }
            assert_eq!(table.get(&k), None);
            assert_eq!(table.len(), k);
            assert!(table.len() * 4 < table.capacity() * 3);
        }
    }

    #[test]
    fn test_many_resizes_preserve_latest_values() {
        let mut table = ResizableChainTable::new();
        let mut model = HashMap::new();

        for round in 0..3i64 {
            for key in 0..500usize {
                let value = key as i64 * 3 + round;
                table.put(key, value);
                model.insert(key, value);
            }
        }

        // 16 -> 32 -> 64 -> 128 -> 256 -> 512 -> 1024
        assert_eq!(table.capacity(), 1024);
        assert_eq!(table.len(), model.len());
        for (key, value) in &model {
            assert_eq!(table.get(key), Some(value));
        }

        let mut seen: Vec<usize> = table.iter().map(|(k, _)| *k).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_resize_reverses_shared_chain() {
        let mut table = identity_table();
        table.put(0, 0);
        table.put(64, 64);
        assert_eq!(table.chain(0), vec![&64usize, &0]);

        // Fill other buckets until the table doubles to 32; 0 and 64 stay together.
        for key in 1..11 {
            table.put(key, key as i64);
        }
        assert_eq!(table.capacity(), 32);
        assert_eq!(table.chain(0), vec![&0usize, &64]);
        assert_eq!(table.get(&0), Some(&0));
        assert_eq!(table.get(&64), Some(&64));
    }

    #[test]
    fn test_with_capacity_rounds_up() {
        let table: ResizableChainTable<usize, i64> = ResizableChainTable::with_capacity(100);
        assert_eq!(table.capacity(), 128);

        let small: ResizableChainTable<usize, i64> = ResizableChainTable::with_capacity(1);
        assert_eq!(small.capacity(), DEFAULT_CAPACITY);
    }
}
