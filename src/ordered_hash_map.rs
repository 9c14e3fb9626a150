//! OrderedHashMap: insertion-ordered hash map used for both levels of
//! `PairKeyedMap`.
//!
//! Entries live in a `SlotMap` and are threaded onto a doubly linked list in
//! insertion order. A `HashTable` of slot keys provides O(1) average lookup.
//! Every entry caches its hash, so the index never rehashes through `K: Hash`.
//!
//! Ordering rules:
//! - overwriting an existing key keeps its position;
//! - removal unlinks in O(1) without disturbing the others;
//! - a key inserted again after removal goes to the back.

use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

type Slots<K, V> = SlotMap<DefaultKey, Entry<K, V>>;

/// Ends of the insertion-order list.
#[derive(Clone, Copy, Debug, Default)]
struct Links {
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
}

impl Links {
    /// Appends `slot`, whose `prev` must already point at the current tail.
    fn push_back<K, V>(&mut self, slots: &mut Slots<K, V>, slot: DefaultKey) {
        match self.tail.and_then(|t| slots.get_mut(t)) {
            Some(tail) => tail.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    /// Joins the neighbours of an entry that has left `slots`.
    fn unlink<K, V>(
        &mut self,
        slots: &mut Slots<K, V>,
        prev: Option<DefaultKey>,
        next: Option<DefaultKey>,
    ) {
        match prev.and_then(|p| slots.get_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| slots.get_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
    }
}

pub(crate) struct OrderedHashMap<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: Slots<K, V>,
    links: Links,
    reentrancy: DebugReentrancy,
}

impl<K, V> OrderedHashMap<K, V>
where
    K: Eq + Hash,
{
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S: Clone> Clone for OrderedHashMap<K, V, S>
where
    K: Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        // Slot keys survive a SlotMap clone, so the index and links stay valid.
        Self {
            hasher: self.hasher.clone(),
            index: self.index.clone(),
            slots: self.slots.clone(),
            links: self.links,
            reentrancy: DebugReentrancy::new(),
        }
    }
}

impl<K, V, S> OrderedHashMap<K, V, S> {
    pub(crate) fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            links: Links::default(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        let _g = self.reentrancy.enter();
        self.index.clear();
        self.slots.clear();
        self.links = Links::default();
    }

    /// Entries in insertion order.
    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            next: self.links.head,
            remaining: self.slots.len(),
        }
    }
}

impl<K, V, S> OrderedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    // Callers hold the reentrancy guard.
    fn find_slot<Q>(&self, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&slot| {
                self.slots
                    .get(slot)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub(crate) fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let slot = self.find_slot(q)?;
        self.slots.get(slot).map(|e| &e.value)
    }

    pub(crate) fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let slot = self.find_slot(q)?;
        self.slots.get_mut(slot).map(|e| &mut e.value)
    }

    pub(crate) fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.find_slot(q).is_some()
    }

    /// Inserts or overwrites. An overwritten key keeps its position and the
    /// previous value is returned.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&slot| self.slots.get(slot).map(|e| e.key == key).unwrap_or(false),
            |&slot| self.slots.get(slot).map(|e| e.hash).unwrap_or(0),
        ) {
            TableEntry::Occupied(o) => {
                let slot = *o.get();
                self.slots
                    .get_mut(slot)
                    .map(|e| core::mem::replace(&mut e.value, value))
            }
            TableEntry::Vacant(v) => {
                let slot = self.slots.insert(Entry {
                    key,
                    value,
                    hash,
                    prev: self.links.tail,
                    next: None,
                });
                let _ = v.insert(slot);
                self.links.push_back(&mut self.slots, slot);
                None
            }
        }
    }

    /// Returns the value for `key`, appending `default()` first if absent.
    /// `default` runs only when the key is new.
    pub(crate) fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        let slot = match self.index.entry(
            hash,
            |&slot| self.slots.get(slot).map(|e| e.key == key).unwrap_or(false),
            |&slot| self.slots.get(slot).map(|e| e.hash).unwrap_or(0),
        ) {
            TableEntry::Occupied(o) => *o.get(),
            TableEntry::Vacant(v) => {
                let slot = self.slots.insert(Entry {
                    key,
                    value: default(),
                    hash,
                    prev: self.links.tail,
                    next: None,
                });
                let _ = v.insert(slot);
                self.links.push_back(&mut self.slots, slot);
                slot
            }
        };
        // The slot was either found through the index or inserted above.
        &mut self.slots[slot].value
    }

    pub(crate) fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        let found = self
            .index
            .find_entry(hash, |&slot| {
                self.slots
                    .get(slot)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .ok()?;
        let (slot, _) = found.remove();
        let entry = self.slots.remove(slot)?;
        self.links.unlink(&mut self.slots, entry.prev, entry.next);
        Some(entry.value)
    }
}

/// Insertion-ordered iterator over an `OrderedHashMap`.
pub(crate) struct Iter<'a, K, V> {
    slots: &'a Slots<K, V>,
    next: Option<DefaultKey>,
    remaining: usize,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots,
            next: self.next,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.slots.get(self.next?)?;
        self.next = entry.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&entry.key, &entry.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::hash::Hasher;

    fn keys<K: Clone, V, S>(m: &OrderedHashMap<K, V, S>) -> Vec<K> {
        m.iter().map(|(k, _)| k.clone()).collect()
    }

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        } // every key lands in the same bucket
    }

    /// Invariant: iteration follows insertion order, not hash order.
    #[test]
    fn iteration_follows_insertion_order() {
        let mut m: OrderedHashMap<String, i32> = OrderedHashMap::new();
        for (i, k) in ["delta", "alpha", "charlie", "bravo"].iter().enumerate() {
            assert!(m.insert((*k).to_string(), i as i32).is_none());
        }
        assert_eq!(keys(&m), vec!["delta", "alpha", "charlie", "bravo"]);
        let values: Vec<i32> = m.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    /// Invariant: overwriting returns the old value and keeps the key's position.
    #[test]
    fn overwrite_keeps_position() {
        let mut m: OrderedHashMap<&'static str, i32> = OrderedHashMap::new();
        m.insert("a", 1);
        m.insert("b", 2);
        m.insert("c", 3);
        assert_eq!(m.insert("a", 10), Some(1));
        assert_eq!(m.len(), 3);
        assert_eq!(keys(&m), vec!["a", "b", "c"]);
        assert_eq!(m.get("a"), Some(&10));
    }

    /// Invariant: removing head, middle and tail relinks neighbours correctly.
    #[test]
    fn remove_relinks_head_middle_tail() {
        let mut m: OrderedHashMap<i32, i32> = OrderedHashMap::new();
        for k in 0..5 {
            m.insert(k, k * 10);
        }
        assert_eq!(m.remove(&2), Some(20));
        assert_eq!(keys(&m), vec![0, 1, 3, 4]);
        assert_eq!(m.remove(&0), Some(0));
        assert_eq!(keys(&m), vec![1, 3, 4]);
        assert_eq!(m.remove(&4), Some(40));
        assert_eq!(keys(&m), vec![1, 3]);
        assert_eq!(m.remove(&4), None);

        // Appending after tail removal must attach to the new tail.
        m.insert(7, 70);
        assert_eq!(keys(&m), vec![1, 3, 7]);
        m.remove(&1);
        m.remove(&3);
        m.remove(&7);
        assert!(m.is_empty());
        assert_eq!(m.iter().next(), None);
        m.insert(9, 90);
        assert_eq!(keys(&m), vec![9]);
    }

    /// Invariant: a removed key inserted again goes to the back.
    #[test]
    fn reinsert_after_remove_appends() {
        let mut m: OrderedHashMap<&'static str, i32> = OrderedHashMap::new();
        m.insert("x", 1);
        m.insert("y", 2);
        assert_eq!(m.remove("x"), Some(1));
        assert!(!m.contains_key("x"));
        m.insert("x", 3);
        assert_eq!(keys(&m), vec!["y", "x"]);
        assert_eq!(m.get("x"), Some(&3));
    }

    /// Invariant: borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: OrderedHashMap<String, i32> = OrderedHashMap::new();
        m.insert("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert_eq!(m.get("hello"), Some(&1));
        if let Some(v) = m.get_mut("hello") {
            *v += 1;
        }
        assert_eq!(m.get("hello"), Some(&2));
        assert_eq!(m.remove("hello"), Some(2));
        assert!(m.is_empty());
    }

    /// Invariant: lookups, overwrites and removals resolve through `Eq` when
    /// every key collides.
    #[test]
    fn collision_handling_with_const_hasher() {
        let mut m: OrderedHashMap<String, i32, ConstBuildHasher> =
            OrderedHashMap::with_hasher(ConstBuildHasher);
        m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);
        m.insert("c".to_string(), 3);
        assert_eq!(m.insert("b".to_string(), 20), Some(2));
        assert_eq!(m.get("a"), Some(&1));
        assert_eq!(m.get("b"), Some(&20));
        assert_eq!(m.remove("a"), Some(1));
        assert_eq!(m.get("c"), Some(&3));
        assert_eq!(keys(&m), vec!["b".to_string(), "c".to_string()]);
    }

    /// Invariant: `get_or_insert_with` only runs `default` for a new key and
    /// appends it; an existing key is returned in place.
    #[test]
    fn get_or_insert_with_is_lazy() {
        let mut m: OrderedHashMap<&'static str, Vec<i32>> = OrderedHashMap::new();
        let calls = Cell::new(0);
        let make = || {
            calls.set(calls.get() + 1);
            Vec::new()
        };
        m.get_or_insert_with("a", make).push(1);
        m.get_or_insert_with("b", || Vec::new()).push(2);
        m.get_or_insert_with("a", || {
            calls.set(calls.get() + 1);
            Vec::new()
        })
        .push(3);
        assert_eq!(calls.get(), 1, "default must not run for an existing key");
        assert_eq!(m.get("a"), Some(&vec![1, 3]));
        assert_eq!(keys(&m), vec!["a", "b"]);
    }

    /// Invariant: `clear` empties storage and order; the map is reusable.
    #[test]
    fn clear_resets_everything() {
        let mut m: OrderedHashMap<i32, i32> = OrderedHashMap::new();
        for k in 0..10 {
            m.insert(k, k);
        }
        m.clear();
        assert_eq!(m.len(), 0);
        assert!(m.is_empty());
        assert!(!m.contains_key(&3));
        assert_eq!(m.iter().count(), 0);
        m.insert(42, 1);
        assert_eq!(keys(&m), vec![42]);
        m.clear();
        m.clear();
        assert!(m.is_empty());
    }

    /// Invariant: the iterator reports an exact length and is fused.
    #[test]
    fn iterator_is_exact_and_fused() {
        let mut m: OrderedHashMap<i32, i32> = OrderedHashMap::new();
        for k in 0..4 {
            m.insert(k, k);
        }
        m.remove(&1);
        let mut it = m.iter();
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.size_hint(), (2, Some(2)));
        let rest = it.clone().count();
        assert_eq!(rest, 2);
        it.next();
        it.next();
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    /// Invariant: a clone is independent and preserves order.
    #[test]
    fn clone_is_independent() {
        let mut m: OrderedHashMap<i32, String> = OrderedHashMap::new();
        m.insert(3, "c".into());
        m.insert(1, "a".into());
        let mut c = m.clone();
        c.insert(2, "b".into());
        c.remove(&3);
        assert_eq!(keys(&m), vec![3, 1]);
        assert_eq!(keys(&c), vec![1, 2]);
    }

    /// Invariant (debug-only): re-entering the map from `K: Eq` during a probe
    /// panics due to the reentrancy guard.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrancy_panics_from_eq_during_get() {
        struct ReentryKey {
            id: &'static str,
            map: *const OrderedHashMap<ReentryKey, i32, ConstBuildHasher>,
            trigger: bool,
        }
        impl PartialEq for ReentryKey {
            fn eq(&self, other: &Self) -> bool {
                if self.id == other.id {
                    return true;
                }
                if other.trigger {
                    // Attempt to re-enter the same map during probing.
                    unsafe {
                        let m = &*other.map;
                        let _ = m.contains_key(self.id);
                    }
                }
                false
            }
        }
        impl Eq for ReentryKey {}
        impl Hash for ReentryKey {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }
        impl Borrow<str> for ReentryKey {
            fn borrow(&self) -> &str {
                self.id
            }
        }

        let mut m: OrderedHashMap<ReentryKey, i32, ConstBuildHasher> =
            OrderedHashMap::with_hasher(ConstBuildHasher);
        let stored = ReentryKey {
            id: "a",
            map: &m as *const _,
            trigger: false,
        };
        m.insert(stored, 1);

        let query = ReentryKey {
            id: "b",
            map: &m as *const _,
            trigger: true,
        };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = m.get(&query);
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    }
}
