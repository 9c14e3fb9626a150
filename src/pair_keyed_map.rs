//! PairKeyedMap: a map addressed by an ordered pair of keys `(k1, k2)`.
//!
//! Built as a map of maps: the outer `OrderedHashMap` owns one inner
//! `OrderedHashMap` per distinct `k1`. The total entry count is cached.
//! Inner maps emptied by a removal are dropped from the outer map right away,
//! so every inner map present holds at least one entry.

use crate::ordered_hash_map::{self, OrderedHashMap};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use log::trace;
use std::collections::hash_map::RandomState;

/// A hash map whose entries are addressed by a pair of keys.
///
/// Iteration visits every `k1` in the order it was first inserted, and within
/// each `k1` every `k2` in its own insertion order. Overwriting an existing
/// pair keeps its position. When the last pair under some `k1` is removed that
/// `k1` is forgotten, so inserting under it again places it at the back.
///
/// ```
/// use pair_keyed_map::PairKeyedMap;
///
/// let mut m = PairKeyedMap::from([("a", 1, "x"), ("a", 2, "y"), ("b", 1, "z")]);
/// assert_eq!(m.len(), 3);
/// assert_eq!(m.get("a", &1), Some(&"x"));
/// assert!(!m.has("b", &2));
/// assert!(m.delete("a", &1));
///
/// let seen: Vec<_> = m.entries().collect();
/// assert_eq!(seen, vec![(&"a", &2, &"y"), (&"b", &1, &"z")]);
/// ```
pub struct PairKeyedMap<K1, K2, V, S = RandomState> {
    outer: OrderedHashMap<K1, OrderedHashMap<K2, V, S>, S>,
    // Cloned into every new inner map.
    hasher: S,
    len: usize,
}

impl<K1, K2, V> PairKeyedMap<K1, K2, V>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K1, K2, V> Default for PairKeyedMap<K1, K2, V>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K1, K2, V, S: Clone> PairKeyedMap<K1, K2, V, S> {
    /// Creates an empty map; both levels hash with clones of `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            outer: OrderedHashMap::with_hasher(hasher.clone()),
            hasher,
            len: 0,
        }
    }
}

impl<K1, K2, V, S> PairKeyedMap<K1, K2, V, S> {
    /// Number of `(k1, k2)` pairs stored. O(1).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct `k1` values that currently hold at least one entry.
    pub fn outer_len(&self) -> usize {
        self.outer.len()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Removes every entry. Calling it on an empty map is a no-op.
    pub fn clear(&mut self) {
        if self.len > 0 {
            trace!(
                "clearing pair map: {} entries under {} first keys",
                self.len,
                self.outer.len()
            );
        }
        self.outer.clear();
        self.len = 0;
    }

    /// Calls `visit(value, k1, k2)` for every entry in iteration order.
    ///
    /// The value comes first, mirroring single-key `for_each(value, key)`
    /// conventions.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&V, &K1, &K2),
    {
        for (k1, inner) in self.outer.iter() {
            for (k2, v) in inner.iter() {
                visit(v, k1, k2);
            }
        }
    }

    /// Lazy iterator over `(k1, k2, value)` triples.
    ///
    /// Every call starts a fresh pass over the current contents. The map cannot
    /// be mutated while the iterator is alive.
    pub fn entries(&self) -> Iter<'_, K1, K2, V, S> {
        Iter {
            outer: self.outer.iter(),
            current: None,
            remaining: self.len,
        }
    }

    /// Same as [`entries`](Self::entries).
    pub fn iter(&self) -> Iter<'_, K1, K2, V, S> {
        self.entries()
    }

    /// Lazy iterator over `(k1, k2)` pairs.
    pub fn keys(&self) -> Keys<'_, K1, K2, V, S> {
        Keys {
            inner: self.entries(),
        }
    }

    /// Lazy iterator over values.
    pub fn values(&self) -> Values<'_, K1, K2, V, S> {
        Values {
            inner: self.entries(),
        }
    }
}

impl<K1, K2, V, S> PairKeyedMap<K1, K2, V, S>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Builds a map by applying [`set`](Self::set) to each triple in order.
    /// Later triples overwrite earlier ones with the same pair.
    pub fn from_triples<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = (K1, K2, V)>,
        S: Default,
    {
        let mut m = Self::with_hasher(S::default());
        m.extend(triples);
        m
    }

    pub fn get<Q1, Q2>(&self, k1: &Q1, k2: &Q2) -> Option<&V>
    where
        K1: Borrow<Q1>,
        Q1: ?Sized + Hash + Eq,
        K2: Borrow<Q2>,
        Q2: ?Sized + Hash + Eq,
    {
        self.outer.get(k1)?.get(k2)
    }

    pub fn get_mut<Q1, Q2>(&mut self, k1: &Q1, k2: &Q2) -> Option<&mut V>
    where
        K1: Borrow<Q1>,
        Q1: ?Sized + Hash + Eq,
        K2: Borrow<Q2>,
        Q2: ?Sized + Hash + Eq,
    {
        self.outer.get_mut(k1)?.get_mut(k2)
    }

    /// Whether the pair is present, regardless of the stored value.
    pub fn has<Q1, Q2>(&self, k1: &Q1, k2: &Q2) -> bool
    where
        K1: Borrow<Q1>,
        Q1: ?Sized + Hash + Eq,
        K2: Borrow<Q2>,
        Q2: ?Sized + Hash + Eq,
    {
        self.outer
            .get(k1)
            .map(|inner| inner.contains_key(k2))
            .unwrap_or(false)
    }

    /// Stores `v` under `(k1, k2)` and returns the value it replaced.
    pub fn insert(&mut self, k1: K1, k2: K2, v: V) -> Option<V> {
        let outer_before = self.outer.len();
        let inner = self
            .outer
            .get_or_insert_with(k1, || OrderedHashMap::with_hasher(self.hasher.clone()));
        // The size delta covers both a fresh pair (+1) and an overwrite (+0).
        let inner_before = inner.len();
        let previous = inner.insert(k2, v);
        self.len += inner.len() - inner_before;
        if self.outer.len() != outer_before {
            trace!("created inner map, {} first keys", self.outer.len());
        }
        previous
    }

    /// Stores `v` under `(k1, k2)`, overwriting in place. Chainable.
    pub fn set(&mut self, k1: K1, k2: K2, v: V) -> &mut Self {
        self.insert(k1, k2, v);
        self
    }

    /// Removes the pair and returns its value. An inner map left empty is
    /// dropped along with its `k1`.
    pub fn remove<Q1, Q2>(&mut self, k1: &Q1, k2: &Q2) -> Option<V>
    where
        K1: Borrow<Q1>,
        Q1: ?Sized + Hash + Eq,
        K2: Borrow<Q2>,
        Q2: ?Sized + Hash + Eq,
    {
        let inner = self.outer.get_mut(k1)?;
        let removed = inner.remove(k2)?;
        self.len -= 1;
        if inner.is_empty() {
            self.outer.remove(k1);
            trace!("pruned empty inner map, {} first keys", self.outer.len());
        }
        Some(removed)
    }

    /// Removes the pair; returns whether anything was removed.
    pub fn delete<Q1, Q2>(&mut self, k1: &Q1, k2: &Q2) -> bool
    where
        K1: Borrow<Q1>,
        Q1: ?Sized + Hash + Eq,
        K2: Borrow<Q2>,
        Q2: ?Sized + Hash + Eq,
    {
        self.remove(k1, k2).is_some()
    }
}

impl<K1, K2, V, S> Clone for PairKeyedMap<K1, K2, V, S>
where
    K1: Clone,
    K2: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            outer: self.outer.clone(),
            hasher: self.hasher.clone(),
            len: self.len,
        }
    }
}

/// Content equality: same set of `(k1, k2, value)` triples. Order is ignored.
impl<K1, K2, V, S> PartialEq for PairKeyedMap<K1, K2, V, S>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
    V: PartialEq,
    S: BuildHasher + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .entries()
                .all(|(k1, k2, v)| other.get(k1, k2).map(|o| o == v).unwrap_or(false))
    }
}

impl<K1, K2, V, S> Eq for PairKeyedMap<K1, K2, V, S>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
    V: Eq,
    S: BuildHasher + Clone,
{
}

/// Diagnostic rendering: `{[PairKeyedMap]}` when empty, otherwise
/// `{[PairKeyedMap] (k1,k2) : v, ... }` in iteration order.
impl<K1, K2, V, S> fmt::Debug for PairKeyedMap<K1, K2, V, S>
where
    K1: fmt::Debug,
    K2: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{[PairKeyedMap]}");
        }
        f.write_str("{[PairKeyedMap] ")?;
        for (i, (k1, k2, v)) in self.entries().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "({:?},{:?}) : {:?}", k1, k2, v)?;
        }
        f.write_str(" }")
    }
}

impl<K1, K2, V, S> FromIterator<(K1, K2, V)> for PairKeyedMap<K1, K2, V, S>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K1, K2, V)>>(iter: I) -> Self {
        Self::from_triples(iter)
    }
}

impl<K1, K2, V, S> Extend<(K1, K2, V)> for PairKeyedMap<K1, K2, V, S>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
    S: BuildHasher + Clone,
{
    fn extend<I: IntoIterator<Item = (K1, K2, V)>>(&mut self, iter: I) {
        for (k1, k2, v) in iter {
            self.set(k1, k2, v);
        }
    }
}

impl<K1, K2, V, const N: usize> From<[(K1, K2, V); N]> for PairKeyedMap<K1, K2, V>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
{
    fn from(triples: [(K1, K2, V); N]) -> Self {
        Self::from_triples(triples)
    }
}

impl<'a, K1, K2, V, S> IntoIterator for &'a PairKeyedMap<K1, K2, V, S> {
    type Item = (&'a K1, &'a K2, &'a V);
    type IntoIter = Iter<'a, K1, K2, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

/// Iterator over `(k1, k2, value)` triples, created by
/// [`PairKeyedMap::entries`].
pub struct Iter<'a, K1, K2, V, S> {
    outer: ordered_hash_map::Iter<'a, K1, OrderedHashMap<K2, V, S>>,
    current: Option<(&'a K1, ordered_hash_map::Iter<'a, K2, V>)>,
    remaining: usize,
}

impl<K1, K2, V, S> Clone for Iter<'_, K1, K2, V, S> {
    fn clone(&self) -> Self {
        Self {
            outer: self.outer.clone(),
            current: self.current.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, K1, K2, V, S> Iterator for Iter<'a, K1, K2, V, S> {
    type Item = (&'a K1, &'a K2, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((k1, inner)) = &mut self.current {
                if let Some((k2, v)) = inner.next() {
                    self.remaining = self.remaining.saturating_sub(1);
                    return Some((*k1, k2, v));
                }
            }
            let (k1, inner) = self.outer.next()?;
            self.current = Some((k1, inner.iter()));
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K1, K2, V, S> ExactSizeIterator for Iter<'_, K1, K2, V, S> {}

impl<K1, K2, V, S> FusedIterator for Iter<'_, K1, K2, V, S> {}

/// Iterator over `(k1, k2)` pairs, created by [`PairKeyedMap::keys`].
pub struct Keys<'a, K1, K2, V, S> {
    inner: Iter<'a, K1, K2, V, S>,
}

impl<K1, K2, V, S> Clone for Keys<'_, K1, K2, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K1, K2, V, S> Iterator for Keys<'a, K1, K2, V, S> {
    type Item = (&'a K1, &'a K2);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k1, k2, _)| (k1, k2))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K1, K2, V, S> ExactSizeIterator for Keys<'_, K1, K2, V, S> {}

impl<K1, K2, V, S> FusedIterator for Keys<'_, K1, K2, V, S> {}

/// Iterator over values, created by [`PairKeyedMap::values`].
pub struct Values<'a, K1, K2, V, S> {
    inner: Iter<'a, K1, K2, V, S>,
}

impl<K1, K2, V, S> Clone for Values<'_, K1, K2, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K1, K2, V, S> Iterator for Values<'a, K1, K2, V, S> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, _, v)| v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K1, K2, V, S> ExactSizeIterator for Values<'_, K1, K2, V, S> {}

impl<K1, K2, V, S> FusedIterator for Values<'_, K1, K2, V, S> {}
