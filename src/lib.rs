//! pair-keyed-map: a single-threaded map addressed by an ordered pair of keys
//! `(k1, k2)`, with insertion-ordered iteration and an O(1) entry count.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: get the semantics of a composite-key map exactly right (size
//!   bookkeeping under overwrite and delete, iteration order, key equality)
//!   on top of a small ordered hash map that can be tested on its own.
//! - Layers:
//!   - OrderedHashMap<K, V, S>: insertion-ordered hash map. Entries live in a
//!     generational slot map and are linked in insertion order; a hash table
//!     of slot keys gives O(1) average lookup. Includes a debug-only
//!     reentrancy guard so internals stay consistent while mutating.
//!   - PairKeyedMap<K1, K2, V, S>: public API. An outer OrderedHashMap owns
//!     one inner OrderedHashMap per distinct `k1` and caches the total count.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (marker type in the reentrancy guard).
//! - O(1) average `get`/`has`/`set`/`delete`; O(1) `len`.
//! - Iteration: `k1` in first-insertion order, then `k2` in insertion order
//!   within that `k1`. Overwriting a pair keeps its position.
//! - Keys compare with `Eq` + `Hash`; lookups accept borrowed forms.
//!
//! Empty inner maps
//! - Removing the last pair under a `k1` drops that inner map from the outer
//!   map immediately. `outer_len()` therefore counts exactly the `k1` values
//!   holding entries, and a `k1` that is emptied and used again moves to the
//!   back of the iteration order.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its precomputed `u64` hash; resizing the index never
//!   calls `K: Hash`. Inner maps hash with clones of the map's `S`.
//!
//! Notes and non-goals
//! - No persistence, no concurrent access, no keys deeper than a pair.
//! - Iterators borrow the map, so mutation during traversal does not compile.
//! - `Debug` is the diagnostic renderer; nothing in the core depends on it.
//! - Structural events (inner map created or pruned, map cleared) are logged
//!   at `trace` level through the `log` facade.

mod ordered_hash_map;
mod pair_keyed_map;
mod pair_keyed_map_proptest;
mod reentrancy;

// Public surface
pub use pair_keyed_map::{Iter, Keys, PairKeyedMap, Values};
