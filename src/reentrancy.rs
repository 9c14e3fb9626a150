//! Debug-only reentrancy detection for the ordered map layer.
//!
//! `OrderedHashMap` calls into user code (`K: Eq`, `K: Hash`) while its index
//! and slot storage may disagree. A key whose `Eq` reaches back into the same
//! map would observe that state, so each structural method enters a guard.
//! Debug builds panic on nested entry; release builds carry no state.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-map tracker. Methods open a section with `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    depth: Cell<u32>,
    // Keeps every map that embeds this !Send + !Sync.
    _single_thread: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            depth: Cell::new(0),
            _single_thread: PhantomData,
        }
    }

    /// Opens a guarded section. Panics in debug builds if one is already open.
    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let depth = self.depth.get();
            assert!(
                depth == 0,
                "reentrancy detected: key Eq/Hash called back into the map"
            );
            self.depth.set(depth + 1);
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard { _owner: PhantomData }
        }
    }

    #[cfg(all(test, debug_assertions))]
    fn is_entered(&self) -> bool {
        self.depth.get() > 0
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

// A cloned map starts outside any guarded section.
impl Clone for DebugReentrancy {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// RAII section returned by [`DebugReentrancy::enter`].
pub(crate) struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let depth = self.owner.depth.get();
            debug_assert!(depth > 0);
            self.owner.depth.set(depth - 1);
        }
    }
}
