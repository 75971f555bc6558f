//! Advisory (component, addr) -> (cell, alias) lookup cache (spec section
//! 4.9). Purely an accelerator: [`crate::mm::cell::PageManager`] never
//! trusts a hit without rechecking it against the cell itself, so a stale
//! entry left behind by a revoke is harmless, not a correctness hazard.

use crate::consts::CACHE_SIZE;
use crate::facade::ComponentId;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    component: ComponentId,
    addr: usize,
    cell: usize,
    alias: usize,
}

const EMPTY_ENTRY: CacheEntry = CacheEntry {
    component: ComponentId::NONE,
    addr: 0,
    cell: 0,
    alias: 0,
};

/// A fixed-size circular buffer of the most recently resolved mappings.
pub struct AddressCache {
    slots: [CacheEntry; CACHE_SIZE],
    head: usize,
}

impl AddressCache {
    pub const fn new() -> Self {
        Self {
            slots: [EMPTY_ENTRY; CACHE_SIZE],
            head: 0,
        }
    }

    /// Linear scan for a cached `(component, addr)` hit.
    pub fn lookup(&self, component: ComponentId, addr: usize) -> Option<(usize, usize)> {
        self.slots
            .iter()
            .find(|e| !component.is_none() && e.component == component && e.addr == addr)
            .map(|e| (e.cell, e.alias))
    }

    /// Insert a freshly resolved mapping at the write head, advancing it
    /// circularly. Overwrites whatever was there, stale or not.
    pub fn add(&mut self, component: ComponentId, addr: usize, cell: usize, alias: usize) {
        debug_assert!(!component.is_none(), "cache entries are never keyed on component 0");
        self.slots[self.head] = CacheEntry {
            component,
            addr,
            cell,
            alias,
        };
        self.head = (self.head + 1) % CACHE_SIZE;
    }

    /// Drop the entry for `(component, addr)` if present, and reuse its slot
    /// as the next write head. A no-op if the entry was already overwritten
    /// by circular reuse, matching the source's tolerance for cache misses
    /// on a revoked mapping.
    pub fn remove(&mut self, component: ComponentId, addr: usize) {
        if let Some(idx) = self
            .slots
            .iter()
            .position(|e| e.component == component && e.addr == addr)
        {
            self.slots[idx].component = ComponentId::NONE;
            self.head = idx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_lookup() {
        let mut cache = AddressCache::new();
        cache.add(ComponentId(1), 0x1000, 5, 0);
        assert_eq!(cache.lookup(ComponentId(1), 0x1000), Some((5, 0)));
    }

    #[test]
    fn remove_clears_entry() {
        let mut cache = AddressCache::new();
        cache.add(ComponentId(1), 0x1000, 5, 0);
        cache.remove(ComponentId(1), 0x1000);
        assert_eq!(cache.lookup(ComponentId(1), 0x1000), None);
    }

    #[test]
    fn wraps_around_circularly() {
        let mut cache = AddressCache::new();
        for i in 0..CACHE_SIZE + 1 {
            cache.add(ComponentId(1), i, i, 0);
        }
        // the very first insert should have been overwritten by wraparound
        assert_eq!(cache.lookup(ComponentId(1), 0), None);
        assert_eq!(cache.lookup(ComponentId(1), CACHE_SIZE), Some((CACHE_SIZE, 0)));
    }
}
