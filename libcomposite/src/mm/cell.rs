//! The physical-page cell table and alias tree (spec sections 4.6-4.9): each
//! frame is a cell with up to `MAX_ALIASES` live mappings, linked into a
//! parent/child alias tree rooted at the grant that first brought the frame
//! into use.

use crate::consts::{MAX_ALIASES, MAX_MEMORY};
use crate::error::{MmError, MmResult};
use crate::facade::{ComponentId, FrameIndex, KernelFacade};
use crate::mm::cache::AddressCache;

/// Backward distance from `last_found` the scan starts at, matching the
/// locality heuristic `find_cell` in the source this was distilled from
/// used to avoid rescanning from the front of the table every time.
const SCAN_BACKTRACK: usize = 150;

/// One (component, addr) mapping of a cell, with a link to the alias it was
/// derived from. `owner == ComponentId::NONE` marks an empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingInfo {
    pub owner: ComponentId,
    pub addr: usize,
    pub parent: Option<u8>,
}

pub const EMPTY_MAPPING: MappingInfo = MappingInfo {
    owner: ComponentId::NONE,
    addr: 0,
    parent: None,
};

/// A single physical frame's alias tree.
#[derive(Debug, Clone, Copy)]
pub struct PageCell {
    pub naliases: u32,
    pub map: [MappingInfo; MAX_ALIASES],
}

impl PageCell {
    pub const EMPTY: PageCell = PageCell {
        naliases: 0,
        map: [EMPTY_MAPPING; MAX_ALIASES],
    };

    pub fn is_unused(&self) -> bool {
        self.naliases == 0
    }
}

/// Walk `map` from `child` up through `parent` links looking for `parent_idx`,
/// bounded to `MAX_ALIASES` steps. A walk that exceeds the bound indicates a
/// malformed (cyclic) parent chain rather than a real ancestor relationship.
fn is_descendant(map: &[MappingInfo; MAX_ALIASES], parent_idx: usize, child: usize) -> MmResult<bool> {
    let mut cur = child;
    for _ in 0..MAX_ALIASES {
        match map[cur].parent {
            None => return Ok(false),
            Some(p) => {
                let p = p as usize;
                if p == parent_idx {
                    return Ok(true);
                }
                cur = p;
            }
        }
    }
    Err(MmError::InvalidState)
}

/// Brokers page grants, aliases, and revocation across components (spec
/// section 4.6-4.9). Source of truth for every live mapping; the address
/// cache is purely an accelerator on top of it.
pub struct PageManager {
    cells: [PageCell; MAX_MEMORY],
    cache: AddressCache,
    last_found: usize,
}

impl PageManager {
    pub const fn new() -> Self {
        Self {
            cells: [PageCell::EMPTY; MAX_MEMORY],
            cache: AddressCache::new(),
            last_found: 0,
        }
    }

    /// Grant a fresh frame to `(spd, addr)`, the root of a new alias tree.
    pub fn get_page<F: KernelFacade>(
        &mut self,
        facade: &F,
        spd: ComponentId,
        addr: usize,
    ) -> MmResult<usize> {
        let idx = self
            .cells
            .iter()
            .position(PageCell::is_unused)
            .ok_or(MmError::Exhausted)?;
        self.cells[idx].map[0] = MappingInfo {
            owner: spd,
            addr,
            parent: None,
        };
        self.cells[idx].naliases = 1;

        match facade.mmap_grant(spd, addr, FrameIndex(idx)) {
            Ok(()) => {
                self.cache.add(spd, addr, idx, 0);
                log::debug!("mm: granted frame {idx} to ({spd:?}, {addr:#x})");
                Ok(addr)
            }
            Err(_) => {
                self.cells[idx] = PageCell::EMPTY;
                log::warn!("mm: kernel refused grant of frame {idx} to ({spd:?}, {addr:#x})");
                Err(MmError::KernelRefused { frame: idx })
            }
        }
    }

    /// Alias an existing mapping into another component.
    pub fn alias_page<F: KernelFacade>(
        &mut self,
        facade: &F,
        src_spd: ComponentId,
        src_addr: usize,
        dst_spd: ComponentId,
        dst_addr: usize,
    ) -> MmResult<usize> {
        let (cell_idx, src_alias) = self.find_cell(src_spd, src_addr).ok_or(MmError::NotFound)?;
        let free_slot = (0..MAX_ALIASES)
            .find(|&i| self.cells[cell_idx].map[i].owner.is_none())
            .ok_or(MmError::Exhausted)?;

        match facade.mmap_grant(dst_spd, dst_addr, FrameIndex(cell_idx)) {
            Ok(()) => {
                self.cells[cell_idx].map[free_slot] = MappingInfo {
                    owner: dst_spd,
                    addr: dst_addr,
                    parent: Some(src_alias as u8),
                };
                self.cells[cell_idx].naliases += 1;
                self.cache.add(dst_spd, dst_addr, cell_idx, free_slot);
                log::debug!(
                    "mm: aliased frame {cell_idx} from ({src_spd:?}, {src_addr:#x}) to ({dst_spd:?}, {dst_addr:#x})"
                );
                Ok(dst_addr)
            }
            Err(_) => {
                log::warn!(
                    "mm: kernel refused alias grant of frame {cell_idx} to ({dst_spd:?}, {dst_addr:#x})"
                );
                Err(MmError::KernelRefused { frame: cell_idx })
            }
        }
    }

    /// Tear down `(spd, addr)` and every alias descended from it, leaving
    /// the mapping itself (and any non-descendant sibling alias) live. Two
    /// sweeps, as in the source this was distilled from: the first asks the
    /// kernel to revoke each descendant and tombstones its `addr`, the
    /// second clears tombstoned entries back to empty. Splitting the sweep
    /// keeps `is_descendant` from observing a half-cleared tree mid-walk.
    pub fn revoke_page<F: KernelFacade>(
        &mut self,
        facade: &F,
        spd: ComponentId,
        addr: usize,
    ) -> MmResult<()> {
        let (cell_idx, alias) = self.find_cell(spd, addr).ok_or(MmError::NotFound)?;
        let mut torn_down = 0usize;

        for i in 0..MAX_ALIASES {
            if i == alias {
                continue;
            }
            let entry = self.cells[cell_idx].map[i];
            if entry.owner.is_none() {
                continue;
            }
            if !is_descendant(&self.cells[cell_idx].map, alias, i)? {
                continue;
            }
            match facade.mmap_revoke(entry.owner, entry.addr) {
                Ok(frame) => debug_assert_eq!(frame.0, cell_idx),
                Err(_) => return Err(MmError::KernelRefused { frame: cell_idx }),
            }
            self.cache.remove(entry.owner, entry.addr);
            self.cells[cell_idx].map[i].addr = 0;
            self.cells[cell_idx].naliases -= 1;
            torn_down += 1;
        }

        for entry in &mut self.cells[cell_idx].map {
            if entry.addr == 0 && !entry.owner.is_none() {
                entry.owner = ComponentId::NONE;
                entry.parent = None;
            }
        }

        log::debug!("mm: revoked {torn_down} descendant(s) of ({spd:?}, {addr:#x})");
        Ok(())
    }

    /// Revoke `(spd, addr)` itself (and its descendants) and free the
    /// mapping. Idempotent: a second call on an already-released mapping is
    /// a silent no-op.
    pub fn release_page<F: KernelFacade>(
        &mut self,
        facade: &F,
        spd: ComponentId,
        addr: usize,
    ) -> MmResult<()> {
        match self.revoke_page(facade, spd, addr) {
            Ok(()) => {}
            Err(MmError::NotFound) => return Ok(()),
            Err(e) => return Err(e),
        }

        let Some((cell_idx, alias)) = self.find_cell(spd, addr) else {
            return Ok(());
        };
        let entry = self.cells[cell_idx].map[alias];
        match facade.mmap_revoke(entry.owner, entry.addr) {
            Ok(_) => {
                self.cache.remove(entry.owner, entry.addr);
                self.cells[cell_idx].map[alias] = EMPTY_MAPPING;
                self.cells[cell_idx].naliases -= 1;
                Ok(())
            }
            Err(_) => Err(MmError::KernelRefused { frame: cell_idx }),
        }
    }

    /// Resolve `(spd, addr)` to its `(cell, alias slot)`. Consults the
    /// address cache first; a stale hit (the entry no longer matches the
    /// cell it points at) is rechecked against the cell itself and falls
    /// back to a linear scan rather than trusted blindly.
    pub fn find_cell(&mut self, spd: ComponentId, addr: usize) -> Option<(usize, usize)> {
        if let Some((cell, alias)) = self.cache.lookup(spd, addr) {
            if let Some(entry) = self.cells.get(cell).and_then(|c| c.map.get(alias)) {
                if entry.owner == spd && entry.addr == addr {
                    return Some((cell, alias));
                }
            }
        }
        self.scan(spd, addr)
    }

    fn scan(&mut self, spd: ComponentId, addr: usize) -> Option<(usize, usize)> {
        let n = self.cells.len();
        let start = self.last_found.saturating_sub(SCAN_BACKTRACK);
        for offset in 0..n {
            let i = (start + offset) % n;
            for (j, m) in self.cells[i].map.iter().enumerate() {
                if m.owner == spd && m.addr == addr {
                    self.last_found = i;
                    self.cache.add(spd, addr, i, j);
                    return Some((i, j));
                }
            }
        }
        None
    }

    /// Live alias counts per owning component, for diagnostics (supplements
    /// the source's `mman_print_stats`).
    pub fn usage_by_component(&self) -> UsageIter {
        let mut counts = [0usize; crate::consts::MAX_SPDS];
        for cell in &self.cells {
            for m in &cell.map {
                if !m.owner.is_none() {
                    let idx = m.owner.0 as usize;
                    if idx < counts.len() {
                        counts[idx] += 1;
                    }
                }
            }
        }
        UsageIter { counts, idx: 0 }
    }
}

pub struct UsageIter {
    counts: [usize; crate::consts::MAX_SPDS],
    idx: usize,
}

impl Iterator for UsageIter {
    type Item = (ComponentId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.idx < self.counts.len() {
            let i = self.idx;
            self.idx += 1;
            if self.counts[i] > 0 {
                return Some((ComponentId(i as u16), self.counts[i]));
            }
        }
        None
    }
}
