//! The fixed thread-descriptor pool and kernel-id lookup table (spec section
//! 4.3), plus group membership (`ThreadGroups` in spec section 4.3).

use crate::consts::MAX_THREADS;
use crate::error::{SchedError, SchedResult};
use crate::facade::{KernelFacade, ThreadId};
use crate::sched::thread::{DescriptorId, ThreadDescriptor, ThreadFlags};

/// Bound on addressable kernel thread ids. Wider than `MAX_THREADS` (the
/// concurrent descriptor pool) because a component's live thread count is
/// bounded well below the range of ids the kernel may have assigned it
/// over time; sizing them identically would make pool exhaustion
/// indistinguishable from "id already mapped".
const THD_ID_SPACE: usize = MAX_THREADS * 4;

/// Owns every thread descriptor and the kernel-id -> descriptor mapping.
pub struct ThreadRegistry {
    pool: [ThreadDescriptor; MAX_THREADS],
    thd_map: [Option<DescriptorId>; THD_ID_SPACE],
}

impl ThreadRegistry {
    pub const fn new() -> Self {
        Self {
            pool: [ThreadDescriptor::FREE; MAX_THREADS],
            thd_map: [None; THD_ID_SPACE],
        }
    }

    pub fn get(&self, d: DescriptorId) -> &ThreadDescriptor {
        &self.pool[d.idx()]
    }

    pub fn get_mut(&mut self, d: DescriptorId) -> &mut ThreadDescriptor {
        &mut self.pool[d.idx()]
    }

    /// Resolve a kernel-assigned id to its descriptor, failing `InvalidState`
    /// if the id is out of range or unmapped.
    pub fn get_mapping(&self, id: ThreadId) -> SchedResult<DescriptorId> {
        let idx = id.0 as usize;
        if idx >= THD_ID_SPACE {
            return Err(SchedError::InvalidState);
        }
        self.thd_map[idx].ok_or(SchedError::InvalidState)
    }

    /// Resolve the descriptor for the thread currently executing, per the
    /// kernel's own notion of "current" (spec section 4.3).
    pub fn get_current<F: KernelFacade>(&self, facade: &F) -> SchedResult<DescriptorId> {
        self.get_mapping(facade.current_thread_id())
    }

    fn alloc(&mut self, id: ThreadId, extra: ThreadFlags) -> SchedResult<DescriptorId> {
        let idx = id.0 as usize;
        if idx >= THD_ID_SPACE || self.thd_map[idx].is_some() {
            return Err(SchedError::InvalidState);
        }
        let slot = self
            .pool
            .iter()
            .position(ThreadDescriptor::is_free)
            .ok_or(SchedError::Exhausted)?;
        self.pool[slot] = ThreadDescriptor {
            id,
            flags: ThreadFlags::READY | extra,
            ..ThreadDescriptor::FREE
        };
        let desc = DescriptorId(slot as u16);
        self.thd_map[idx] = Some(desc);
        log::trace!("sched: allocated descriptor {slot} for thread {id:?}");
        Ok(desc)
    }

    /// Allocate a descriptor for a plain thread.
    pub fn alloc_thd(&mut self, id: ThreadId) -> SchedResult<DescriptorId> {
        self.alloc(id, ThreadFlags::empty())
    }

    /// Allocate a descriptor for an upcall thread, additionally marked
    /// `UC_READY`.
    pub fn alloc_upcall_thd(&mut self, id: ThreadId) -> SchedResult<DescriptorId> {
        self.alloc(id, ThreadFlags::UC_READY)
    }

    /// Return a descriptor to the free pool, severing its kernel-id mapping.
    pub fn free_thd(&mut self, d: DescriptorId) -> SchedResult<()> {
        let desc = self.pool.get(d.idx()).ok_or(SchedError::InvalidState)?;
        if desc.is_free() {
            return Err(SchedError::InvalidState);
        }
        let id = desc.id;
        self.thd_map[id.0 as usize] = None;
        self.pool[d.idx()] = ThreadDescriptor::FREE;
        log::trace!("sched: freed descriptor {} (was thread {id:?})", d.idx());
        Ok(())
    }

    /// Turn `grp` into an empty group. `sched_thd` is the kernel thread id
    /// the original associates with a group's representative scheduling
    /// thread; this crate doesn't interpret it and stashes it in the
    /// descriptor's opaque policy-state word for a policy layer to recover.
    pub fn make_grp(&mut self, grp: DescriptorId, sched_thd: ThreadId) -> SchedResult<()> {
        let desc = &mut self.pool[grp.idx()];
        if desc.is_free() || desc.flags.intersects(ThreadFlags::GROUP | ThreadFlags::MEMBER) {
            return Err(SchedError::InvalidState);
        }
        desc.flags.insert(ThreadFlags::GROUP);
        desc.nthds = 0;
        desc.group_next = None;
        desc.group_prev = None;
        desc.accounting.policy_state = u64::from(sched_thd.0);
        Ok(())
    }

    /// Add `thd` to `grp`'s circular member list.
    pub fn add_grp(&mut self, grp: DescriptorId, thd: DescriptorId) -> SchedResult<()> {
        if !self.pool[grp.idx()].flags.contains(ThreadFlags::GROUP) {
            return Err(SchedError::InvalidState);
        }
        if self.pool[thd.idx()].is_free()
            || self.pool[thd.idx()]
                .flags
                .intersects(ThreadFlags::GROUP | ThreadFlags::MEMBER)
        {
            return Err(SchedError::InvalidState);
        }

        match self.pool[grp.idx()].group_next {
            None => {
                self.pool[thd.idx()].group_next = Some(thd);
                self.pool[thd.idx()].group_prev = Some(thd);
                self.pool[grp.idx()].group_next = Some(thd);
            }
            Some(first) => {
                let last = self.pool[first.idx()]
                    .group_prev
                    .expect("non-empty group member list is always circular");
                self.pool[thd.idx()].group_next = Some(first);
                self.pool[thd.idx()].group_prev = Some(last);
                self.pool[last.idx()].group_next = Some(thd);
                self.pool[first.idx()].group_prev = Some(thd);
            }
        }
        self.pool[thd.idx()].flags.insert(ThreadFlags::MEMBER);
        self.pool[thd.idx()].group = Some(grp);
        self.pool[grp.idx()].nthds += 1;
        Ok(())
    }

    /// Remove `thd` from `grp`'s member list.
    pub fn rem_grp(&mut self, grp: DescriptorId, thd: DescriptorId) -> SchedResult<()> {
        if self.pool[thd.idx()].group != Some(grp) {
            return Err(SchedError::InvalidState);
        }
        let next = self.pool[thd.idx()].group_next;
        let prev = self.pool[thd.idx()].group_prev;
        match (next, prev) {
            (Some(n), Some(p)) if n == thd && p == thd => {
                // sole member
                self.pool[grp.idx()].group_next = None;
            }
            (Some(n), Some(p)) => {
                self.pool[p.idx()].group_next = Some(n);
                self.pool[n.idx()].group_prev = Some(p);
                if self.pool[grp.idx()].group_next == Some(thd) {
                    self.pool[grp.idx()].group_next = Some(n);
                }
            }
            _ => return Err(SchedError::InvalidState),
        }
        self.pool[thd.idx()].flags.remove(ThreadFlags::MEMBER);
        self.pool[thd.idx()].group = None;
        self.pool[thd.idx()].group_next = None;
        self.pool[thd.idx()].group_prev = None;
        self.pool[grp.idx()].nthds -= 1;
        Ok(())
    }

    /// Iterate `grp`'s members in list order. Empty if `grp` isn't a group
    /// or has no members yet.
    pub fn members(&self, grp: DescriptorId) -> MembersIter<'_> {
        let first = self.pool[grp.idx()]
            .flags
            .contains(ThreadFlags::GROUP)
            .then(|| self.pool[grp.idx()].group_next)
            .flatten();
        MembersIter {
            pool: &self.pool,
            first,
            next: first,
        }
    }
}

/// Iterator over a group's members, produced by [`ThreadRegistry::members`].
pub struct MembersIter<'a> {
    pool: &'a [ThreadDescriptor; MAX_THREADS],
    first: Option<DescriptorId>,
    next: Option<DescriptorId>,
}

impl<'a> Iterator for MembersIter<'a> {
    type Item = DescriptorId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let after = self.pool[current.idx()].group_next;
        self.next = if after == self.first { None } else { after };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::mock::MockFacade;

    #[test]
    fn alloc_free_roundtrip() {
        let mut reg = ThreadRegistry::new();
        let d = reg.alloc_thd(ThreadId(5)).unwrap();
        assert_eq!(reg.get(d).id, ThreadId(5));
        assert!(reg.get(d).flags.contains(ThreadFlags::READY));
        reg.free_thd(d).unwrap();
        assert!(reg.get(d).is_free());
        assert!(reg.get_mapping(ThreadId(5)).is_err());
    }

    #[test]
    fn double_alloc_same_id_fails() {
        let mut reg = ThreadRegistry::new();
        reg.alloc_thd(ThreadId(5)).unwrap();
        assert_eq!(reg.alloc_thd(ThreadId(5)), Err(SchedError::InvalidState));
    }

    #[test]
    fn exhaustion() {
        let mut reg = ThreadRegistry::new();
        for i in 0..MAX_THREADS as u16 {
            reg.alloc_thd(ThreadId(i + 1)).unwrap();
        }
        // id MAX_THREADS+2 is still within the addressable id space and
        // unmapped, so this fails on a full pool rather than a bad id.
        assert_eq!(
            reg.alloc_thd(ThreadId(MAX_THREADS as u16 + 2)),
            Err(SchedError::Exhausted)
        );
    }

    #[test]
    fn out_of_range_id_is_invalid_state() {
        let mut reg = ThreadRegistry::new();
        assert_eq!(
            reg.alloc_thd(ThreadId((MAX_THREADS * 4) as u16)),
            Err(SchedError::InvalidState)
        );
    }

    #[test]
    fn get_current_resolves_through_facade() {
        let facade = MockFacade::new();
        let mut reg = ThreadRegistry::new();
        facade.set_current_thread(ThreadId(9));
        let d = reg.alloc_thd(ThreadId(9)).unwrap();
        assert_eq!(reg.get_current(&facade).unwrap(), d);
    }

    #[test]
    fn group_membership_add_remove() {
        let mut reg = ThreadRegistry::new();
        let grp = reg.alloc_thd(ThreadId(1)).unwrap();
        let a = reg.alloc_thd(ThreadId(2)).unwrap();
        let b = reg.alloc_thd(ThreadId(3)).unwrap();
        reg.make_grp(grp, ThreadId(100)).unwrap();
        reg.add_grp(grp, a).unwrap();
        reg.add_grp(grp, b).unwrap();
        assert_eq!(reg.get(grp).nthds, 2);
        assert!(reg.get(a).flags.contains(ThreadFlags::MEMBER));
        reg.rem_grp(grp, a).unwrap();
        assert_eq!(reg.get(grp).nthds, 1);
        assert!(!reg.get(a).flags.contains(ThreadFlags::MEMBER));
        reg.rem_grp(grp, b).unwrap();
        assert_eq!(reg.get(grp).nthds, 0);
    }

    #[test]
    fn members_iterates_in_list_order() {
        let mut reg = ThreadRegistry::new();
        let grp = reg.alloc_thd(ThreadId(1)).unwrap();
        let a = reg.alloc_thd(ThreadId(2)).unwrap();
        let b = reg.alloc_thd(ThreadId(3)).unwrap();
        reg.make_grp(grp, ThreadId(100)).unwrap();
        assert_eq!(reg.members(grp).count(), 0);

        reg.add_grp(grp, a).unwrap();
        reg.add_grp(grp, b).unwrap();
        assert_eq!(reg.members(grp).collect::<Vec<_>>(), vec![a, b]);

        reg.rem_grp(grp, a).unwrap();
        assert_eq!(reg.members(grp).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn group_and_member_flags_exclusive() {
        let mut reg = ThreadRegistry::new();
        let grp = reg.alloc_thd(ThreadId(1)).unwrap();
        reg.make_grp(grp, ThreadId(100)).unwrap();
        assert_eq!(reg.make_grp(grp, ThreadId(101)), Err(SchedError::InvalidState));
        assert_eq!(reg.add_grp(grp, grp), Err(SchedError::InvalidState));
    }
}
