//! Per-component critical sections and the priority-inheritance dependency
//! chain built on top of them (spec section 4.5).

use crate::consts::MAX_SPDS;
use crate::error::{SchedError, SchedResult};
use crate::facade::ComponentId;
use crate::sched::registry::ThreadRegistry;
use crate::sched::thread::{DescriptorId, ThreadFlags};

/// One holder slot per component. Unlike [`crate::sched::lock::SchedLock`],
/// contention here is recorded rather than resolved: a blocked thread is
/// marked `DEPENDENCY` and the caller walks [`CriticalSectionTable::dependency`]
/// to find who it's really waiting on, so a scheduler can donate priority
/// along the chain.
pub struct CriticalSectionTable {
    holders: [Option<DescriptorId>; MAX_SPDS],
}

impl CriticalSectionTable {
    pub const fn new() -> Self {
        Self {
            holders: [None; MAX_SPDS],
        }
    }

    /// Attempt to take the critical section for `component` on behalf of
    /// `curr`. Returns `Ok(None)` on an uncontended take, `Ok(Some(holder))`
    /// if `curr` is now marked dependent on `holder`.
    pub fn take(
        &mut self,
        component: ComponentId,
        curr: DescriptorId,
        registry: &mut ThreadRegistry,
    ) -> SchedResult<Option<DescriptorId>> {
        let idx = component.0 as usize;
        if idx >= MAX_SPDS {
            return Err(SchedError::InvalidState);
        }
        match self.holders[idx] {
            None => {
                self.holders[idx] = Some(curr);
                Ok(None)
            }
            Some(holder) => {
                let desc = registry.get_mut(curr);
                desc.contended_component = component;
                desc.flags.insert(ThreadFlags::DEPENDENCY);
                Ok(Some(holder))
            }
        }
    }

    /// Release the critical section for `component`. Fails `NotHolder` if
    /// `curr` doesn't hold it.
    pub fn release(&mut self, component: ComponentId, curr: DescriptorId) -> SchedResult<()> {
        let idx = component.0 as usize;
        if idx >= MAX_SPDS {
            return Err(SchedError::InvalidState);
        }
        if self.holders[idx] != Some(curr) {
            return Err(SchedError::NotHolder);
        }
        self.holders[idx] = None;
        Ok(())
    }

    /// Resolve what `curr` is (still) waiting on, following either a
    /// contended critical section or an explicit handoff. Returns `None`
    /// once the dependency has resolved, clearing the `DEPENDENCY` flag as a
    /// side effect.
    pub fn dependency(
        &self,
        registry: &mut ThreadRegistry,
        curr: DescriptorId,
    ) -> Option<DescriptorId> {
        let desc = *registry.get(curr);
        if !desc.flags.contains(ThreadFlags::DEPENDENCY) {
            return None;
        }

        if !desc.contended_component.is_none() {
            let idx = desc.contended_component.0 as usize;
            match self.holders.get(idx).copied().flatten() {
                Some(holder) => Some(holder),
                None => {
                    let desc = registry.get_mut(curr);
                    desc.flags.remove(ThreadFlags::DEPENDENCY);
                    desc.contended_component = ComponentId::NONE;
                    None
                }
            }
        } else if desc.flags.contains(ThreadFlags::BLOCKED) {
            desc.dependency_thd
        } else {
            let desc = registry.get_mut(curr);
            desc.flags.remove(ThreadFlags::DEPENDENCY);
            desc.dependency_thd = None;
            None
        }
    }
}
