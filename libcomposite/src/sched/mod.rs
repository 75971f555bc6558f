//! Scheduler-support core (spec section 4): the data a scheduler component
//! needs to track thread state, resolve priority-inheriting dependency
//! chains, and hand off control to a chosen next thread. Never decides
//! which thread runs next — that policy lives entirely above this module.

pub mod critical;
pub mod events;
pub mod lock;
pub mod registry;
pub mod switch;
pub mod thread;

pub use critical::CriticalSectionTable;
pub use events::EventChannel;
pub use lock::SchedLock;
pub use registry::{MembersIter, ThreadRegistry};
pub use switch::ThreadSwitch;
pub use thread::{Accounting, DescriptorId, Metric, ThreadDescriptor, ThreadFlags};

use crate::facade::{KernelFacade, NextThreadHint, SyncAtom};

/// Convenience bundle owning one instance of every scheduler-support
/// component, for a scheduler that doesn't need to place them separately.
/// Nothing here is required: each piece above works standalone against
/// whatever storage a caller prefers.
pub struct Scheduler<F: KernelFacade> {
    pub registry: ThreadRegistry,
    pub events: EventChannel,
    pub crit: CriticalSectionTable,
    pub lock_word: SyncAtom,
    pub hint: NextThreadHint,
    pub facade: F,
}

impl<F: KernelFacade> Scheduler<F> {
    pub const fn new(facade: F) -> Self {
        Self {
            registry: ThreadRegistry::new(),
            events: EventChannel::new(),
            crit: CriticalSectionTable::new(),
            lock_word: SyncAtom::new(),
            hint: NextThreadHint::new(),
            facade,
        }
    }

    pub fn lock(&self) -> SchedLock<'_, F> {
        SchedLock::new(&self.lock_word, &self.facade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::mock::MockFacade;
    use crate::facade::ThreadId;

    #[test]
    fn scheduler_bundle_take_switch_release() {
        let sched = Scheduler::new(MockFacade::new());
        sched.facade.set_current_thread(ThreadId(1));
        sched.lock().take().unwrap();
        ThreadSwitch::switch_release(&sched.facade, &sched.hint, &sched.lock(), ThreadId(2), 0, 0)
            .unwrap();
    }
}
