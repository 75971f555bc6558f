//! The scheduler-global lock (spec section 4.1): a single atomic word with a
//! holder and a waiter, backed by the kernel's CAS-take/release helpers.

use crate::error::SchedError;
use crate::facade::{KernelFacade, SyncAtom, ThreadId, SYNC_BLOCK, SYNC_UNBLOCK};

/// Guards the scheduler's internal data structures. Not a [`spin::Mutex`]:
/// contention is resolved by blocking the waiter in the kernel's run queue
/// rather than spinning, so held sections can safely make blocking syscalls.
pub struct SchedLock<'a, F: KernelFacade> {
    word: &'a SyncAtom,
    facade: &'a F,
}

impl<'a, F: KernelFacade> SchedLock<'a, F> {
    pub fn new(word: &'a SyncAtom, facade: &'a F) -> Self {
        Self { word, facade }
    }

    /// Acquire the lock, blocking against the kernel on contention instead
    /// of spinning. Loops until this thread becomes the holder.
    pub fn take(&self) -> Result<(), SchedError> {
        let curr = self.facade.current_thread_id();
        loop {
            let word = self.facade.atomic_cas_lock_take(self.word, curr);
            let holder = SyncAtom::holder(word)
                .expect("lock word holder bits are never zero after a take attempt");
            if holder == curr {
                log::trace!("sched lock taken uncontended by {curr:?}");
                return Ok(());
            }
            log::debug!("sched lock contended: holder={holder:?} waiter={curr:?}");
            self.facade
                .switch_thread(holder, SYNC_BLOCK)
                .map_err(|_| SchedError::Aborted { target: holder.0 })?;
        }
    }

    /// Release the lock, waking the recorded waiter if there is one. A
    /// refused wake-up switch is logged and otherwise ignored: the waiter
    /// will notice the lock is free the next time it's scheduled and retake
    /// it, so this isn't a correctness problem, just a latency one.
    pub fn release(&self) {
        let prior = self.facade.atomic_cas_lock_release(self.word);
        if let Some(waiter) = SyncAtom::waiter(prior) {
            log::debug!("sched lock released, waking waiter {waiter:?}");
            if self.facade.switch_thread(waiter, SYNC_UNBLOCK).is_err() {
                log::warn!("kernel refused unblock switch to waiter {waiter:?} on lock release");
            }
        }
    }
}
