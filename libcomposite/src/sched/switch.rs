//! Handing control to a chosen next thread (spec section 4.2): write the
//! next-thread hint, release the scheduler lock, then ask the kernel to
//! switch. The hint must be committed before the lock releases, since the
//! kernel may act on the release before this code runs again.

use crate::error::SchedError;
use crate::facade::{KernelFacade, NextThreadHint, ThreadId};
use crate::sched::lock::SchedLock;

/// Stateless helper bundling the hint-write/release/switch sequence. Carries
/// no data of its own; every call is given the lock and hint region it
/// operates on.
pub struct ThreadSwitch;

impl ThreadSwitch {
    /// Commit `next_thd`/`flags`/`urgency` to `hint`, release `lock`, then
    /// switch to `next_thd`.
    pub fn switch_release<F: KernelFacade>(
        facade: &F,
        hint: &NextThreadHint,
        lock: &SchedLock<'_, F>,
        next_thd: ThreadId,
        flags: u16,
        urgency: u32,
    ) -> Result<(), SchedError> {
        hint.write(next_thd.0, flags, urgency);
        lock.release();
        facade
            .switch_thread(next_thd, flags)
            .map_err(|_| SchedError::Aborted { target: next_thd.0 })
    }
}
