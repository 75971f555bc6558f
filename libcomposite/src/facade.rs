//! The narrow syscall surface this crate treats as an external collaborator.
//!
//! Neither the scheduler-support core nor the page-manager core talks to the
//! kernel directly: every syscall-shaped operation goes through
//! [`KernelFacade`], so the two cores stay testable without a kernel and
//! portable across whatever the real syscall ABI turns out to be.

use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

/// A software protection domain (component) identifier. `0` is reserved to
/// mean "no component" (spec section 4.5/4.8: `contended_component = 0`,
/// cache entries keyed on `component != 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ComponentId(pub u16);

impl ComponentId {
    pub const NONE: Self = Self(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// A kernel-assigned thread identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ThreadId(pub u16);

/// A physical frame index, indexing [`crate::mm::PageCell`] in the fixed
/// cell table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameIndex(pub usize);

/// Scheduler-lock / thread-switch hint bits, passed to `switch_thread` (spec
/// section 6). `ThreadSwitch::switch_release` may pass other policy-defined
/// bits through the same parameter; these two are the ones `SchedLock`
/// itself uses.
pub const SYNC_BLOCK: u16 = 0x0001;
pub const SYNC_UNBLOCK: u16 = 0x0002;

/// The scheduler-global synchronization word: holder in the low 16 bits,
/// waiter in the high 16 bits (spec section 4.1).
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct SyncAtom(AtomicU32);

impl SyncAtom {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn raw(&self) -> &AtomicU32 {
        &self.0
    }

    pub fn holder(word: u32) -> Option<ThreadId> {
        let id = (word & 0x0000_ffff) as u16;
        (id != 0).then_some(ThreadId(id))
    }

    pub fn waiter(word: u32) -> Option<ThreadId> {
        let id = (word >> 16) as u16;
        (id != 0).then_some(ThreadId(id))
    }
}

/// The next-thread hint region the kernel reads during an impending switch
/// (spec section 6). Backed by atomics rather than plain fields: the whole
/// point of this region is that it gets written *before* the scheduler lock
/// releases and must be visible to the kernel by the time it observes that
/// release, so the final field write uses `Release` ordering.
#[derive(Debug, Default)]
pub struct NextThreadHint {
    next_thd_id: AtomicU16,
    flags: AtomicU16,
    urgency: AtomicU32,
}

impl NextThreadHint {
    pub const fn new() -> Self {
        Self {
            next_thd_id: AtomicU16::new(0),
            flags: AtomicU16::new(0),
            urgency: AtomicU32::new(0),
        }
    }

    /// Commit the hint. Must happen-before the accompanying
    /// `SchedLock::release`.
    pub fn write(&self, next_thd_id: u16, flags: u16, urgency: u32) {
        self.next_thd_id.store(next_thd_id, Ordering::Relaxed);
        self.flags.store(flags, Ordering::Relaxed);
        self.urgency.store(urgency, Ordering::Release);
    }

    pub fn read(&self) -> (u16, u16, u32) {
        let urgency = self.urgency.load(Ordering::Acquire);
        let flags = self.flags.load(Ordering::Relaxed);
        let next_thd_id = self.next_thd_id.load(Ordering::Relaxed);
        (next_thd_id, flags, urgency)
    }
}

/// One kernel-produced scheduling event from the shared event ring (spec
/// section 3/4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEvent {
    pub slot_id: u8,
    pub flags: u8,
    pub cpu_cycles: u32,
}

/// Refusal signal from a facade call: the kernel said no. Carries no detail
/// of its own — callers attach context (which frame, which thread) when
/// they turn this into a [`crate::error::CosError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refused;

/// Thin abstraction over the four syscalls this crate needs (spec section
/// 6): the two lock atomics, thread switch, and page grant/revoke.
///
/// Implementations talk to the real kernel; [`MockFacade`] is an in-memory
/// stand-in for tests.
pub trait KernelFacade {
    /// The kernel-assigned id of the thread currently executing. Not one of
    /// the spec's four named syscalls, but every caller of `SchedLock::take`
    /// and `ThreadRegistry::get_current` needs it, the same way the source's
    /// `cos_get_thd_id()` primitive is threaded through both.
    fn current_thread_id(&self) -> ThreadId;

    /// Try to install `curr_thd` as holder in `word`'s low 16 bits if it is
    /// currently zero. Returns the resulting word either way.
    fn atomic_cas_lock_take(&self, word: &SyncAtom, curr_thd: ThreadId) -> u32;

    /// Atomically clear the holder field of `word`. Returns the word's prior
    /// value (so the caller can read off the waiter field).
    fn atomic_cas_lock_release(&self, word: &SyncAtom) -> u32;

    /// Ask the kernel to switch to `target`, carrying `flags` (either
    /// [`SYNC_BLOCK`]/[`SYNC_UNBLOCK`] from `SchedLock`, or policy-defined
    /// bits from `ThreadSwitch::switch_release`).
    fn switch_thread(&self, target: ThreadId, flags: u16) -> Result<(), Refused>;

    /// Grant the physical frame `frame` at `dst_addr` inside `dst`.
    fn mmap_grant(
        &self,
        dst: ComponentId,
        dst_addr: usize,
        frame: FrameIndex,
    ) -> Result<(), Refused>;

    /// Revoke whatever mapping `owner` has at `addr`. Returns the frame index
    /// that was affected, so the caller can sanity-check it against the cell
    /// it expected to be tearing down.
    fn mmap_revoke(&self, owner: ComponentId, addr: usize) -> Result<FrameIndex, Refused>;
}

/// In-memory [`KernelFacade`] for tests: grants/revokes always succeed and
/// thread switches always succeed, unless the test configures a refusal.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use core::sync::atomic::{AtomicBool, AtomicUsize};

    /// A facade double whose grant, revoke, and switch calls can each be
    /// made to refuse exactly once (or forever), so tests can exercise the
    /// rollback paths in [`crate::mm::PageManager`] and
    /// [`crate::sched::lock::SchedLock`].
    #[derive(Default)]
    pub struct MockFacade {
        pub current_thread: AtomicU16,
        pub refuse_next_grant: AtomicBool,
        pub refuse_next_revoke: AtomicBool,
        pub refuse_next_switch: AtomicBool,
        pub grant_calls: AtomicUsize,
        pub revoke_calls: AtomicUsize,
        pub switch_calls: AtomicUsize,
        /// `(target, flags)` of the most recent `switch_thread` call, so
        /// tests can assert not just that a switch happened but who it
        /// targeted and with which hint bits (e.g. `SYNC_UNBLOCK`).
        pub last_switch_target: AtomicU16,
        pub last_switch_flags: AtomicU16,
    }

    impl MockFacade {
        pub const fn new() -> Self {
            Self {
                current_thread: AtomicU16::new(1),
                refuse_next_grant: AtomicBool::new(false),
                refuse_next_revoke: AtomicBool::new(false),
                refuse_next_switch: AtomicBool::new(false),
                grant_calls: AtomicUsize::new(0),
                revoke_calls: AtomicUsize::new(0),
                switch_calls: AtomicUsize::new(0),
                last_switch_target: AtomicU16::new(0),
                last_switch_flags: AtomicU16::new(0),
            }
        }

        /// Test hook: change which thread `current_thread_id` reports, to
        /// simulate a different caller taking the lock.
        pub fn set_current_thread(&self, id: ThreadId) {
            self.current_thread.store(id.0, Ordering::Relaxed);
        }

        fn take_refusal(flag: &AtomicBool) -> bool {
            flag.swap(false, Ordering::AcqRel)
        }
    }

    impl KernelFacade for MockFacade {
        fn current_thread_id(&self) -> ThreadId {
            ThreadId(self.current_thread.load(Ordering::Relaxed))
        }

        fn atomic_cas_lock_take(&self, word: &SyncAtom, curr_thd: ThreadId) -> u32 {
            loop {
                let current = word.raw().load(Ordering::Acquire);
                let desired = if SyncAtom::holder(current).is_some() {
                    // Contended: record this caller as the waiter in the
                    // high bits, the same word `atomic_cas_lock_release`
                    // later reads to know who to wake.
                    (current & 0x0000_ffff) | (u32::from(curr_thd.0) << 16)
                } else {
                    (current & 0xffff_0000) | u32::from(curr_thd.0)
                };
                if word
                    .raw()
                    .compare_exchange_weak(
                        current,
                        desired,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    return desired;
                }
            }
        }

        fn atomic_cas_lock_release(&self, word: &SyncAtom) -> u32 {
            word.raw().swap(0, Ordering::AcqRel)
        }

        fn switch_thread(&self, target: ThreadId, flags: u16) -> Result<(), Refused> {
            self.switch_calls.fetch_add(1, Ordering::Relaxed);
            self.last_switch_target.store(target.0, Ordering::Relaxed);
            self.last_switch_flags.store(flags, Ordering::Relaxed);
            if Self::take_refusal(&self.refuse_next_switch) {
                Err(Refused)
            } else {
                Ok(())
            }
        }

        fn mmap_grant(
            &self,
            _dst: ComponentId,
            _dst_addr: usize,
            _frame: FrameIndex,
        ) -> Result<(), Refused> {
            self.grant_calls.fetch_add(1, Ordering::Relaxed);
            if Self::take_refusal(&self.refuse_next_grant) {
                Err(Refused)
            } else {
                Ok(())
            }
        }

        fn mmap_revoke(&self, _owner: ComponentId, _addr: usize) -> Result<FrameIndex, Refused> {
            self.revoke_calls.fetch_add(1, Ordering::Relaxed);
            if Self::take_refusal(&self.refuse_next_revoke) {
                Err(Refused)
            } else {
                Ok(FrameIndex(0))
            }
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockFacade;
