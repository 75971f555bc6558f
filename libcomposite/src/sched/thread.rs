//! Thread descriptor data model (spec section 3).

use crate::facade::{ComponentId, ThreadId};

bitflags::bitflags! {
    /// Thread state bits. `GROUP` and `MEMBER` are mutually exclusive;
    /// `FREE` excludes every other bit (a free slot carries no other state).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadFlags: u16 {
        const BLOCKED    = 0b0000_0000_0001;
        const READY      = 0b0000_0000_0010;
        const FREE       = 0b0000_0000_0100;
        const GROUP      = 0b0000_0000_1000;
        const MEMBER     = 0b0000_0001_0000;
        const UC_ACTIVE  = 0b0000_0010_0000;
        const UC_READY   = 0b0000_0100_0000;
        const SUSPENDED  = 0b0000_1000_0000;
        const DEPENDENCY = 0b0001_0000_0000;
    }
}

/// An index into the fixed thread-descriptor pool, distinct from the
/// kernel-assigned [`ThreadId`] that names a thread to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorId(pub u16);

impl DescriptorId {
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Scheduling-policy bookkeeping (spec section 3). The budget/period/used/
/// left/cycles/progress fields are plain counters this crate maintains
/// faithfully; `policy_state` is an opaque word a policy layer built on top
/// may use however it likes — this crate never interprets it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accounting {
    pub budget: u64,
    pub period: u64,
    pub consumed: u64,
    pub remaining: u64,
    pub cycles: u64,
    pub progress: u64,
    pub policy_state: u64,
}

/// Priority/urgency pair a policy layer reads to order runnable threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metric {
    pub priority: u16,
    pub urgency: u16,
}

/// One thread's full descriptor.
#[derive(Debug, Clone, Copy)]
pub struct ThreadDescriptor {
    pub id: ThreadId,
    pub flags: ThreadFlags,
    pub accounting: Accounting,
    pub metric: Metric,
    /// Event slot id this thread is bound to, 0 meaning none.
    pub event_slot: u16,
    pub wake_cnt: i32,
    pub blocking_component: ComponentId,
    /// The component whose critical section this thread is blocked waiting
    /// on, or [`ComponentId::NONE`] when the dependency is an explicit
    /// handoff (`dependency_thd`) instead.
    pub contended_component: ComponentId,
    /// Explicit handoff target set by a caller that already knows who it is
    /// waiting on, used when `contended_component` is none.
    pub dependency_thd: Option<DescriptorId>,
    pub block_time: u64,
    /// The group this thread is a member of, when `MEMBER` is set.
    pub group: Option<DescriptorId>,
    /// Member count, meaningful only when `GROUP` is set.
    pub nthds: u32,
    /// Priority-queue sibling links, for a policy layer built on top of this
    /// crate to thread its own run queue through; this crate never reads
    /// them itself.
    pub prio_next: Option<DescriptorId>,
    pub prio_prev: Option<DescriptorId>,
    pub(crate) group_next: Option<DescriptorId>,
    pub(crate) group_prev: Option<DescriptorId>,
}

impl ThreadDescriptor {
    pub const FREE: ThreadDescriptor = ThreadDescriptor {
        id: ThreadId(0),
        flags: ThreadFlags::FREE,
        accounting: Accounting {
            budget: 0,
            period: 0,
            consumed: 0,
            remaining: 0,
            cycles: 0,
            progress: 0,
            policy_state: 0,
        },
        metric: Metric {
            priority: 0,
            urgency: 0,
        },
        event_slot: 0,
        wake_cnt: 0,
        blocking_component: ComponentId::NONE,
        contended_component: ComponentId::NONE,
        dependency_thd: None,
        block_time: 0,
        group: None,
        nthds: 0,
        prio_next: None,
        prio_prev: None,
        group_next: None,
        group_prev: None,
    };

    pub fn is_free(&self) -> bool {
        self.flags.contains(ThreadFlags::FREE)
    }
}
