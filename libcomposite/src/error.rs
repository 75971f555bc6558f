//! Error types for the scheduler-support and page-manager cores.
//!
//! One aggregate [`CosError`] covers every fallible operation in the crate
//! (spec section 7), built from two narrower per-subsystem enums so a
//! caller that only links one half of the crate can match on the specific
//! kind without wading through the other subsystem's variants.

use core::fmt;

/// Errors raised by the scheduler-support core ([`crate::sched`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// No free thread descriptor, event slot, or group slot remained.
    Exhausted,
    /// A critical-section release was attempted by a thread that does not
    /// hold it.
    NotHolder,
    /// A predicate the caller was required to uphold did not hold (e.g.
    /// `rem_grp` on a thread that isn't a member of the given group).
    InvalidState,
    /// The kernel refused a scheduler-initiated `switch_thread` while the
    /// caller was acquiring the scheduler lock.
    Aborted { target: u16 },
}

/// Errors raised by the page-manager core ([`crate::mm`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// No unused cell or free alias slot remained.
    Exhausted,
    /// A (component, addr) pair has no known mapping.
    NotFound,
    /// The kernel refused a grant or revoke syscall.
    KernelRefused { frame: usize },
    /// An alias-tree walk exceeded `MAX_ALIASES` steps, indicating a
    /// malformed (cyclic) parent chain.
    InvalidState,
}

/// Aggregate error type returned by every fallible public operation in this
/// crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "composite errors must be handled, not silently discarded"]
pub enum CosError {
    Sched(SchedError),
    Mm(MmError),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no free descriptor/slot available"),
            Self::NotHolder => write!(f, "release attempted by a non-holder"),
            Self::InvalidState => write!(f, "thread/group predicate violated"),
            Self::Aborted { target } => {
                write!(f, "kernel refused scheduler-initiated switch to thread {target}")
            }
        }
    }
}

impl fmt::Display for MmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no unused cell or alias slot available"),
            Self::NotFound => write!(f, "no mapping for the given (component, addr)"),
            Self::KernelRefused { frame } => {
                write!(f, "kernel refused grant/revoke of frame {frame}")
            }
            Self::InvalidState => write!(f, "alias-tree walk exceeded MAX_ALIASES steps"),
        }
    }
}

impl fmt::Display for CosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sched(e) => write!(f, "scheduler error: {e}"),
            Self::Mm(e) => write!(f, "memory manager error: {e}"),
        }
    }
}

impl From<SchedError> for CosError {
    fn from(e: SchedError) -> Self {
        Self::Sched(e)
    }
}

impl From<MmError> for CosError {
    fn from(e: MmError) -> Self {
        Self::Mm(e)
    }
}

/// Result alias for scheduler-support operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Result alias for page-manager operations.
pub type MmResult<T> = Result<T, MmError>;
