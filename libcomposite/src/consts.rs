//! Compile-time tunables for the static pools this crate keeps.
//!
//! Every table described in spec section 3 is a fixed-size array sized by
//! one of these constants, allocated once and never grown — avoiding
//! dynamic allocation on any hot path, per the source's static-pool design.
//! A deployment that needs different sizes vendors its own `consts.rs`;
//! there's no Cargo-feature knob for these because the spec gives no format
//! for one and the pools are `repr`-stable only when the sizes are known at
//! compile time.

/// Maximum number of thread descriptors a scheduler component can track.
pub const MAX_THREADS: usize = 64;

/// Maximum number of components (software protection domains) that can hold
/// a critical section.
pub const MAX_SPDS: usize = 32;

/// Maximum number of physical frames the page manager can track.
pub const MAX_MEMORY: usize = 1024;

/// Maximum number of live aliases (including the root grant) per frame.
/// Fixed at 32 per spec section 6.
pub const MAX_ALIASES: usize = 32;

/// Number of slots in the (component, addr) -> (cell, alias) address cache.
pub const CACHE_SIZE: usize = 256;

/// Number of kernel event slots, slot 0 reserved as a sentinel.
pub const NUM_SCHED_EVTS: usize = 64;
