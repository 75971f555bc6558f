//! Physical-page-manager core (spec section 4.6-4.9): brokers page grants,
//! aliases, and revocation across protection domains. Holds no opinion on
//! page-table layout or virtual address space structure — those are the
//! kernel's and the caller's concern, reached only through
//! [`crate::facade::KernelFacade::mmap_grant`]/[`crate::facade::KernelFacade::mmap_revoke`].

pub mod cache;
pub mod cell;

pub use cache::AddressCache;
pub use cell::{MappingInfo, PageCell, PageManager, UsageIter, EMPTY_MAPPING};

/// The crate-wide page manager instance, for a deployment that wants a
/// single global broker rather than one scoped to a component. Mirrors the
/// const-constructible global-static pattern this crate's scheduler half
/// also follows for [`crate::sched::Scheduler`].
pub static PAGE_MANAGER: spin::Mutex<PageManager> = spin::Mutex::new(PageManager::new());
