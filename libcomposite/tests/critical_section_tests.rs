//! End-to-end critical-section and dependency-chain scenarios.

use libcomposite::facade::ComponentId;
use libcomposite::facade::ThreadId;
use libcomposite::sched::{CriticalSectionTable, ThreadFlags, ThreadRegistry};

#[test]
fn dependency_chain_resolves_transitively() {
    let mut registry = ThreadRegistry::new();
    let a = registry.alloc_thd(ThreadId(1)).unwrap();
    let b = registry.alloc_thd(ThreadId(2)).unwrap();
    let c = registry.alloc_thd(ThreadId(3)).unwrap();
    let mut crit = CriticalSectionTable::new();

    let comp1 = ComponentId(1);
    let comp2 = ComponentId(2);

    // a holds comp1, b wants comp1 (blocks on a), c wants comp2 which b
    // holds (blocks on b): a chain a <- b <- c.
    crit.take(comp1, a, &mut registry).unwrap();
    crit.take(comp2, b, &mut registry).unwrap();

    assert_eq!(crit.take(comp1, b, &mut registry), Ok(Some(a)));
    assert_eq!(crit.take(comp2, c, &mut registry), Ok(Some(b)));

    assert_eq!(crit.dependency(&mut registry, b), Some(a));
    assert_eq!(crit.dependency(&mut registry, c), Some(b));
}

#[test]
fn take_release_clears_dependency_flag() {
    let mut registry = ThreadRegistry::new();
    let a = registry.alloc_thd(ThreadId(1)).unwrap();
    let b = registry.alloc_thd(ThreadId(2)).unwrap();
    let mut crit = CriticalSectionTable::new();
    let comp = ComponentId(5);

    crit.take(comp, a, &mut registry).unwrap();
    crit.take(comp, b, &mut registry).unwrap();
    assert!(registry.get(b).flags.contains(ThreadFlags::DEPENDENCY));

    crit.release(comp, a).unwrap();
    assert_eq!(crit.dependency(&mut registry, b), None);
    assert!(!registry.get(b).flags.contains(ThreadFlags::DEPENDENCY));

    // b can now take it.
    assert_eq!(crit.take(comp, b, &mut registry), Ok(None));
}

#[test]
fn out_of_range_component_is_rejected() {
    let mut registry = ThreadRegistry::new();
    let a = registry.alloc_thd(ThreadId(1)).unwrap();
    let mut crit = CriticalSectionTable::new();
    let bad = ComponentId(libcomposite::consts::MAX_SPDS as u16);
    assert!(crit.take(bad, a, &mut registry).is_err());
}
