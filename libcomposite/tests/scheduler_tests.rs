//! End-to-end scheduler-support scenarios: lock contention, group
//! membership, and event delivery working together the way a scheduler
//! component built on top of this crate would drive them.

use libcomposite::facade::mock::MockFacade;
use libcomposite::facade::{KernelFacade, RawEvent, ThreadId, SYNC_UNBLOCK};
use libcomposite::sched::{Scheduler, ThreadFlags, ThreadSwitch};

#[test]
fn lock_contention_blocks_then_wakes_waiter() {
    let sched = Scheduler::new(MockFacade::new());
    sched.facade.set_current_thread(ThreadId(1));
    sched.lock().take().unwrap();

    // Thread 2 contends once, recording itself as the waiter (a looping
    // `take()` would spin forever against this unchanging mock holder, so
    // the single CAS attempt it would make on its first iteration is
    // exercised directly).
    sched.facade.atomic_cas_lock_take(&sched.lock_word, ThreadId(2));

    // T1's release must see waiter=T2 and invoke switch_thread(T2, SYNC_UNBLOCK).
    sched.lock().release();
    assert_eq!(sched.facade.last_switch_target.load(core::sync::atomic::Ordering::Relaxed), 2);
    assert_eq!(
        sched.facade.last_switch_flags.load(core::sync::atomic::Ordering::Relaxed),
        SYNC_UNBLOCK
    );
}

#[test]
fn group_membership_end_to_end() {
    let mut sched = Scheduler::new(MockFacade::new());
    let grp = sched.registry.alloc_thd(ThreadId(1)).unwrap();
    let a = sched.registry.alloc_thd(ThreadId(2)).unwrap();
    let b = sched.registry.alloc_thd(ThreadId(3)).unwrap();

    sched.registry.make_grp(grp, ThreadId(1)).unwrap();
    sched.registry.add_grp(grp, a).unwrap();
    sched.registry.add_grp(grp, b).unwrap();
    assert_eq!(sched.registry.get(grp).nthds, 2);

    let members: Vec<_> = sched.registry.members(grp).collect();
    assert_eq!(members, vec![a, b]);

    sched.registry.rem_grp(grp, a).unwrap();
    sched.registry.rem_grp(grp, b).unwrap();
    assert_eq!(sched.registry.get(grp).nthds, 0);
    assert!(!sched.registry.get(a).flags.contains(ThreadFlags::MEMBER));
}

#[test]
fn event_delivery_updates_accounting() {
    let mut sched = Scheduler::new(MockFacade::new());
    let thd = sched.registry.alloc_thd(ThreadId(1)).unwrap();
    let slot = sched.events.alloc_event(&mut sched.registry, thd).unwrap();

    let events = [RawEvent {
        slot_id: slot as u8,
        flags: 0x1,
        cpu_cycles: 500,
    }];
    sched
        .events
        .process_events(&mut sched.registry, events, 16, |desc, _flags, cycles| {
            desc.accounting.cycles += u64::from(cycles);
        });
    assert_eq!(sched.registry.get(thd).accounting.cycles, 500);
}

#[test]
fn switch_release_writes_hint_before_kernel_switch() {
    let sched = Scheduler::new(MockFacade::new());
    sched.facade.set_current_thread(ThreadId(1));
    sched.lock().take().unwrap();

    ThreadSwitch::switch_release(&sched.facade, &sched.hint, &sched.lock(), ThreadId(2), 0x2, 7)
        .unwrap();
    assert_eq!(sched.hint.read(), (2, 0x2, 7));
}
