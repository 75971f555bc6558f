//! The kernel event channel (spec section 4.4): a ring of kernel-produced
//! events, each bound to a thread's event slot, plus the per-slot urgency
//! region a policy layer can steer.

use core::sync::atomic::{AtomicU16, Ordering};

use crate::consts::NUM_SCHED_EVTS;
use crate::error::{SchedError, SchedResult};
use crate::facade::RawEvent;
use crate::sched::registry::ThreadRegistry;
use crate::sched::thread::{DescriptorId, ThreadDescriptor};

/// Binds event slots to threads and holds the urgency the kernel's event
/// delivery consults when choosing what to report. Slot 0 is reserved as a
/// "no event" sentinel, matching `RawEvent::slot_id == 0` meaning "ignore".
pub struct EventChannel {
    slots: [Option<DescriptorId>; NUM_SCHED_EVTS],
    urgencies: [AtomicU16; NUM_SCHED_EVTS],
}

impl EventChannel {
    pub const fn new() -> Self {
        const ZERO: AtomicU16 = AtomicU16::new(0);
        Self {
            slots: [None; NUM_SCHED_EVTS],
            urgencies: [ZERO; NUM_SCHED_EVTS],
        }
    }

    /// Bind a fresh event slot to `thd`, write the slot id into `thd`'s
    /// descriptor, and return it. Slot 0 is never handed out.
    pub fn alloc_event(
        &mut self,
        registry: &mut ThreadRegistry,
        thd: DescriptorId,
    ) -> SchedResult<u16> {
        for i in 1..NUM_SCHED_EVTS {
            if self.slots[i].is_none() {
                self.slots[i] = Some(thd);
                registry.get_mut(thd).event_slot = i as u16;
                return Ok(i as u16);
            }
        }
        Err(SchedError::Exhausted)
    }

    /// Drain up to `proc_amnt` events from `ring`, invoking `visit` with the
    /// bound thread's descriptor for each one whose slot is still bound.
    /// Events for an unbound or out-of-range slot are silently dropped (the
    /// owning thread has likely already been freed).
    pub fn process_events(
        &self,
        registry: &mut ThreadRegistry,
        ring: impl IntoIterator<Item = RawEvent>,
        proc_amnt: usize,
        mut visit: impl FnMut(&mut ThreadDescriptor, u8, u32),
    ) {
        for ev in ring.into_iter().take(proc_amnt) {
            if ev.slot_id == 0 {
                continue;
            }
            let idx = ev.slot_id as usize;
            if idx >= NUM_SCHED_EVTS {
                continue;
            }
            if let Some(thd) = self.slots[idx] {
                visit(registry.get_mut(thd), ev.flags, ev.cpu_cycles);
            }
        }
    }

    /// Forward an urgency value to the shared region backing event slot
    /// `slot`, so the kernel's event delivery can prioritize accordingly.
    pub fn set_evt_urgency(&self, slot: u16, urgency: u16) {
        if let Some(cell) = self.urgencies.get(slot as usize) {
            cell.store(urgency, Ordering::Relaxed);
        }
    }

    pub fn evt_urgency(&self, slot: u16) -> u16 {
        self.urgencies
            .get(slot as usize)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Update a thread's urgency metric and, if it has a bound event slot,
    /// mirror the value into the shared urgency region.
    pub fn set_thd_urgency(&self, thd: &mut ThreadDescriptor, urgency: u16) {
        thd.metric.urgency = urgency;
        if thd.event_slot != 0 {
            self.set_evt_urgency(thd.event_slot, urgency);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::ThreadId;

    #[test]
    fn alloc_never_hands_out_slot_zero() {
        let mut registry = ThreadRegistry::new();
        let d = registry.alloc_thd(ThreadId(1)).unwrap();
        let mut channel = EventChannel::new();
        let slot = channel.alloc_event(&mut registry, d).unwrap();
        assert_ne!(slot, 0);
    }

    #[test]
    fn alloc_event_writes_slot_into_descriptor() {
        let mut registry = ThreadRegistry::new();
        let d = registry.alloc_thd(ThreadId(1)).unwrap();
        let mut channel = EventChannel::new();
        let slot = channel.alloc_event(&mut registry, d).unwrap();
        assert_eq!(registry.get(d).event_slot, slot);
    }

    #[test]
    fn process_events_dispatches_to_bound_thread() {
        let mut registry = ThreadRegistry::new();
        let d = registry.alloc_thd(ThreadId(1)).unwrap();
        let mut channel = EventChannel::new();
        let slot = channel.alloc_event(&mut registry, d).unwrap();

        let events = [RawEvent {
            slot_id: slot as u8,
            flags: 0x7,
            cpu_cycles: 1234,
        }];
        let mut seen = None;
        channel.process_events(&mut registry, events, 8, |thd, flags, cycles| {
            seen = Some((thd.id, flags, cycles));
        });
        assert_eq!(seen, Some((ThreadId(1), 0x7, 1234)));
    }

    #[test]
    fn set_thd_urgency_mirrors_to_event_region() {
        let mut registry = ThreadRegistry::new();
        let d = registry.alloc_thd(ThreadId(1)).unwrap();
        let mut channel = EventChannel::new();
        let slot = channel.alloc_event(&mut registry, d).unwrap();

        channel.set_thd_urgency(registry.get_mut(d), 9);
        assert_eq!(registry.get(d).metric.urgency, 9);
        assert_eq!(channel.evt_urgency(slot), 9);
    }
}
