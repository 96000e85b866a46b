//! Readiness markers for latency-gated requests.
//!
//! Each admitted request owns a slot in an arena. The completion event carries only the
//! [`SlotId`]; the slot is released when the request leaves its queue, and a generation
//! counter makes any stale id harmless.

use crate::event::{Schedule, Tick};
use tracing::{trace, warn};

/// Handle to a readiness slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Reserved; completion not yet delivered.
    Pending,
    Ready,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: SlotState,
}

/// Arena of readiness markers plus the scheduling of their one-shot completions.
#[derive(Debug, Default)]
pub struct LatencyTimer {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a marker in the not-ready state. No event is scheduled yet.
    pub fn reserve(&mut self) -> SlotId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    state: SlotState::Free,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.state = SlotState::Pending;
        SlotId {
            index,
            generation: slot.generation,
        }
    }

    /// Schedules the completion for a reserved marker at tick `at`.
    pub fn start<E, S, F>(&mut self, id: SlotId, sched: &mut S, at: Tick, event: F)
    where
        S: Schedule<E>,
        F: FnOnce(SlotId) -> E,
    {
        debug_assert!(self.lookup(id).is_some(), "starting a released slot");
        trace!(slot = id.index, at, "latency timer armed");
        sched.schedule(at, event(id));
    }

    /// Delivers a completion: flips the marker to ready. Returns false, changing nothing,
    /// if the slot was released or already completed.
    pub fn complete(&mut self, id: SlotId) -> bool {
        match self.lookup_mut(id) {
            Some(slot) if slot.state == SlotState::Pending => {
                slot.state = SlotState::Ready;
                true
            }
            Some(_) => {
                warn!(slot = id.index, "duplicate latency completion ignored");
                false
            }
            None => {
                warn!(slot = id.index, "latency completion for released slot ignored");
                false
            }
        }
    }

    pub fn is_ready(&self, id: SlotId) -> bool {
        self.lookup(id)
            .map_or(false, |slot| slot.state == SlotState::Ready)
    }

    /// Returns the slot to the arena. Its id becomes stale.
    pub fn release(&mut self, id: SlotId) {
        if let Some(slot) = self.lookup_mut(id) {
            slot.state = SlotState::Free;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }

    /// Number of reserved (pending or ready) slots.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn lookup(&self, id: SlotId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation && s.state != SlotState::Free)
    }

    fn lookup_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation && s.state != SlotState::Free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;

    #[test]
    fn marker_flips_once_via_completion() {
        let mut timer = LatencyTimer::new();
        let mut q: EventQueue<SlotId> = EventQueue::new();
        let id = timer.reserve();
        timer.start(id, &mut q, 3, |slot| slot);
        assert!(!timer.is_ready(id));

        let (tick, fired) = q.pop().expect("completion scheduled");
        assert_eq!(tick, 3);
        assert!(timer.complete(fired));
        assert!(timer.is_ready(id));
        assert!(!timer.complete(fired), "second completion is ignored");
        assert!(timer.is_ready(id));
    }

    #[test]
    fn released_slot_ids_go_stale() {
        let mut timer = LatencyTimer::new();
        let old = timer.reserve();
        timer.release(old);
        assert_eq!(timer.live(), 0);

        let new = timer.reserve();
        assert_ne!(old, new, "reused index carries a new generation");
        assert!(!timer.complete(old));
        assert!(!timer.is_ready(new));
        assert!(timer.complete(new));
        assert!(!timer.is_ready(old));
    }

    #[test]
    fn release_twice_does_not_double_free() {
        let mut timer = LatencyTimer::new();
        let a = timer.reserve();
        timer.release(a);
        timer.release(a);
        let b = timer.reserve();
        let c = timer.reserve();
        assert_ne!(b, c);
        assert_eq!(timer.live(), 2);
    }
}
