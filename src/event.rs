//! Discrete-event scheduling: virtual time, the event queue, and cancellable periodic tasks.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Global simulation time (discrete).
pub type Tick = u64;

/// A duration expressed in clock cycles of the owning component.
pub type Cycles = u64;

/// Returns the tick `cycles` clock edges after `now`: `now` is first aligned up to the
/// next edge of a clock with the given period.
pub fn clock_edge(now: Tick, cycles: Cycles, period: Tick) -> Tick {
    assert!(period > 0, "clock period must be non-zero");
    now.div_ceil(period) * period + cycles * period
}

/// Ordering of events that share a tick. Lower values run first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i8);

impl Priority {
    /// Latency completions and other one-shot model events.
    pub const DEFAULT: Priority = Priority(0);
    /// Per-tick drivers: run after every completion scheduled for the same tick.
    pub const CLOCK: Priority = Priority(50);
    /// Stimuli injected by peers outside the component under test.
    pub const EXTERNAL: Priority = Priority(100);
}

/// Handle to a scheduled event, usable for cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// The scheduler collaborator seen by components.
pub trait Schedule<E> {
    fn now(&self) -> Tick;

    fn schedule_with(&mut self, when: Tick, priority: Priority, event: E) -> EventId;

    fn schedule(&mut self, when: Tick, event: E) -> EventId {
        self.schedule_with(when, Priority::DEFAULT, event)
    }

    /// Cancels a pending event. Returns false if it already fired or was cancelled.
    fn deschedule(&mut self, id: EventId) -> bool;
}

struct Entry<E> {
    when: Tick,
    priority: Priority,
    seq: u64,
    event: E,
}

impl<E> Entry<E> {
    fn key(&self) -> (Tick, Priority, u64) {
        (self.when, self.priority, self.seq)
    }
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    // Reversed so the max-heap pops the earliest key.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Time-ordered event queue. Ties on tick are broken by priority, then by insertion order.
pub struct EventQueue<E> {
    heap: BinaryHeap<Entry<E>>,
    live: HashSet<u64>,
    next_seq: u64,
    now: Tick,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashSet::new(),
            next_seq: 0,
            now: 0,
        }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Number of pending (not cancelled) events.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Tick of the next pending event.
    pub fn peek_tick(&mut self) -> Option<Tick> {
        self.discard_cancelled();
        self.heap.peek().map(|e| e.when)
    }

    /// Pops the next event if it is due at or before `limit`, advancing time to it.
    pub fn pop_until(&mut self, limit: Tick) -> Option<(Tick, E)> {
        self.discard_cancelled();
        if self.heap.peek()?.when > limit {
            return None;
        }
        let entry = self.heap.pop()?;
        self.live.remove(&entry.seq);
        self.now = entry.when;
        Some((entry.when, entry.event))
    }

    pub fn pop(&mut self) -> Option<(Tick, E)> {
        self.pop_until(Tick::MAX)
    }

    /// Cancels a pending event. Returns false if it already fired or was cancelled.
    pub fn deschedule(&mut self, id: EventId) -> bool {
        self.live.remove(&id.0)
    }

    /// Moves time forward to `tick` once every earlier event has been processed.
    pub fn advance_to(&mut self, tick: Tick) {
        debug_assert!(
            self.peek_tick().map_or(true, |next| next >= tick),
            "advancing past unprocessed events"
        );
        self.now = self.now.max(tick);
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.live.contains(&top.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<E, T: Into<E>> Schedule<T> for EventQueue<E> {
    fn now(&self) -> Tick {
        self.now
    }

    fn schedule_with(&mut self, when: Tick, priority: Priority, event: T) -> EventId {
        assert!(
            when >= self.now,
            "event scheduled in the past ({when} < {})",
            self.now
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(seq);
        self.heap.push(Entry {
            when,
            priority,
            seq,
            event: event.into(),
        });
        EventId(seq)
    }

    fn deschedule(&mut self, id: EventId) -> bool {
        EventQueue::deschedule(self, id)
    }
}

/// A self re-arming event with an explicit stop.
///
/// The owner calls [`fired`](Self::fired) when the event is delivered and
/// [`arm`](Self::arm) to schedule the next occurrence.
#[derive(Debug)]
pub struct PeriodicTask {
    priority: Priority,
    pending: Option<EventId>,
    stopped: bool,
}

impl PeriodicTask {
    pub fn new(priority: Priority) -> Self {
        Self {
            priority,
            pending: None,
            stopped: false,
        }
    }

    /// Schedules the next occurrence. Does nothing once stopped or while one is pending.
    pub fn arm<E, S: Schedule<E>>(&mut self, sched: &mut S, when: Tick, event: E) -> bool {
        if self.stopped || self.pending.is_some() {
            return false;
        }
        self.pending = Some(sched.schedule_with(when, self.priority, event));
        true
    }

    pub fn fired(&mut self) {
        self.pending = None;
    }

    /// Refuses further arming and hands back the pending occurrence, which the caller
    /// deschedules.
    pub fn stop(&mut self) -> Option<EventId> {
        self.stopped = true;
        self.pending.take()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped && self.pending.is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}
