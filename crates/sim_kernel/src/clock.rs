//! Virtual clock and event queue.
//!
//! Events are totally ordered by `(fire_time, priority, sequence)`; the
//! sequence counter is strictly increasing, so equal time+priority events
//! fire in schedule order. Scheduled-but-unfired events stay addressable in
//! a side table, which is what lets callers attach callbacks, clear them
//! (defusal), or arm untriggered events later.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::SimError;
use crate::event::{Callback, Event, EventId};

/// Virtual simulation time, in seconds.
pub type SimTime = f64;

/// Priority class; lower fires first at equal times. Routine wake-ups use
/// [Priority::Urgent] so they run before same-time domain events.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Urgent = 0,
    Normal = 1,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueKey {
    fire_at: SimTime,
    priority: Priority,
    seq: u64,
}

impl Eq for QueueKey {}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap over
        // (fire_at, priority, seq). fire_at is validated finite at insert.
        other
            .fire_at
            .total_cmp(&self.fire_at)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct PendingEvent {
    event: Event,
    priority: Priority,
    triggered: bool,
}

/// One popped event together with the ordering key it fired under.
#[derive(Debug)]
pub(crate) struct Firing {
    pub(crate) time: SimTime,
    pub(crate) priority: Priority,
    pub(crate) seq: u64,
    pub(crate) event: Event,
}

/// Min-ordered event queue driving the virtual clock.
#[derive(Debug, Default)]
pub struct EventQueue {
    now: SimTime,
    next_seq: u64,
    heap: BinaryHeap<QueueKey>,
    pending: HashMap<u64, PendingEvent>,
}

impl EventQueue {
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of events armed to fire.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Fire time of the queue head, if any.
    pub fn next_fire_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|key| key.fire_at)
    }

    /// Schedule `event` to fire after `delay`. Rejects negative or
    /// non-finite delays before the event ever enters the queue.
    pub(crate) fn schedule(
        &mut self,
        event: Event,
        priority: Priority,
        delay: SimTime,
    ) -> Result<EventId, SimError> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(SimError::InvalidDelay(delay));
        }
        let fire_at = self.now + delay;
        Ok(self.insert(event, priority, Some(fire_at)))
    }

    /// Schedule `event` at the current time.
    pub(crate) fn schedule_now(&mut self, event: Event, priority: Priority) -> EventId {
        self.insert(event, priority, Some(self.now))
    }

    /// Create an event that is addressable (callbacks can be attached) but
    /// not yet armed to fire; see [EventQueue::trigger].
    pub(crate) fn create_untriggered(&mut self, event: Event, priority: Priority) -> EventId {
        self.insert(event, priority, None)
    }

    fn insert(&mut self, mut event: Event, priority: Priority, fire_at: Option<SimTime>) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = EventId(seq);
        event.id = id;
        if let Some(fire_at) = fire_at {
            self.heap.push(QueueKey {
                fire_at,
                priority,
                seq,
            });
        }
        self.pending.insert(
            seq,
            PendingEvent {
                event,
                priority,
                triggered: fire_at.is_some(),
            },
        );
        id
    }

    /// Arm an untriggered event to fire at the current time. Returns false
    /// if the event is unknown, already armed, or already fired.
    pub(crate) fn trigger(&mut self, id: EventId) -> bool {
        let Some(pending) = self.pending.get_mut(&id.0) else {
            return false;
        };
        if pending.triggered {
            return false;
        }
        pending.triggered = true;
        self.heap.push(QueueKey {
            fire_at: self.now,
            priority: pending.priority,
            seq: id.0,
        });
        true
    }

    pub(crate) fn event(&self, id: EventId) -> Option<&Event> {
        self.pending.get(&id.0).map(|pending| &pending.event)
    }

    /// Attach a callback to a not-yet-fired event. Returns false if the
    /// event already fired (or never existed).
    pub(crate) fn attach_callback(&mut self, id: EventId, callback: Callback) -> bool {
        match self.pending.get_mut(&id.0) {
            Some(pending) => {
                pending.event.callbacks.push(callback);
                true
            }
            None => false,
        }
    }

    pub(crate) fn extend_callbacks(&mut self, id: EventId, callbacks: Vec<Callback>) {
        if let Some(pending) = self.pending.get_mut(&id.0) {
            pending.event.callbacks.extend(callbacks);
        }
    }

    pub(crate) fn remove_callback(&mut self, id: EventId, callback: &Callback) {
        if let Some(pending) = self.pending.get_mut(&id.0) {
            pending.event.callbacks.retain(|cb| cb != callback);
        }
    }

    /// Clear a pending event's callback list. The event still fires (and is
    /// still logged); it just no longer wakes anything.
    pub(crate) fn clear_callbacks(&mut self, id: EventId) -> bool {
        match self.pending.get_mut(&id.0) {
            Some(pending) => {
                pending.event.callbacks.clear();
                true
            }
            None => false,
        }
    }

    pub(crate) fn peek_seq(&self) -> Option<EventId> {
        self.heap.peek().map(|key| EventId(key.seq))
    }

    /// Pop the head and advance the clock to its fire time.
    pub(crate) fn pop_next(&mut self) -> Option<Firing> {
        let key = self.heap.pop()?;
        let pending = self.pending.remove(&key.seq)?;
        self.now = key.fire_at;
        Some(Firing {
            time: key.fire_at,
            priority: key.priority,
            seq: key.seq,
            event: pending.event,
        })
    }
}
