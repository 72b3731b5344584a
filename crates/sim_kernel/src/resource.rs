//! Bounded-capacity shared resource with a FIFO request/release protocol.
//!
//! A request returns an event that fires when a slot is granted:
//! immediately while capacity remains, otherwise when a holder releases and
//! the requester reaches the front of the wait queue. Waiters are granted
//! one at a time in arrival order, which gives mutual exclusion per slot and
//! FIFO fairness without locks.

use std::collections::VecDeque;

use crate::environment::SimContext;
use crate::event::EventId;

/// A pool of identical service slots (e.g. receptionists at a desk).
///
/// Typically shared between a component and the routines it spawns; routines
/// yield the grant event returned by [SlotPool::request].
#[derive(Debug)]
pub struct SlotPool {
    capacity: usize,
    in_use: usize,
    waiters: VecDeque<EventId>,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_use: 0,
            waiters: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Requests waiting for a slot.
    pub fn queue_len(&self) -> usize {
        self.waiters.len()
    }

    /// Ask for a slot. The returned event fires once the slot is granted.
    pub fn request(&mut self, ctx: &mut SimContext) -> EventId {
        let grant = ctx.pending_event();
        if self.in_use < self.capacity {
            self.in_use += 1;
            ctx.trigger(grant);
        } else {
            self.waiters.push_back(grant);
        }
        grant
    }

    /// Give a slot back. The oldest waiter (if any) is granted it directly;
    /// otherwise capacity is freed.
    pub fn release(&mut self, ctx: &mut SimContext) {
        if let Some(next) = self.waiters.pop_front() {
            ctx.trigger(next);
        } else {
            self.in_use = self.in_use.saturating_sub(1);
        }
    }

    /// Withdraw a queued request (e.g. after its process was interrupted)
    /// so the slot is not granted to a waiter that no longer exists.
    pub fn withdraw(&mut self, grant: EventId) -> bool {
        let before = self.waiters.len();
        self.waiters.retain(|waiter| waiter != &grant);
        self.waiters.len() != before
    }
}
