//! Deterministic event queue.
//!
//! Uses a `BinaryHeap` with reversed `Ord` on `Event` to act as a
//! min-heap keyed by `(time, sequence)`. Because sequences are strictly
//! increasing and the heap is deterministic, two runs with the same
//! scheduling calls always produce the same pop order.

use std::collections::{BinaryHeap, HashSet};

use thiserror::Error;

use crate::entity::{EntityId, Payload};
use crate::event::{Event, EventName, Sequence, SequenceGen};
use crate::time::VirtualTime;

/// `pop_min` was called on a queue with no live events.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("event queue is empty")]
pub struct QueueEmpty;

/// `push` was handed an event whose sequence is still queued.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sequence {0} is already queued")]
pub struct SequenceInUse(pub Sequence);

/// The kernel's pending-event store.
///
/// Owns the heap and the sequence generator. Cancelled events stay in
/// the heap until they reach the head, where they are discarded; the
/// head is therefore never a cancelled event.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    /// Min-heap (via reversed Ord on Event).
    heap: BinaryHeap<Event>,

    /// Monotonic sequence generator.
    sequences: SequenceGen,

    /// Sequences pushed but neither popped nor cancelled.
    pending: HashSet<Sequence>,

    /// Sequences cancelled but still physically in the heap.
    cancelled: HashSet<Sequence>,
}

impl EventQueue {
    /// Create a new, empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a sequence, build the event and push it.
    pub fn enqueue(
        &mut self,
        time: VirtualTime,
        target: EntityId,
        name: EventName,
        payload: Payload,
    ) -> Sequence {
        let sequence = self.sequences.next_sequence();
        self.insert(Event::new(time, sequence, target, name, payload));
        sequence
    }

    /// Insert a fully built event.
    ///
    /// The event keeps its own sequence, and the generator moves past it
    /// so later `enqueue` calls never mint it again. Fails if the
    /// sequence is pending or cancelled but not yet discarded.
    pub fn push(&mut self, event: Event) -> Result<(), SequenceInUse> {
        let sequence = event.sequence;
        if self.pending.contains(&sequence) || self.cancelled.contains(&sequence) {
            return Err(SequenceInUse(sequence));
        }
        self.sequences.advance_past(sequence);
        self.insert(event);
        Ok(())
    }

    fn insert(&mut self, event: Event) {
        self.pending.insert(event.sequence);
        self.heap.push(event);
    }

    /// Pop the next live event (earliest time, lowest sequence).
    pub fn pop_min(&mut self) -> Result<Event, QueueEmpty> {
        let event = self.heap.pop().ok_or(QueueEmpty)?;
        self.pending.remove(&event.sequence);
        self.discard_cancelled_head();
        Ok(event)
    }

    /// Time of the next live event, if any.
    pub fn peek_min_time(&self) -> Option<VirtualTime> {
        self.heap.peek().map(|e| e.time)
    }

    /// Peek at the next live event without removing it.
    pub fn peek(&self) -> Option<&Event> {
        self.heap.peek()
    }

    /// Returns `true` if no live events remain.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of live (not cancelled) pending events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if `sequence` is scheduled and not yet dispatched
    /// or cancelled.
    pub fn is_pending(&self, sequence: Sequence) -> bool {
        self.pending.contains(&sequence)
    }

    /// Revoke a pending event.
    ///
    /// Returns `false` if the event already fired, was already cancelled,
    /// or was never scheduled.
    pub fn cancel(&mut self, sequence: Sequence) -> bool {
        if !self.pending.remove(&sequence) {
            return false;
        }
        self.cancelled.insert(sequence);
        self.discard_cancelled_head();
        true
    }

    /// Returns the sequence that the next `enqueue` will assign.
    pub fn next_sequence(&self) -> Sequence {
        self.sequences.peek()
    }

    /// Drain all live events in dispatch order into a `Vec`.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.len());
        while let Ok(e) = self.pop_min() {
            events.push(e);
        }
        events
    }

    fn discard_cancelled_head(&mut self) {
        while let Some(head) = self.heap.peek() {
            if !self.cancelled.remove(&head.sequence) {
                break;
            }
            self.heap.pop();
        }
    }
}
