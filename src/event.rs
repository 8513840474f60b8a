//! Event records for the simulation kernel.
//!
//! Every effect in Tempus is modeled as an `Event`. Events are immutable
//! records that are placed on the queue and dispatched in deterministic
//! order to the entity they target.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Payload};
use crate::time::VirtualTime;

// ── Sequence ──────────────────────────────────────────────────────────

/// A strictly-increasing scheduling counter.
///
/// Breaks ties in the queue: two events scheduled at the same
/// `VirtualTime` are ordered by their `Sequence`, which corresponds to
/// scheduling order. Also serves as the cancellation token returned by
/// `schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sequence(u64);

impl Sequence {
    /// Wrap a raw u64 into a `Sequence`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        Sequence(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S#{}", self.0)
    }
}

// ── Sequence Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing sequence generator.
///
/// Each queue owns exactly one of these, so every event scheduled on a
/// model draws from the same counter.
#[derive(Debug, Clone, Default)]
pub struct SequenceGen {
    next: u64,
}

impl SequenceGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        SequenceGen { next: 0 }
    }

    /// Mint the next sequence number.
    pub fn next_sequence(&mut self) -> Sequence {
        let seq = Sequence(self.next);
        self.next += 1;
        seq
    }

    /// Peek at the next sequence without consuming it.
    pub fn peek(&self) -> Sequence {
        Sequence(self.next)
    }

    /// Make sure `seen` is never minted, nor anything below it.
    pub fn advance_past(&mut self, seen: Sequence) {
        self.next = self.next.max(seen.0.saturating_add(1));
    }
}

// ── Event Name ────────────────────────────────────────────────────────

/// Symbolic event name used as the dispatch key.
///
/// Static names (the common case: `"arrival"`, `"finish"`) are stored
/// without allocation; names built at runtime are owned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(Cow<'static, str>);

impl EventName {
    /// Name from a static string, usable in `const` contexts.
    pub const fn from_static(name: &'static str) -> Self {
        EventName(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for EventName {
    fn from(name: &'static str) -> Self {
        EventName(Cow::Borrowed(name))
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        EventName(Cow::Owned(name))
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single scheduled event.
///
/// The queue orders events by `(time, sequence)`; nothing else takes
/// part in the ordering, so events with equal target and name are never
/// merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The virtual time at which this event should be dispatched.
    pub time: VirtualTime,

    /// Scheduling order (monotonically increasing).
    pub sequence: Sequence,

    /// The entity whose handler receives this event.
    pub target: EntityId,

    /// Dispatch key looked up in the target type's handler table.
    pub name: EventName,

    /// Arguments handed to the handler.
    pub payload: Payload,
}

impl Event {
    /// Convenience constructor.
    pub fn new(
        time: VirtualTime,
        sequence: Sequence,
        target: EntityId,
        name: EventName,
        payload: Payload,
    ) -> Self {
        Event {
            time,
            sequence,
            target,
            name,
            payload,
        }
    }

    /// The `(time, sequence)` ordering key.
    #[inline]
    pub fn key(&self) -> (VirtualTime, Sequence) {
        (self.time, self.sequence)
    }
}

impl Eq for Event {}

/// Ordering: smallest `(time, sequence)` first.
///
/// Rust's `BinaryHeap` is a *max*-heap, so the natural ordering is
/// reversed here to turn it into a min-heap.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {}] {} -> {} ({})",
            self.time, self.sequence, self.name, self.target, self.payload
        )
    }
}
