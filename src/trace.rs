//! Dispatch trace for reproducibility checks.
//!
//! Records every dispatched event into an append-only log and reduces
//! it to a deterministic fingerprint, so two runs can be compared
//! without keeping both traces around.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::event::{Event, EventName, Sequence};
use crate::time::VirtualTime;

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Hash a byte slice deterministically (FNV-1a).
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

// ── DispatchRecord ────────────────────────────────────────────────────

/// A record of a single dispatched event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// Virtual time at which the event was dispatched.
    pub time: VirtualTime,
    pub sequence: Sequence,
    pub target: EntityId,
    /// Registered type name of the target.
    pub entity_type: String,
    pub name: EventName,
}

impl DispatchRecord {
    pub fn new(event: &Event, entity_type: &str) -> Self {
        DispatchRecord {
            time: event.time,
            sequence: event.sequence,
            target: event.target,
            entity_type: entity_type.to_string(),
            name: event.name.clone(),
        }
    }

    fn hash(&self) -> u64 {
        let mut h = self.time.as_f64().to_bits();
        h = hash_combine(h, self.sequence.raw());
        h = hash_combine(h, self.target.raw());
        h = hash_combine(h, hash_bytes(self.entity_type.as_bytes()));
        hash_combine(h, hash_bytes(self.name.as_str().as_bytes()))
    }
}

impl std::fmt::Display for DispatchRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {} {}:{}] {}",
            self.time, self.sequence, self.entity_type, self.target, self.name
        )
    }
}

// ── Trace ─────────────────────────────────────────────────────────────

/// Append-only log of dispatched events.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    records: Vec<DispatchRecord>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: DispatchRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[DispatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Deterministic hash of the whole dispatch sequence.
    pub fn fingerprint(&self) -> u64 {
        self.records
            .iter()
            .fold(self.records.len() as u64, |h, r| hash_combine(h, r.hash()))
    }

    /// Write the trace as JSON lines, one record per line.
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> io::Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}
