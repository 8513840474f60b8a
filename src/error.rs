//! Structured error types for Tempus.
//!
//! All fallible public APIs return `Result<T, SimError>`. This lets
//! callers distinguish lookup failures (e.g. entity not found) from
//! programming errors (e.g. scheduling in the past) without relying on
//! panics or stringly-typed errors.

use thiserror::Error;

use crate::entity::EntityId;
use crate::event::EventName;
use crate::time::VirtualTime;

/// The top-level error type for the simulation kernel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    // ── Scheduling errors ─────────────────────────────────

    /// Attempted to schedule an event before the current time (or at NaN).
    #[error("cannot schedule event at {requested} when current time is {current}")]
    InvalidTime {
        requested: VirtualTime,
        current: VirtualTime,
    },

    // ── Dispatch errors ───────────────────────────────────

    /// The target's type has no handler bound to the event name.
    #[error("entity type '{entity_type}' has no handler for event '{event}'")]
    UnknownEvent {
        entity_type: &'static str,
        event: EventName,
    },

    /// Two handlers were bound to the same event name on one type.
    #[error("entity type '{entity_type}' binds event '{event}' more than once")]
    DuplicateHandler {
        entity_type: &'static str,
        event: EventName,
    },

    // ── Registry errors ───────────────────────────────────

    /// No entity type is registered under this name.
    #[error("entity type '{0}' is not registered")]
    TypeNotFound(String),

    /// A different Rust type already claimed this entity type name.
    #[error("entity type name '{0}' is already taken by another type")]
    DuplicateType(String),

    /// An entity ID was referenced but is not registered.
    #[error("entity {0} not found")]
    UnknownEntity(EntityId),

    /// A typed lookup found an entity of another type.
    #[error("entity {entity} is not a {expected}")]
    EntityTypeMismatch {
        entity: EntityId,
        expected: &'static str,
    },

    /// The entity is currently executing a handler and cannot be borrowed.
    #[error("entity {0} is busy handling an event")]
    EntityBusy(EntityId),

    // ── Payload / config / domain errors ──────────────────

    /// An event payload did not have the shape a handler expected.
    #[error("payload mismatch: expected {expected}, found {found}")]
    Payload {
        expected: &'static str,
        found: &'static str,
    },

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A domain-level failure raised from inside a handler.
    #[error("handler failed: {0}")]
    Handler(String),
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Config(err.to_string())
    }
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
