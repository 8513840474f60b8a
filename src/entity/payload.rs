//! Event payload carried from the scheduler to a handler.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

use super::id::EntityId;

/// Arguments attached to an event or handed to an entity constructor.
///
/// The kernel treats payloads as opaque; only handlers interpret them.
/// The typed accessors fail with [`SimError::Payload`] instead of
/// panicking so a malformed event aborts the run cleanly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// No arguments.
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    /// Raw bytes.
    Data(Vec<u8>),
    /// A handle to another entity (e.g. "reply to this one").
    Entity(EntityId),
    List(Vec<Payload>),
}

impl Payload {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Int(_) => "int",
            Payload::Float(_) => "float",
            Payload::Text(_) => "text",
            Payload::Data(_) => "data",
            Payload::Entity(_) => "entity",
            Payload::List(_) => "list",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    pub fn as_int(&self) -> SimResult<i64> {
        match self {
            Payload::Int(v) => Ok(*v),
            other => Err(other.mismatch("int")),
        }
    }

    /// Integers widen to floats; everything else is a mismatch.
    pub fn as_float(&self) -> SimResult<f64> {
        match self {
            Payload::Float(v) => Ok(*v),
            Payload::Int(v) => Ok(*v as f64),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_text(&self) -> SimResult<&str> {
        match self {
            Payload::Text(s) => Ok(s),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn as_data(&self) -> SimResult<&[u8]> {
        match self {
            Payload::Data(d) => Ok(d),
            other => Err(other.mismatch("data")),
        }
    }

    pub fn as_entity(&self) -> SimResult<EntityId> {
        match self {
            Payload::Entity(id) => Ok(*id),
            other => Err(other.mismatch("entity")),
        }
    }

    pub fn as_list(&self) -> SimResult<&[Payload]> {
        match self {
            Payload::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> SimError {
        SimError::Payload {
            expected,
            found: self.kind(),
        }
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Int(v)
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Float(v)
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_owned())
    }
}

impl From<EntityId> for Payload {
    fn from(id: EntityId) -> Self {
        Payload::Entity(id)
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(items: Vec<Payload>) -> Self {
        Payload::List(items)
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Empty => write!(f, "Empty"),
            Payload::Int(v) => write!(f, "Int({})", v),
            Payload::Float(v) => write!(f, "Float({})", v),
            Payload::Text(s) => {
                if s.chars().count() > 32 {
                    let head: String = s.chars().take(32).collect();
                    write!(f, "Text(\"{}…\")", head)
                } else {
                    write!(f, "Text({:?})", s)
                }
            }
            Payload::Data(d) => write!(f, "Data({} bytes)", d.len()),
            Payload::Entity(id) => write!(f, "Entity({})", id),
            Payload::List(items) => write!(f, "List({} items)", items.len()),
        }
    }
}
