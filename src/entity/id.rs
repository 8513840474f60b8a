//! Entity ID — a lightweight, ordered, copyable entity handle.

use serde::{Deserialize, Serialize};

/// A unique handle to a registered entity.
///
/// `EntityId` is an index into the registry's arena, not an owning
/// pointer, so it can be copied freely and stored inside other entities
/// or event payloads. IDs are never reused while the owning model lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Create an entity ID from a raw integer.
    #[inline]
    pub fn new(id: u64) -> Self {
        EntityId(id)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Arena slot, or `None` if the ID does not fit in `usize`.
    #[inline]
    pub(crate) fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.0)
    }
}
