//! `Entity` trait and the per-type handler table.

use std::collections::HashMap;

use crate::error::{SimError, SimResult};
use crate::event::EventName;
use crate::model::Context;

use super::id::EntityId;
use super::payload::Payload;

// ── Handler ───────────────────────────────────────────────────────────

/// A handler bound to one event name on one entity type.
///
/// Plain function pointers, so inherent methods with the matching
/// signature can be bound directly: `table.on("arrival", Self::arrival)`.
pub type Handler<E> = fn(&mut E, &mut Context<'_>, &Payload) -> SimResult<()>;

// ── Entity ────────────────────────────────────────────────────────────

/// Trait implemented by every simulated entity type.
///
/// Entities react to events through handlers declared once per type in
/// [`Entity::bind`]. The table is built when the type is registered with
/// the model and shared by every instance.
///
/// # Contract
///
/// Implementations **must**:
/// - Not use global mutable state.
/// - Route all side effects through the handler's `Context`.
/// - Be deterministic for equal inputs (randomness comes from a seeded
///   source the entity owns).
///
/// # Example
///
/// ```rust
/// use tempus::{Context, Entity, EntityId, HandlerTable, Payload, SimResult};
///
/// struct Counter { hits: u32 }
///
/// impl Counter {
///     fn hit(&mut self, _ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
///         self.hits += 1;
///         Ok(())
///     }
/// }
///
/// impl Entity for Counter {
///     const TYPE_NAME: &'static str = "counter";
///
///     fn create(_id: EntityId, _args: &Payload) -> SimResult<Self> {
///         Ok(Counter { hits: 0 })
///     }
///
///     fn bind(table: &mut HandlerTable<Self>) -> SimResult<()> {
///         table.on("hit", Self::hit)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Entity: Sized + 'static {
    /// Name under which the type is registered and reported in errors.
    const TYPE_NAME: &'static str;

    /// Build an instance from constructor arguments.
    fn create(id: EntityId, args: &Payload) -> SimResult<Self>;

    /// Declare the type's event-name → handler bindings.
    fn bind(table: &mut HandlerTable<Self>) -> SimResult<()>;
}

// ── HandlerTable ──────────────────────────────────────────────────────

/// Static dispatch table of one entity type.
pub struct HandlerTable<E> {
    entity_type: &'static str,
    handlers: HashMap<EventName, Handler<E>>,
}

impl<E: Entity> HandlerTable<E> {
    /// Build the table by running `E::bind` once.
    pub fn build() -> SimResult<Self> {
        let mut table = HandlerTable {
            entity_type: E::TYPE_NAME,
            handlers: HashMap::new(),
        };
        E::bind(&mut table)?;
        Ok(table)
    }

    /// Bind `handler` to `name`.
    ///
    /// Binding the same name twice fails with `DuplicateHandler`.
    pub fn on(
        &mut self,
        name: impl Into<EventName>,
        handler: Handler<E>,
    ) -> SimResult<&mut Self> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(SimError::DuplicateHandler {
                entity_type: self.entity_type,
                event: name,
            });
        }
        self.handlers.insert(name, handler);
        Ok(self)
    }

    /// Look up `name` and invoke its handler synchronously.
    pub fn dispatch(
        &self,
        entity: &mut E,
        ctx: &mut Context<'_>,
        name: &EventName,
        payload: &Payload,
    ) -> SimResult<()> {
        let handler = self.handlers.get(name).ok_or_else(|| SimError::UnknownEvent {
            entity_type: self.entity_type,
            event: name.clone(),
        })?;
        handler(entity, ctx, payload)
    }
}

impl<E> HandlerTable<E> {
    pub fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    pub fn handles(&self, name: &EventName) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Bound event names in sorted order.
    pub fn event_names(&self) -> Vec<&EventName> {
        let mut names: Vec<&EventName> = self.handlers.keys().collect();
        names.sort();
        names
    }
}

impl<E> std::fmt::Debug for HandlerTable<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field("entity_type", &self.entity_type)
            .field("events", &self.event_names())
            .finish()
    }
}
