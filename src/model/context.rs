//! `Context` — the handler's view of the model during one dispatch.

use crate::entity::{Entity, EntityId, Payload, Registry};
use crate::error::{SimError, SimResult};
use crate::event::{EventName, Sequence};
use crate::queue::EventQueue;
use crate::time::VirtualTime;

/// Validate and enqueue one event. Shared by [`super::Model`] and
/// [`Context`] so both enforce the same causality rule.
///
/// On failure the queue is left untouched.
pub(crate) fn schedule_event(
    queue: &mut EventQueue,
    registry: &Registry,
    now: VirtualTime,
    at: VirtualTime,
    target: EntityId,
    name: EventName,
    payload: Payload,
) -> SimResult<Sequence> {
    if !at.is_valid() || at < now {
        return Err(SimError::InvalidTime {
            requested: at,
            current: now,
        });
    }
    if !registry.contains(target) {
        return Err(SimError::UnknownEntity(target));
    }
    let sequence = queue.enqueue(at, target, name, payload);
    log::debug!("scheduled {} for {} at {}", sequence, target, at);
    Ok(sequence)
}

/// Mutable context passed to a handler on every dispatch.
///
/// Provides the handler with:
/// - the current virtual time and its own ID
/// - the ability to schedule, send and cancel events
/// - typed access to other entities and entity creation
///
/// The context borrows the queue and registry mutably for one dispatch
/// only, so entities never hold a reference to the model.
pub struct Context<'a> {
    now: VirtualTime,
    me: EntityId,
    queue: &'a mut EventQueue,
    registry: &'a mut Registry,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        now: VirtualTime,
        me: EntityId,
        queue: &'a mut EventQueue,
        registry: &'a mut Registry,
    ) -> Self {
        Context {
            now,
            me,
            queue,
            registry,
        }
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// ID of the entity whose handler is running.
    #[inline]
    pub fn me(&self) -> EntityId {
        self.me
    }

    /// Schedule an event at an absolute virtual time.
    ///
    /// Fails with `InvalidTime` if `at` is before now.
    pub fn schedule(
        &mut self,
        at: impl Into<VirtualTime>,
        target: EntityId,
        name: impl Into<EventName>,
        payload: impl Into<Payload>,
    ) -> SimResult<Sequence> {
        schedule_event(
            self.queue,
            self.registry,
            self.now,
            at.into(),
            target,
            name.into(),
            payload.into(),
        )
    }

    /// Schedule an event `delay` time units after now.
    pub fn schedule_after(
        &mut self,
        delay: f64,
        target: EntityId,
        name: impl Into<EventName>,
        payload: impl Into<Payload>,
    ) -> SimResult<Sequence> {
        let at = self.now.plus(delay);
        self.schedule(at, target, name, payload)
    }

    /// Schedule an event for the running entity itself.
    pub fn schedule_self(
        &mut self,
        delay: f64,
        name: impl Into<EventName>,
        payload: impl Into<Payload>,
    ) -> SimResult<Sequence> {
        let me = self.me;
        self.schedule_after(delay, me, name, payload)
    }

    /// Schedule an event for now. It runs after every event already
    /// queued for the same instant.
    pub fn send(
        &mut self,
        target: EntityId,
        name: impl Into<EventName>,
        payload: impl Into<Payload>,
    ) -> SimResult<Sequence> {
        let now = self.now;
        self.schedule(now, target, name, payload)
    }

    /// Revoke a pending event. Returns `false` if it already fired or
    /// was cancelled before.
    pub fn cancel(&mut self, sequence: Sequence) -> bool {
        self.queue.cancel(sequence)
    }

    /// Number of live pending events.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Borrow another entity.
    ///
    /// Fails with `EntityBusy` for the running entity itself; use the
    /// handler's `&mut self` instead.
    pub fn entity<E: Entity>(&self, id: EntityId) -> SimResult<&E> {
        self.registry.get::<E>(id)
    }

    /// Mutably borrow another entity.
    pub fn entity_mut<E: Entity>(&mut self, id: EntityId) -> SimResult<&mut E> {
        self.registry.get_mut::<E>(id)
    }

    /// Create an entity of a registered type by name.
    pub fn add(&mut self, type_name: &str, args: impl Into<Payload>) -> SimResult<EntityId> {
        self.registry.add(type_name, &args.into())
    }

    /// Create an entity of a registered type.
    pub fn spawn<E: Entity>(&mut self, args: impl Into<Payload>) -> SimResult<EntityId> {
        self.registry.spawn::<E>(&args.into())
    }
}
