//! The model: clock, queue, registry and the run loop.
//!
//! Drives the queue: pops events, advances virtual time, dispatches to
//! the target entity's handler. The loop is purely synchronous and
//! single-threaded, so determinism follows from the queue ordering.

pub mod context;
pub mod limits;

pub use context::Context;
pub use limits::{RunLimits, RunReport, StopReason};

use crate::entity::{Entity, EntityId, Payload, Registry};
use crate::error::SimResult;
use crate::event::{Event, EventName, Sequence};
use crate::queue::EventQueue;
use crate::time::VirtualTime;
use crate::trace::{DispatchRecord, Trace};

use context::schedule_event;

/// Lifecycle of a model.
///
/// There is no terminal state: scheduling on an exhausted model puts it
/// back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Constructed, or between `run` calls with events still queued.
    Idle,
    /// Inside a `run` call.
    Running,
    /// The queue is empty.
    Exhausted,
}

// ── Model ─────────────────────────────────────────────────────────────

/// Top-level simulation model.
///
/// Owns the event queue and every entity, and tracks the current
/// virtual time. Call `run` with [`RunLimits`] to execute; `run` may be
/// called again afterwards to continue the same simulation.
pub struct Model {
    now: VirtualTime,
    queue: EventQueue,
    registry: Registry,
    events_processed: u64,
    state: ModelState,
    trace: Option<Trace>,
}

impl Model {
    /// Create a new model starting at time zero.
    pub fn new() -> Self {
        Model {
            now: VirtualTime::ZERO,
            queue: EventQueue::new(),
            registry: Registry::new(),
            events_processed: 0,
            state: ModelState::Idle,
            trace: None,
        }
    }

    // ── Entities ──────────────────────────────────────────

    /// Register an entity type; its handler table is built here.
    pub fn register_type<E: Entity>(&mut self) -> SimResult<()> {
        self.registry.register_type::<E>()
    }

    /// Instantiate an entity of the type registered under `type_name`.
    pub fn add(&mut self, type_name: &str, args: impl Into<Payload>) -> SimResult<EntityId> {
        self.registry.add(type_name, &args.into())
    }

    /// Typed form of [`Model::add`].
    pub fn spawn<E: Entity>(&mut self, args: impl Into<Payload>) -> SimResult<EntityId> {
        self.registry.spawn::<E>(&args.into())
    }

    /// Store an instance built by the caller.
    pub fn insert<E: Entity>(&mut self, build: impl FnOnce(EntityId) -> E) -> SimResult<EntityId> {
        self.registry.insert(build)
    }

    /// Type name of the entity behind `id`.
    pub fn resolve(&self, id: EntityId) -> SimResult<&'static str> {
        self.registry.resolve(id)
    }

    /// Downcast an entity reference for inspection.
    pub fn entity<E: Entity>(&self, id: EntityId) -> SimResult<&E> {
        self.registry.get::<E>(id)
    }

    /// Downcast a mutable entity reference.
    pub fn entity_mut<E: Entity>(&mut self, id: EntityId) -> SimResult<&mut E> {
        self.registry.get_mut::<E>(id)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ── Scheduling ────────────────────────────────────────

    /// Schedule an event at an absolute virtual time.
    ///
    /// Fails with `InvalidTime` if `at` is before the current time and
    /// with `UnknownEntity` if `target` was never issued; the queue is
    /// left unmodified in both cases. The returned sequence can be
    /// passed to [`Model::cancel`].
    pub fn schedule(
        &mut self,
        at: impl Into<VirtualTime>,
        target: EntityId,
        name: impl Into<EventName>,
        payload: impl Into<Payload>,
    ) -> SimResult<Sequence> {
        let sequence = schedule_event(
            &mut self.queue,
            &self.registry,
            self.now,
            at.into(),
            target,
            name.into(),
            payload.into(),
        )?;
        if self.state == ModelState::Exhausted {
            self.state = ModelState::Idle;
        }
        Ok(sequence)
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

    /// Schedule an event for the current time.
    pub fn send(
        &mut self,
        target: EntityId,
        name: impl Into<EventName>,
        payload: impl Into<Payload>,
    ) -> SimResult<Sequence> {
        let now = self.now;
        self.schedule(now, target, name, payload)
    }

    /// Revoke a pending event.
    pub fn cancel(&mut self, sequence: Sequence) -> bool {
        self.queue.cancel(sequence)
    }

    // ── Clock & queue queries ─────────────────────────────

    /// Current virtual time.
    pub fn time(&self) -> VirtualTime {
        self.now
    }

    /// Time of the next pending event.
    pub fn peek_time(&self) -> Option<VirtualTime> {
        self.queue.peek_min_time()
    }

    /// Number of live pending events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total events dispatched so far, across all `run` calls.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Returns `true` if there are no more events to process.
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    // ── Trace ─────────────────────────────────────────────

    /// Start recording every dispatch. Has no effect if already enabled.
    pub fn enable_trace(&mut self) {
        if self.trace.is_none() {
            self.trace = Some(Trace::new());
        }
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    // ── Execution ─────────────────────────────────────────

    /// Dispatch exactly one event, if any is pending.
    pub fn step(&mut self) -> SimResult<Option<Event>> {
        let Ok(event) = self.queue.pop_min() else {
            self.state = ModelState::Exhausted;
            return Ok(None);
        };
        let result = self.dispatch(&event);
        self.settle();
        result.map(|()| Some(event))
    }

    /// Run until the queue empties or a limit is reached.
    ///
    /// An event is dispatched only while its time is at most
    /// `limits.max_time` and fewer than `limits.max_events` events have
    /// been dispatched by this call. Undispatched events stay queued.
    ///
    /// A handler error (including `UnknownEvent`) ends the call and is
    /// returned. The failing event is consumed, the clock stays at its
    /// time, and the model remains usable. Limits with a NaN `max_time`
    /// are rejected with `Config` before anything is dispatched.
    pub fn run(&mut self, limits: RunLimits) -> SimResult<RunReport> {
        limits.validate()?;
        self.state = ModelState::Running;
        log::info!(
            "run started at {} with {} pending event(s), limits {:?}",
            self.now,
            self.queue.len(),
            limits
        );

        let mut processed = 0u64;
        let outcome = loop {
            let Some(next) = self.queue.peek_min_time() else {
                break Ok(StopReason::Exhausted);
            };
            if limits.max_time.is_some_and(|max| next > max) {
                break Ok(StopReason::TimeLimit);
            }
            if limits.max_events.is_some_and(|max| processed >= max) {
                break Ok(StopReason::EventLimit);
            }
            let Ok(event) = self.queue.pop_min() else {
                break Ok(StopReason::Exhausted);
            };
            processed += 1;
            if let Err(err) = self.dispatch(&event) {
                break Err(err);
            }
        };

        self.settle();
        match outcome {
            Ok(stop) => {
                log::info!(
                    "run stopped ({:?}) at {} after {} event(s)",
                    stop,
                    self.now,
                    processed
                );
                Ok(RunReport {
                    processed,
                    stop,
                    now: self.now,
                })
            }
            Err(err) => {
                log::warn!("run aborted at {} after {} event(s): {}", self.now, processed, err);
                Err(err)
            }
        }
    }

    fn settle(&mut self) {
        self.state = if self.queue.is_empty() {
            ModelState::Exhausted
        } else {
            ModelState::Idle
        };
    }

    fn dispatch(&mut self, event: &Event) -> SimResult<()> {
        // Virtual time must never go backward.
        debug_assert!(
            event.time >= self.now,
            "time went backward: now={}, event={}",
            self.now,
            event.time
        );
        self.now = event.time;
        self.events_processed += 1;

        let (kind, mut entity) = self.registry.checkout(event.target)?;
        log::trace!("dispatch {} to '{}'", event, kind.type_name());
        if let Some(trace) = self.trace.as_mut() {
            trace.record(DispatchRecord::new(event, kind.type_name()));
        }

        let mut ctx = Context::new(self.now, event.target, &mut self.queue, &mut self.registry);
        let result = kind.dispatch(&mut *entity, &mut ctx, &event.name, &event.payload);
        self.registry.restore(event.target, entity);
        result
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("now", &self.now)
            .field("pending", &self.queue.len())
            .field("events_processed", &self.events_processed)
            .field("state", &self.state)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests;
