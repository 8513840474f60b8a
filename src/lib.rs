//! # Tempus — Discrete-Event Simulation Kernel
//!
//! Advances a virtual clock strictly through the timestamps of pending
//! events, dispatching each to a handler that the target entity's type
//! bound to the event's name. No async, no threads, no wall-clock time.
//! The kernel knows nothing about any domain: only entities, events and
//! time.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │          Model             │ ← clock + run loop
//! │  ┌──────────────────────┐ │
//! │  │      EventQueue       │ │ ← min-heap on (time, sequence)
//! │  └──────────────────────┘ │
//! │  ┌──────────────────────┐ │
//! │  │       Registry        │ │ ← entity arena + per-type handler tables
//! │  └──────────────────────┘ │
//! │  ┌──────────────────────┐ │
//! │  │       Context         │ │ ← handler's view during one dispatch
//! │  └──────────────────────┘ │
//! └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use tempus::{Context, Entity, EntityId, HandlerTable, Model, Payload, RunLimits, SimResult};
//!
//! struct Clock { ticks: u32 }
//!
//! impl Clock {
//!     fn tick(&mut self, ctx: &mut Context<'_>, _: &Payload) -> SimResult<()> {
//!         self.ticks += 1;
//!         ctx.schedule_self(1.0, "tick", Payload::Empty)?;
//!         Ok(())
//!     }
//! }
//!
//! impl Entity for Clock {
//!     const TYPE_NAME: &'static str = "clock";
//!     fn create(_: EntityId, _: &Payload) -> SimResult<Self> { Ok(Clock { ticks: 0 }) }
//!     fn bind(table: &mut HandlerTable<Self>) -> SimResult<()> {
//!         table.on("tick", Self::tick)?;
//!         Ok(())
//!     }
//! }
//!
//! let mut model = Model::new();
//! model.register_type::<Clock>()?;
//! let clock = model.add("clock", Payload::Empty)?;
//! model.send(clock, "tick", Payload::Empty)?;
//! model.run(RunLimits::until(4.0))?;
//! assert_eq!(model.entity::<Clock>(clock)?.ticks, 5);
//! # Ok::<(), tempus::SimError>(())
//! ```

pub mod entity;
pub mod error;
pub mod event;
pub mod model;
pub mod queue;
pub mod time;
pub mod trace;

// Re-exports for convenience.
pub use entity::{Entity, EntityId, Handler, HandlerTable, Payload, Registry};
pub use error::{SimError, SimResult};
pub use event::{Event, EventName, Sequence};
pub use model::{Context, Model, ModelState, RunLimits, RunReport, StopReason};
pub use queue::{EventQueue, QueueEmpty, SequenceInUse};
pub use time::VirtualTime;
pub use trace::{DispatchRecord, Trace};
