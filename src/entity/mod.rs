//! Entities: the simulated actors events are dispatched to.
//!
//! An entity type declares, once, which event names it reacts to and
//! which handler runs for each. Instances live in the [`Registry`] arena
//! and are addressed by copyable [`EntityId`]s.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`EntityId`] newtype |
//! | [`payload`] | [`Payload`] |
//! | [`traits`] | [`Entity`] trait, [`HandlerTable`], [`Handler`] |
//! | [`registry`] | [`Registry`] arena and type table |

pub mod id;
pub mod payload;
pub mod registry;
pub mod traits;

pub use id::EntityId;
pub use payload::Payload;
pub use registry::Registry;
pub use traits::{Entity, Handler, HandlerTable};
