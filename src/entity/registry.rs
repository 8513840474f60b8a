//! `Registry` — owns every entity instance and every entity type.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::event::EventName;
use crate::model::Context;

use super::id::EntityId;
use super::payload::Payload;
use super::traits::{Entity, HandlerTable};

// ── Type-erased entity kind ──────────────────────────────────────────

/// Everything the registry needs to know about one entity type, with
/// the concrete type erased.
pub(crate) trait EntityKind {
    fn type_name(&self) -> &'static str;

    fn create(&self, id: EntityId, args: &Payload) -> SimResult<Box<dyn Any>>;

    fn dispatch(
        &self,
        entity: &mut dyn Any,
        ctx: &mut Context<'_>,
        name: &EventName,
        payload: &Payload,
    ) -> SimResult<()>;
}

struct Kind<E> {
    table: HandlerTable<E>,
}

impl<E: Entity> EntityKind for Kind<E> {
    fn type_name(&self) -> &'static str {
        E::TYPE_NAME
    }

    fn create(&self, id: EntityId, args: &Payload) -> SimResult<Box<dyn Any>> {
        Ok(Box::new(E::create(id, args)?))
    }

    fn dispatch(
        &self,
        entity: &mut dyn Any,
        ctx: &mut Context<'_>,
        name: &EventName,
        payload: &Payload,
    ) -> SimResult<()> {
        let entity = entity
            .downcast_mut::<E>()
            .ok_or(SimError::EntityTypeMismatch {
                entity: ctx.me(),
                expected: E::TYPE_NAME,
            })?;
        self.table.dispatch(entity, ctx, name, payload)
    }
}

struct TypeEntry {
    type_id: TypeId,
    kind: Rc<dyn EntityKind>,
}

struct Slot {
    kind: Rc<dyn EntityKind>,
    /// `None` while the entity is checked out for dispatch.
    entity: Option<Box<dyn Any>>,
}

// ── Registry ──────────────────────────────────────────────────────────

/// Arena of entities indexed by [`EntityId`], plus the table of
/// registered entity types.
///
/// IDs are arena indices handed out in creation order and never reused;
/// there is no removal operation.
#[derive(Default)]
pub struct Registry {
    types: BTreeMap<&'static str, TypeEntry>,
    slots: Vec<Slot>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, building its handler table once.
    ///
    /// Registering the same type again is a no-op. Another Rust type
    /// claiming an already-used `TYPE_NAME` fails with `DuplicateType`.
    pub fn register_type<E: Entity>(&mut self) -> SimResult<()> {
        if let Some(entry) = self.types.get(E::TYPE_NAME) {
            if entry.type_id == TypeId::of::<E>() {
                return Ok(());
            }
            return Err(SimError::DuplicateType(E::TYPE_NAME.to_string()));
        }
        let table = HandlerTable::<E>::build()?;
        log::debug!(
            "registered entity type '{}' with {} handler(s)",
            E::TYPE_NAME,
            table.len()
        );
        self.types.insert(
            E::TYPE_NAME,
            TypeEntry {
                type_id: TypeId::of::<E>(),
                kind: Rc::new(Kind { table }),
            },
        );
        Ok(())
    }

    /// Returns `true` if a type is registered under `type_name`.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.types.keys().copied().collect()
    }

    /// Instantiate an entity of the type registered under `type_name`.
    pub fn add(&mut self, type_name: &str, args: &Payload) -> SimResult<EntityId> {
        let kind = self
            .types
            .get(type_name)
            .map(|entry| Rc::clone(&entry.kind))
            .ok_or_else(|| SimError::TypeNotFound(type_name.to_string()))?;
        let id = self.next_id();
        let entity = kind.create(id, args)?;
        Ok(self.store(kind, entity))
    }

    /// Typed form of [`Registry::add`].
    pub fn spawn<E: Entity>(&mut self, args: &Payload) -> SimResult<EntityId> {
        self.insert_with::<E>(|id| E::create(id, args))
    }

    /// Store an instance built by the caller. The closure receives the
    /// ID the entity will be stored under.
    pub fn insert<E: Entity>(&mut self, build: impl FnOnce(EntityId) -> E) -> SimResult<EntityId> {
        self.insert_with::<E>(|id| Ok(build(id)))
    }

    fn insert_with<E: Entity>(
        &mut self,
        build: impl FnOnce(EntityId) -> SimResult<E>,
    ) -> SimResult<EntityId> {
        let kind = self.kind_of::<E>()?;
        let entity = build(self.next_id())?;
        Ok(self.store(kind, Box::new(entity)))
    }

    fn kind_of<E: Entity>(&self) -> SimResult<Rc<dyn EntityKind>> {
        match self.types.get(E::TYPE_NAME) {
            Some(entry) if entry.type_id == TypeId::of::<E>() => Ok(Rc::clone(&entry.kind)),
            _ => Err(SimError::TypeNotFound(E::TYPE_NAME.to_string())),
        }
    }

    fn next_id(&self) -> EntityId {
        EntityId::new(self.slots.len() as u64)
    }

    fn store(&mut self, kind: Rc<dyn EntityKind>, entity: Box<dyn Any>) -> EntityId {
        let id = self.next_id();
        log::debug!("added {} of type '{}'", id, kind.type_name());
        self.slots.push(Slot {
            kind,
            entity: Some(entity),
        });
        id
    }

    fn slot(&self, id: EntityId) -> SimResult<&Slot> {
        id.index()
            .and_then(|index| self.slots.get(index))
            .ok_or(SimError::UnknownEntity(id))
    }

    fn slot_mut(&mut self, id: EntityId) -> SimResult<&mut Slot> {
        id.index()
            .and_then(|index| self.slots.get_mut(index))
            .ok_or(SimError::UnknownEntity(id))
    }

    /// Type name of the entity behind `id`.
    pub fn resolve(&self, id: EntityId) -> SimResult<&'static str> {
        self.slot(id).map(|slot| slot.kind.type_name())
    }

    /// Returns `true` if `id` was issued by this registry.
    pub fn contains(&self, id: EntityId) -> bool {
        self.slot(id).is_ok()
    }

    /// Number of entities ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All issued IDs in creation order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.slots.len() as u64).map(EntityId::new)
    }

    /// Downcast an entity reference for inspection.
    pub fn get<E: Entity>(&self, id: EntityId) -> SimResult<&E> {
        self.occupied(id)?
            .downcast_ref::<E>()
            .ok_or(SimError::EntityTypeMismatch {
                entity: id,
                expected: E::TYPE_NAME,
            })
    }

    /// Downcast a mutable entity reference.
    pub fn get_mut<E: Entity>(&mut self, id: EntityId) -> SimResult<&mut E> {
        self.slot_mut(id)?
            .entity
            .as_mut()
            .ok_or(SimError::EntityBusy(id))?
            .downcast_mut::<E>()
            .ok_or(SimError::EntityTypeMismatch {
                entity: id,
                expected: E::TYPE_NAME,
            })
    }

    fn occupied(&self, id: EntityId) -> SimResult<&dyn Any> {
        self.slot(id)?
            .entity
            .as_deref()
            .ok_or(SimError::EntityBusy(id))
    }

    /// Take an entity out of its slot for the duration of one dispatch.
    pub(crate) fn checkout(
        &mut self,
        id: EntityId,
    ) -> SimResult<(Rc<dyn EntityKind>, Box<dyn Any>)> {
        let slot = self.slot_mut(id)?;
        let entity = slot.entity.take().ok_or(SimError::EntityBusy(id))?;
        Ok((Rc::clone(&slot.kind), entity))
    }

    /// Put a checked-out entity back.
    pub(crate) fn restore(&mut self, id: EntityId, entity: Box<dyn Any>) {
        if let Ok(slot) = self.slot_mut(id) {
            slot.entity = Some(entity);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.type_names())
            .field("entities", &self.slots.len())
            .finish()
    }
}
