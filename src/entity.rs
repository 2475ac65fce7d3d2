//! Entity records.
//!
//! An entity is a 32-bit handle plus a back-pointer to its data tuple: the
//! composition it currently belongs to, its component payloads in the
//! composition's canonical order, and the key of the state chain it roots,
//! if any. The tuple is swapped wholesale behind a lock so that a migration
//! publishes either the old or the new view, never a torn one.
//!
//! Entities also carry two intrusive pointers linking them into a state
//! chain. Both directions are weak: the owning reference to an entity lives
//! in its tenant's chunk slot, and the head of each chain is additionally
//! retained by the composition's state index.

use std::any::{self, Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::class_index::IndexKey;
use crate::composition::Composition;
use crate::id;

/// A type-erased, reference-counted component payload.
#[derive(Clone)]
pub struct Component {
    payload: Arc<dyn Any + Send + Sync>,
    name:    &'static str,
}

impl Component {
    /// Wraps a value into a component payload.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self { payload: Arc::new(value), name: any::type_name::<T>() }
    }

    /// The [`TypeId`] of the wrapped value.
    pub fn type_id(&self) -> TypeId { self.payload.as_ref().type_id() }

    /// The type name of the wrapped value.
    pub fn type_name(&self) -> &'static str { self.name }

    /// Returns whether the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool { self.payload.is::<T>() }

    /// Downcasts the payload to a concrete component type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::downcast(Arc::clone(&self.payload)).ok()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component<{}>", self.name)
    }
}

/// Wraps a value into a [`Component`] payload.
pub fn component<T: Any + Send + Sync>(value: T) -> Component { Component::new(value) }

/// The data tuple published by an entity.
pub struct EntityData {
    /// The composition the entity currently belongs to.
    pub composition: Arc<Composition>,
    /// Component payloads in the composition's canonical order.
    pub components:  Box<[Component]>,
    /// The key of the state chain this entity is the head of, if any.
    pub state_root:  Option<IndexKey>,
}

/// A pooled entity.
pub struct Entity {
    id:   AtomicU32,
    data: RwLock<Option<Arc<EntityData>>>,
    prev: Mutex<Option<Weak<Entity>>>,
    next: Mutex<Option<Weak<Entity>>>,
}

impl Entity {
    pub(crate) fn new(data: Arc<EntityData>) -> Self {
        Self {
            id:   AtomicU32::new(id::DETACHED_BIT),
            data: RwLock::new(Some(data)),
            prev: Mutex::new(None),
            next: Mutex::new(None),
        }
    }

    /// The current packed id of this entity.
    ///
    /// The id changes when the entity migrates between compositions and has
    /// the detached flag set once the entity is deleted.
    pub fn id(&self) -> u32 { self.id.load(Ordering::SeqCst) }

    pub(crate) fn set_id(&self, id: u32) { self.id.store(id, Ordering::SeqCst); }

    pub(crate) fn flag_detached(&self) {
        self.id.fetch_or(id::DETACHED_BIT, Ordering::SeqCst);
    }

    /// Returns whether this entity has been deleted.
    pub fn is_detached(&self) -> bool { id::is_detached(self.id()) }

    /// The currently published data tuple, or `None` once deleted.
    pub fn data(&self) -> Option<Arc<EntityData>> { self.data.read().clone() }

    pub(crate) fn set_data(&self, data: Option<Arc<EntityData>>) { *self.data.write() = data; }

    /// Republishes the data tuple with a different state root.
    pub(crate) fn replace_state_root(&self, state_root: Option<IndexKey>) {
        let mut guard = self.data.write();
        if let Some(data) = guard.as_ref() {
            *guard = Some(Arc::new(EntityData {
                composition: Arc::clone(&data.composition),
                components: data.components.clone(),
                state_root,
            }));
        }
    }

    /// Looks up a component payload by type.
    pub fn component_of<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let data = self.data()?;
        let position = data.composition.position_of_type(TypeId::of::<T>())?;
        data.components[position].downcast()
    }

    pub(crate) fn prev(&self) -> Option<Arc<Entity>> {
        self.prev.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn next(&self) -> Option<Arc<Entity>> {
        self.next.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_prev(&self, prev: Option<&Arc<Entity>>) {
        *self.prev.lock() = prev.map(Arc::downgrade);
    }

    pub(crate) fn set_next(&self, next: Option<&Arc<Entity>>) {
        *self.next.lock() = next.map(Arc::downgrade);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id();
        let mut debug = f.debug_struct("Entity");
        debug.field("id", &format_args!("{:#010x}", id));
        debug.field("detached", &id::is_detached(id));
        if let Some(data) = self.data() {
            debug.field("composition", &data.composition.debug_types());
        }
        debug.finish()
    }
}
