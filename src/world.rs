//! The world façade.
//!
//! A world owns the chunked pool, the class index and the composition
//! repository, and exposes the entity lifecycle: creation, deletion, shape
//! changes, state moves and typed queries. Compositions are interned by the
//! sorted class indices of their component types, which also fixes each
//! shape's canonical column order.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::class_index::ClassIndex;
use crate::composition::{index_key_of, ComponentType, Composition, State};
use crate::config::Config;
use crate::entity::{Component, Entity};
use crate::error::Error;
use crate::id::IdSchema;
use crate::pool::{AllEntities, ChunkedPool};
use crate::results::{Comp1, Comp2, Comp3, Comp4, Comp5, Comp6};

#[cfg(test)]
mod tests;

/// The implementation name matched by [`World::factory`].
pub const IMPLEMENTATION: &str = "corral";

/// Looks up engine constructors by implementation name.
///
/// Mirrors a service-provider lookup: the caller names the implementation it
/// wants and either gets a factory for it or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Factory {
    _priv: (),
}

impl Factory {
    /// Creates a world with the default name and environment configuration.
    pub fn create(&self) -> World { World::create() }

    /// Creates a named world with the environment configuration.
    pub fn create_named(&self, name: &str) -> World { World::create_named(name) }
}

/// The storage and identity core of one ECS runtime instance.
pub struct World {
    name:         String,
    config:       Config,
    schema:       IdSchema,
    class_index:  Arc<ClassIndex>,
    pool:         Arc<ChunkedPool>,
    compositions: RwLock<IndexMap<Box<[u32]>, Arc<Composition>>>,
}

impl World {
    /// Returns the factory whose implementation name matches `implementation`.
    pub fn factory(implementation: &str) -> Result<Factory, Error> {
        if IMPLEMENTATION.contains(implementation) {
            Ok(Factory { _priv: () })
        } else {
            Err(Error::UnknownImplementation(implementation.to_owned()))
        }
    }

    /// Creates a world with the default name and environment configuration.
    pub fn create() -> Self { Self::create_named(IMPLEMENTATION) }

    /// Creates a named world with the environment configuration, falling
    /// back to the defaults if an override fails to parse.
    pub fn create_named(name: &str) -> Self {
        let config = Config::from_env().unwrap_or_else(|err| {
            log::warn!("{err}, using default configuration");
            Config::default()
        });
        Self::create_with(name, config)
    }

    /// Creates a world from an explicit configuration.
    pub fn create_with(name: &str, config: Config) -> Self {
        let schema = IdSchema::new(config.clamped_chunk_bit());
        let world = Self {
            name: name.to_owned(),
            config,
            schema,
            class_index: Arc::new(ClassIndex::default()),
            pool: Arc::new(ChunkedPool::new(schema)),
            compositions: RwLock::new(IndexMap::new()),
        };
        log::debug!("creating {world:?}");
        world
    }

    /// The name this world was created with.
    pub fn name(&self) -> &str { &self.name }

    /// The id schema in effect for this world.
    pub fn schema(&self) -> IdSchema { self.schema }

    /// The class index interning this world's component and state types.
    pub fn class_index(&self) -> &Arc<ClassIndex> { &self.class_index }

    /// Total number of live entities.
    pub fn size(&self) -> usize { self.pool.size() }

    /// Iterates over every live entity, newest chunk first.
    pub fn entities(&self) -> AllEntities { self.pool.all_entities() }

    /// Creates an entity from its component payloads.
    ///
    /// The payloads may arrive in any order; the entity's composition is
    /// the interned shape of their types.
    ///
    /// # Panics
    /// Panics if two payloads have the same type.
    pub fn create_entity(&self, components: Vec<Component>) -> Arc<Entity> {
        let types = components.iter().map(|c| self.component_type_of(c)).collect();
        let composition = self.composition_of(types);
        composition.create_entity(components)
    }

    /// Creates an entity carrying the prefab's payloads plus `components`.
    ///
    /// # Panics
    /// Panics if the prefab was deleted or the combined tuple repeats a
    /// type.
    pub fn create_entity_as(
        &self,
        prefab: &Arc<Entity>,
        components: Vec<Component>,
    ) -> Arc<Entity> {
        let data = prefab.data().expect("prefab entity has been deleted");
        let mut combined = data.components.to_vec();
        combined.extend(components);
        self.create_entity(combined)
    }

    /// Deletes an entity. Returns `false` if it was already deleted.
    pub fn delete_entity(&self, entity: &Arc<Entity>) -> bool {
        match entity.data() {
            Some(data) => data.composition.delete_entity(entity),
            None => false,
        }
    }

    /// Migrates an entity into the shape extended by `added`.
    ///
    /// Surviving columns are copied through the index mapping, the added
    /// payloads land in their destination columns, the rebound data tuple is
    /// published, and only then is the old id freed.
    ///
    /// # Panics
    /// Panics if the entity was deleted or already carries one of the added
    /// types.
    pub fn add_components(&self, entity: &Arc<Entity>, added: Vec<Component>) {
        if added.is_empty() {
            return;
        }
        let data = entity.data().expect("cannot modify a deleted entity");
        let src = Arc::clone(&data.composition);
        let old_id = entity.id();

        let added_types: Vec<ComponentType> =
            added.iter().map(|c| self.component_type_of(c)).collect();
        let mut types = src.component_types().to_vec();
        types.extend(added_types.iter().copied());
        let dst = self.composition_of(types);

        let index_mapping = mapping_into(&dst, src.component_types());
        let added_mapping = mapping_into(&dst, &added_types);
        let components =
            assemble(dst.len(), &data.components, &index_mapping, &added, &added_mapping);
        dst.attach_entity(entity, &index_mapping, &added_mapping, &added, components);
        src.release_id(old_id);
    }

    /// Migrates an entity out of one component type, returning the removed
    /// payload, or `None` if the entity does not carry `T`.
    ///
    /// # Panics
    /// Panics if the entity was deleted.
    pub fn remove_component_type<T: Any + Send + Sync>(
        &self,
        entity: &Arc<Entity>,
    ) -> Option<Arc<T>> {
        let data = entity.data().expect("cannot modify a deleted entity");
        let src = Arc::clone(&data.composition);
        let class = self.class_index.index_of(TypeId::of::<T>());
        let position = src.position_of_class(class)?;
        let old_id = entity.id();

        let types = src
            .component_types()
            .iter()
            .copied()
            .enumerate()
            .filter(|&(i, _)| i != position)
            .map(|(_, ty)| ty)
            .collect();
        let dst = self.composition_of(types);

        let index_mapping = mapping_into(&dst, src.component_types());
        let components = assemble(dst.len(), &data.components, &index_mapping, &[], &[]);
        let removed = data.components[position].downcast::<T>();
        dst.reattach_entity(entity, &index_mapping, components);
        src.release_id(old_id);
        removed
    }

    /// Moves an entity to `state` (`None` detaches only). Returns `false`
    /// if the entity was already deleted.
    pub fn set_state<S: State>(&self, entity: &Arc<Entity>, state: Option<S>) -> bool {
        match entity.data() {
            Some(data) => {
                data.composition.set_entity_state(entity, state);
                true
            }
            None => false,
        }
    }

    fn component_type_of(&self, component: &Component) -> ComponentType {
        let type_id = component.type_id();
        let name = component.type_name();
        ComponentType {
            type_id,
            class_index: self.class_index.index_or_intern(type_id, name),
            name,
        }
    }

    /// Interns the composition for a set of component types. The canonical
    /// column order is the sorted class-index order fixed here.
    fn composition_of(&self, mut types: Vec<ComponentType>) -> Arc<Composition> {
        types.sort_by_key(|ty| ty.class_index);
        for pair in types.windows(2) {
            assert!(
                pair[0].class_index != pair[1].class_index,
                "duplicate component type {}",
                pair[1].name,
            );
        }
        let key: Box<[u32]> = types.iter().map(|ty| ty.class_index).collect();

        {
            let compositions = self.compositions.read();
            if let Some(composition) = compositions.get(&key) {
                return Arc::clone(composition);
            }
        }

        let mut compositions = self.compositions.write();
        if let Some(composition) = compositions.get(&key) {
            return Arc::clone(composition);
        }
        let tenant = ChunkedPool::new_tenant(&self.pool, types.len());
        let composition = Composition::new(
            tenant,
            Arc::clone(&self.class_index),
            self.config.class_index_capacity,
            types.into_boxed_slice(),
        );
        compositions.insert(key, Arc::clone(&composition));
        composition
    }

    /// Number of interned compositions.
    pub fn composition_count(&self) -> usize { self.compositions.read().len() }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("chunk_count", &self.schema.chunk_count())
            .field("chunk_capacity", &self.schema.chunk_capacity())
            .finish()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        log::debug!("closing {self:?}");
    }
}

fn mapping_into(dst: &Composition, types: &[ComponentType]) -> Vec<Option<usize>> {
    types.iter().map(|ty| dst.position_of_class(ty.class_index)).collect()
}

fn assemble(
    len: usize,
    existing: &[Component],
    index_mapping: &[Option<usize>],
    added: &[Component],
    added_mapping: &[Option<usize>],
) -> Box<[Component]> {
    let mut slots: Vec<Option<Component>> = vec![None; len];
    for (i, mapped) in index_mapping.iter().enumerate() {
        if let Some(col) = *mapped {
            slots[col] = Some(existing[i].clone());
        }
    }
    for (i, mapped) in added_mapping.iter().enumerate() {
        if let Some(col) = *mapped {
            slots[col] = Some(added[i].clone());
        }
    }
    slots
        .into_iter()
        .map(|slot| slot.expect("every destination column receives a payload"))
        .collect()
}

macro_rules! query_impls {
    ($(
        $(#[$doc:meta])*
        fn $find:ident -> $query:ident, $select:ident, $result:ident: ($($t:ident),+)
    )*) => {$(
        /// A typed query over every composition carrying the requested
        /// component types. The composition set is snapshotted when the
        /// query is built.
        pub struct $query<'w, $($t),+> {
            world:        &'w World,
            compositions: Vec<Arc<Composition>>,
            _ph:          PhantomData<fn() -> ($($t,)+)>,
        }

        impl<'w, $($t: Any + Send + Sync),+> $query<'w, $($t),+> {
            /// Narrows the query to compositions that also carry `U`.
            pub fn filter<U: Any>(mut self) -> Self {
                let class = self.world.class_index.index_of(TypeId::of::<U>());
                self.compositions
                    .retain(|composition| composition.position_of_class(class).is_some());
                self
            }

            /// Number of compositions this query spans.
            pub fn composition_count(&self) -> usize { self.compositions.len() }

            /// Iterates over every matching entity.
            pub fn iter(&self) -> impl Iterator<Item = $result<$($t),+>> + '_ {
                self.compositions.iter().flat_map(|composition| {
                    composition.$select::<_, $($t),+>(composition.entities())
                })
            }

            /// Iterates over the matching entities currently in `state`,
            /// walking each composition's chain from head to tail.
            pub fn with_state<S: State>(
                &self,
                state: S,
            ) -> impl Iterator<Item = $result<$($t),+>> + '_ {
                let key = index_key_of(state, &self.world.class_index);
                self.compositions.iter().flat_map(move |composition| {
                    composition.$select::<_, $($t),+>(composition.state_chain_for(key))
                })
            }
        }

        impl World {
            $(#[$doc])*
            pub fn $find<$($t: Any + Send + Sync),+>(&self) -> $query<'_, $($t),+> {
                let classes = [$(self.class_index.index_of(TypeId::of::<$t>())),+];
                let compositions = self
                    .compositions
                    .read()
                    .values()
                    .filter(|composition| {
                        classes
                            .iter()
                            .all(|&class| composition.position_of_class(class).is_some())
                    })
                    .cloned()
                    .collect();
                $query { world: self, compositions, _ph: PhantomData }
            }
        }
    )*};
}

query_impls! {
    /// Queries every entity carrying a `T1` component.
    fn find_components -> Components1, select1, Comp1: (T1)
    /// Queries every entity carrying `T1` and `T2` components.
    fn find_components2 -> Components2, select2, Comp2: (T1, T2)
    /// Queries every entity carrying `T1`, `T2` and `T3` components.
    fn find_components3 -> Components3, select3, Comp3: (T1, T2, T3)
    /// Queries every entity carrying four component types.
    fn find_components4 -> Components4, select4, Comp4: (T1, T2, T3, T4)
    /// Queries every entity carrying five component types.
    fn find_components5 -> Components5, select5, Comp5: (T1, T2, T3, T4, T5)
    /// Queries every entity carrying six component types.
    fn find_components6 -> Components6, select6, Comp6: (T1, T2, T3, T4, T5, T6)
}
