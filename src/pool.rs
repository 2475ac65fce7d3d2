//! The multi-tenant chunked pool.
//!
//! The pool hands out 32-bit ids and stores entity slots in fixed-capacity
//! chunks. Each tenant owns a linked list of chunks for entities of one
//! shape and recycles the ids it freed; the pool itself owns every chunk so
//! that a live id always resolves in O(1), and chunks are never deallocated
//! before the pool goes away.
//!
//! Allocation is pop-first: a recycled id bypasses the tenant's cursor lock
//! entirely, so the common path after a delete-heavy phase costs one atomic
//! stack access. Fresh ids come from a pre-stamped `next_id` cursor guarded
//! by a tenant-local mutex that also covers chunk rollover.

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};

use crate::entity::{Component, Entity};
use crate::id::{self, IdSchema, DETACHED_BIT};
use crate::util::SyncSlot;

mod stack;
pub use stack::IdStack;


/// Owns every chunk across all tenants, indexed densely by chunk id.
pub struct ChunkedPool {
    schema:     IdSchema,
    chunks:     RwLock<Vec<Arc<LinkedChunk>>>,
    tenant_seq: AtomicU32,
}

impl ChunkedPool {
    /// Creates an empty pool for the given id schema.
    pub fn new(schema: IdSchema) -> Self {
        let pool =
            Self { schema, chunks: RwLock::new(Vec::new()), tenant_seq: AtomicU32::new(0) };
        log::debug!("creating {pool:?}");
        pool
    }

    /// The id schema shared by every tenant of this pool.
    pub fn schema(&self) -> IdSchema { self.schema }

    /// Creates a tenant owning its own chunk list and id recycler.
    pub fn new_tenant(pool: &Arc<Self>, data_len: usize) -> Tenant {
        Tenant::new(Arc::clone(pool), data_len)
    }

    fn new_chunk(
        &self,
        data_len: usize,
        stack: &Arc<IdStack>,
        previous: Option<Arc<LinkedChunk>>,
    ) -> Arc<LinkedChunk> {
        let mut chunks = self.chunks.write();
        let chunk_id = chunks.len() as u32;
        assert!(
            chunk_id < self.schema.chunk_count(),
            "entity capacity exhausted: all {} chunks of {} slots are in use",
            self.schema.chunk_count(),
            self.schema.chunk_capacity(),
        );
        let chunk = Arc::new(LinkedChunk::new(
            chunk_id,
            self.schema,
            data_len,
            Arc::clone(stack),
            previous.clone(),
        ));
        if let Some(previous) = previous {
            previous.set_next(&chunk);
        }
        chunks.push(Arc::clone(&chunk));
        log::debug!("creating {chunk:?}");
        chunk
    }

    /// Resolves the chunk a packed id points into.
    pub fn chunk_of(&self, id: u32) -> Arc<LinkedChunk> {
        let chunk_id = self.schema.chunk_id(id) as usize;
        let chunks = self.chunks.read();
        Arc::clone(chunks.get(chunk_id).expect("id does not name an allocated chunk"))
    }

    /// Resolves the entity a packed id points at, if the slot is occupied.
    pub fn entity_of(&self, id: u32) -> Option<Arc<Entity>> { self.chunk_of(id).get(id) }

    /// Total number of live slots across every chunk.
    pub fn size(&self) -> usize {
        self.chunks.read().iter().map(|chunk| chunk.size()).sum()
    }

    /// Iterates over every live entity, newest chunk first.
    pub fn all_entities(&self) -> AllEntities {
        let chunks = self.chunks.read().clone();
        let cursor = chunks.last().map_or(-1, |chunk| chunk.scan_top());
        AllEntities { chunks, cursor }
    }

    fn next_tenant_id(&self) -> u32 { self.tenant_seq.fetch_add(1, Ordering::SeqCst) }
}

impl fmt::Debug for ChunkedPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedPool")
            .field("chunk_count", &self.schema.chunk_count())
            .field("chunk_capacity", &self.schema.chunk_capacity())
            .finish()
    }
}

impl Drop for ChunkedPool {
    fn drop(&mut self) {
        log::debug!("closing {self:?} with {} chunks", self.chunks.get_mut().len());
    }
}

struct Cursor {
    current: Arc<LinkedChunk>,
    next_id: u32,
}

/// The private chunk list and id recycler for one composition.
pub struct Tenant {
    id:       u32,
    data_len: usize,
    pool:     Arc<ChunkedPool>,
    stack:    Arc<IdStack>,
    first:    Arc<LinkedChunk>,
    cursor:   Mutex<Cursor>,
}

impl Tenant {
    fn new(pool: Arc<ChunkedPool>, data_len: usize) -> Self {
        let schema = pool.schema();
        let stack = Arc::new(IdStack::new((schema.chunk_capacity() as usize) << 3));
        let first = pool.new_chunk(data_len, &stack, None);
        // Stamp the first fresh id so that allocation always returns a
        // pre-acquired slot and advances the cursor behind it.
        let next_id = schema.create_id(first.id(), first.acquire_slot());
        let tenant = Self {
            id: pool.next_tenant_id(),
            data_len,
            pool,
            stack,
            first: Arc::clone(&first),
            cursor: Mutex::new(Cursor { current: first, next_id }),
        };
        log::debug!("creating {tenant:?}");
        tenant
    }

    /// Number of component columns in this tenant's chunks.
    pub fn data_len(&self) -> usize { self.data_len }

    /// The pool this tenant allocates from.
    pub fn pool(&self) -> &Arc<ChunkedPool> { &self.pool }

    /// Hands out an id, preferring recycled ones.
    ///
    /// A recycled id re-enters through the chunk it was freed from, so the
    /// balancing decrement lands on the correct `rm` counter even across
    /// chunk boundaries.
    pub fn allocate_id(&self) -> u32 {
        let popped = self.stack.pop();
        if popped != DETACHED_BIT {
            log::trace!(
                "tenant {} reusing {}",
                self.id,
                self.pool.schema().id_to_string(popped),
            );
            self.pool.chunk_of(popped).decrement_rm();
            return popped;
        }

        let mut cursor = self.cursor.lock();
        let id = cursor.next_id;
        if !cursor.current.has_capacity() {
            let chunk =
                self.pool.new_chunk(self.data_len, &self.stack, Some(Arc::clone(&cursor.current)));
            cursor.current = chunk;
        }
        cursor.next_id =
            self.pool.schema().create_id(cursor.current.id(), cursor.current.acquire_slot());
        id
    }

    /// Allocates an id for `entity` and stores it with its component
    /// payloads in the target chunk.
    pub fn register(&self, entity: &Arc<Entity>) -> u32 {
        let id = self.allocate_id();
        entity.set_id(id);
        let data = entity.data().expect("cannot register an entity without data");
        self.pool.chunk_of(id).store(entity, &data.components);
        id
    }

    /// Releases a live id back to this tenant's recycler.
    pub fn free_id(&self, id: u32) { self.pool.chunk_of(id).free(id); }

    /// Moves an entity into this tenant's chunks.
    ///
    /// `new_id` must have been allocated from this tenant. `index_mapping`
    /// gives the destination column for each source column, `None` for
    /// dropped ones; `added_mapping` positions each payload of `added` in
    /// the destination shape.
    pub fn migrate(
        &self,
        entity: &Arc<Entity>,
        old_id: u32,
        new_id: u32,
        index_mapping: &[Option<usize>],
        added_mapping: &[Option<usize>],
        added: &[Component],
    ) {
        let prev_chunk = self.pool.chunk_of(old_id);
        let new_chunk = self.pool.chunk_of(new_id);
        new_chunk.copy_from(entity, &prev_chunk, old_id, new_id, index_mapping);
        if !added.is_empty() {
            new_chunk.add(new_id, added_mapping, added);
        }
    }

    /// Live slots in this tenant, summed by walking `previous` links from
    /// the current chunk back to the first.
    pub fn size(&self) -> usize {
        let mut chunk = Some(Arc::clone(&self.cursor.lock().current));
        let mut sum = 0;
        while let Some(current) = chunk {
            sum += current.size();
            chunk = current.previous().cloned();
        }
        sum
    }

    /// Live slots in the chunk currently accepting fresh allocations.
    pub fn current_chunk_size(&self) -> usize { self.cursor.lock().current.size() }

    /// Iterates over this tenant's live entities in the canonical scan
    /// order: chunks first to last, slots high to low.
    pub fn entities(&self) -> Entities {
        Entities { scan: Scan::over(Arc::clone(&self.first)) }
    }

    /// Iterates over this tenant's slots with their column storage.
    pub fn data_iter(&self) -> DataIter {
        DataIter { scan: Scan::over(Arc::clone(&self.first)), resolve: Resolve::ScanChunk }
    }

    /// Like [`data_iter`](Self::data_iter), but resolves each item's columns
    /// through the chunk its id currently points into, which may differ from
    /// the scanned chunk after a migration.
    pub fn tracking_data_iter(&self) -> DataIter {
        DataIter {
            scan:    Scan::over(Arc::clone(&self.first)),
            resolve: Resolve::ItemChunk(Arc::clone(&self.pool)),
        }
    }
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("data_len", &self.data_len)
            .field("recycled", &self.stack.len())
            .finish()
    }
}

impl Drop for Tenant {
    fn drop(&mut self) {
        log::debug!("closing {self:?}");
    }
}

enum Columns {
    None,
    Single(Box<[SyncSlot<Option<Component>>]>),
    Multi(Box<[Box<[SyncSlot<Option<Component>>]>]>),
}

fn column(capacity: usize) -> Box<[SyncSlot<Option<Component>>]> {
    (0..capacity).map(|_| SyncSlot::new(None)).collect()
}

/// A fixed-capacity slab of entity slots plus their component columns.
///
/// A chunk with a single component type keeps one flat column; larger
/// shapes use one column per component type (struct of arrays) so that a
/// scan over one type stays contiguous.
pub struct LinkedChunk {
    id:       u32,
    schema:   IdSchema,
    data_len: usize,
    items:    Box<[SyncSlot<Option<Arc<Entity>>>]>,
    columns:  Columns,
    index:    AtomicI32,
    rm:       AtomicI32,
    stack:    Arc<IdStack>,
    previous: Option<Arc<LinkedChunk>>,
    next:     OnceLock<Arc<LinkedChunk>>,
}

impl LinkedChunk {
    fn new(
        id: u32,
        schema: IdSchema,
        data_len: usize,
        stack: Arc<IdStack>,
        previous: Option<Arc<LinkedChunk>>,
    ) -> Self {
        let capacity = schema.chunk_capacity() as usize;
        let columns = match data_len {
            0 => Columns::None,
            1 => Columns::Single(column(capacity)),
            _ => Columns::Multi((0..data_len).map(|_| column(capacity)).collect()),
        };
        Self {
            id,
            schema,
            data_len,
            items: (0..capacity).map(|_| SyncSlot::new(None)).collect(),
            columns,
            index: AtomicI32::new(-1),
            rm: AtomicI32::new(0),
            stack,
            previous,
            next: OnceLock::new(),
        }
    }

    /// The chunk id, i.e. this chunk's position in the pool.
    pub fn id(&self) -> u32 { self.id }

    /// Number of component columns.
    pub fn data_len(&self) -> usize { self.data_len }

    /// Acquires the next free object id.
    pub(crate) fn acquire_slot(&self) -> u32 {
        (self.index.fetch_add(1, Ordering::SeqCst) + 1) as u32
    }

    /// Returns whether another slot can still be acquired.
    pub fn has_capacity(&self) -> bool {
        self.index.load(Ordering::SeqCst) < self.schema.chunk_capacity() as i32 - 1
    }

    /// Loads the entity a packed id points at within this chunk.
    pub fn get(&self, id: u32) -> Option<Arc<Entity>> {
        self.item(self.schema.object_id(id))
    }

    pub(crate) fn item(&self, object_id: u32) -> Option<Arc<Entity>> {
        // SAFETY: slot contents are published by the allocation protocol;
        // see `SyncSlot`.
        unsafe { self.items[object_id as usize].get() }.clone()
    }

    /// Stores an entity and its column values at its object id.
    pub(crate) fn store(&self, entity: &Arc<Entity>, components: &[Component]) {
        let object_id = self.schema.object_id(entity.id()) as usize;
        // SAFETY: `object_id` was acquired by the caller and is not yet
        // visible to any other writer.
        unsafe {
            match &self.columns {
                Columns::None => {}
                Columns::Single(column) => column[object_id].set(Some(components[0].clone())),
                Columns::Multi(columns) => {
                    for (column, component) in columns.iter().zip(components) {
                        column[object_id].set(Some(component.clone()));
                    }
                }
            }
            self.items[object_id].set(Some(Arc::clone(entity)));
        }
    }

    /// Clears the slot of a packed id and hands the id to the recycler.
    pub(crate) fn free(&self, id: u32) {
        let object_id = self.schema.object_id(id) as usize;
        // SAFETY: the caller owns the live id, so no other thread writes
        // this slot concurrently. Column values are left in place; they are
        // overwritten when the id is reused.
        unsafe { self.items[object_id].set(None) };
        self.rm.fetch_add(1, Ordering::SeqCst);
        self.stack.push(id);
    }

    /// Balances [`free`](Self::free) when a recycled id is handed out again.
    pub(crate) fn decrement_rm(&self) { self.rm.fetch_sub(1, Ordering::SeqCst); }

    /// Copies the surviving column values of `entity` from `src` into this
    /// chunk at `new_id`, then rebinds the entity to `new_id`.
    ///
    /// `index_mapping[i]` names the destination column of source column `i`,
    /// or `None` when that column is dropped by the migration.
    pub(crate) fn copy_from(
        &self,
        entity: &Arc<Entity>,
        src: &LinkedChunk,
        old_id: u32,
        new_id: u32,
        index_mapping: &[Option<usize>],
    ) {
        let src_idx = self.schema.object_id(old_id) as usize;
        let dst_idx = self.schema.object_id(new_id) as usize;
        // SAFETY: the destination slot was freshly allocated by the caller
        // and the source slot still belongs to the migrating entity.
        unsafe {
            if !index_mapping.is_empty() {
                match (&self.columns, &src.columns) {
                    (Columns::Single(dst), Columns::Single(from)) => {
                        dst[dst_idx].set(from[src_idx].get().clone());
                    }
                    (Columns::Single(dst), Columns::Multi(from)) => {
                        let i = index_mapping
                            .iter()
                            .position(|mapped| *mapped == Some(0))
                            .expect("single destination column must have a surviving source");
                        dst[dst_idx].set(from[i][src_idx].get().clone());
                    }
                    (Columns::Multi(dst), Columns::Single(from)) => {
                        if let Some(&Some(col)) = index_mapping.first() {
                            dst[col][dst_idx].set(from[src_idx].get().clone());
                        }
                    }
                    (Columns::Multi(dst), Columns::Multi(from)) => {
                        for (i, mapped) in index_mapping.iter().enumerate() {
                            if let Some(col) = *mapped {
                                dst[col][dst_idx].set(from[i][src_idx].get().clone());
                            }
                        }
                    }
                    // A shape without columns has nothing to copy either way.
                    (Columns::None, _) | (_, Columns::None) => {}
                }
            }
            entity.set_id(new_id);
            self.items[dst_idx].set(Some(Arc::clone(entity)));
        }
    }

    /// Writes freshly attached component payloads into their destination
    /// columns at `id`'s slot.
    pub(crate) fn add(&self, id: u32, added_mapping: &[Option<usize>], added: &[Component]) {
        let object_id = self.schema.object_id(id) as usize;
        // SAFETY: the slot at `id` belongs to the migrating entity.
        unsafe {
            match &self.columns {
                Columns::None => {}
                Columns::Single(column) => {
                    for (i, mapped) in added_mapping.iter().enumerate() {
                        if *mapped == Some(0) {
                            column[object_id].set(Some(added[i].clone()));
                        }
                    }
                }
                Columns::Multi(columns) => {
                    for (i, mapped) in added_mapping.iter().enumerate() {
                        if let Some(col) = *mapped {
                            columns[col][object_id].set(Some(added[i].clone()));
                        }
                    }
                }
            }
        }
    }

    /// Reads one column value of a packed id.
    pub fn component(&self, col: usize, id: u32) -> Option<Component> {
        self.component_at(col, self.schema.object_id(id))
    }

    pub(crate) fn component_at(&self, col: usize, object_id: u32) -> Option<Component> {
        let object_id = object_id as usize;
        // SAFETY: published by the allocation protocol; see `SyncSlot`.
        unsafe {
            match &self.columns {
                Columns::None => None,
                Columns::Single(column) => column[object_id].get().clone(),
                Columns::Multi(columns) => columns.get(col)?[object_id].get().clone(),
            }
        }
    }

    /// Reads every column value of a packed id in column order.
    pub fn data(&self, id: u32) -> Vec<Option<Component>> {
        (0..self.data_len).map(|col| self.component(col, id)).collect()
    }

    /// Number of live slots.
    pub fn size(&self) -> usize {
        let offset = i32::from(self.next.get().is_some());
        (self.index.load(Ordering::SeqCst) + offset - self.rm.load(Ordering::SeqCst)).max(0)
            as usize
    }

    /// Returns whether no slot is live.
    pub fn is_empty(&self) -> bool { self.size() == 0 }

    /// The highest slot a scan must probe: the allocation high-water mark.
    /// Scanning down from here cannot miss a live slot, no matter where
    /// frees landed; the pre-acquired slot at `index` simply reads empty.
    pub(crate) fn scan_top(&self) -> i32 { self.index.load(Ordering::SeqCst) }

    /// The chunk allocated before this one in the same tenant.
    pub fn previous(&self) -> Option<&Arc<LinkedChunk>> { self.previous.as_ref() }

    /// The chunk allocated after this one in the same tenant.
    pub fn next(&self) -> Option<&Arc<LinkedChunk>> { self.next.get() }

    fn set_next(&self, next: &Arc<LinkedChunk>) {
        self.next.set(Arc::clone(next)).unwrap_or_else(|_| panic!("chunk already linked"));
    }
}

impl fmt::Debug for LinkedChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedChunk")
            .field("id", &self.id)
            .field("data_len", &self.data_len)
            .field("capacity", &self.schema.chunk_capacity())
            .field("size", &self.size())
            .field("previous", &self.previous.as_ref().map(|chunk| chunk.id))
            .field("next", &self.next.get().map(|chunk| chunk.id))
            .finish()
    }
}

/// The canonical forward scan: chunks first to last, slots high to low,
/// skipping empty slots and empty chunks.
struct Scan {
    chunk:  Option<Arc<LinkedChunk>>,
    cursor: i32,
}

impl Scan {
    fn over(first: Arc<LinkedChunk>) -> Self {
        let cursor = first.scan_top();
        Self { chunk: Some(first), cursor }
    }

    fn next_slot(&mut self) -> Option<(Arc<LinkedChunk>, u32, Arc<Entity>)> {
        loop {
            let chunk = self.chunk.clone()?;
            while self.cursor >= 0 {
                let object_id = self.cursor as u32;
                self.cursor -= 1;
                if let Some(entity) = chunk.item(object_id) {
                    return Some((chunk, object_id, entity));
                }
            }
            match chunk.next() {
                Some(next) => {
                    self.cursor = next.scan_top();
                    self.chunk = Some(Arc::clone(next));
                }
                None => {
                    self.chunk = None;
                    return None;
                }
            }
        }
    }
}

/// Iterator over a tenant's live entities.
pub struct Entities {
    scan: Scan,
}

impl Iterator for Entities {
    type Item = Arc<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan.next_slot().map(|(_, _, entity)| entity)
    }
}

enum Resolve {
    /// Read columns from the chunk the scan is currently in.
    ScanChunk,
    /// Read columns from the chunk the item's current id points into.
    ItemChunk(Arc<ChunkedPool>),
}

/// One scanned slot together with the chunk its columns resolve through.
pub struct DataSlot {
    entity:    Arc<Entity>,
    chunk:     Arc<LinkedChunk>,
    object_id: u32,
}

impl DataSlot {
    /// The entity occupying the slot.
    pub fn entity(&self) -> &Arc<Entity> { &self.entity }

    /// Reads one column value for this slot.
    pub fn component(&self, col: usize) -> Option<Component> {
        self.chunk.component_at(col, self.object_id)
    }
}

/// Iterator over a tenant's slots with access to their column storage.
pub struct DataIter {
    scan:    Scan,
    resolve: Resolve,
}

impl Iterator for DataIter {
    type Item = DataSlot;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (chunk, object_id, entity) = self.scan.next_slot()?;
            match &self.resolve {
                Resolve::ScanChunk => return Some(DataSlot { entity, chunk, object_id }),
                Resolve::ItemChunk(pool) => {
                    let current_id = entity.id();
                    if id::is_detached(current_id) {
                        continue;
                    }
                    let item_chunk = pool.chunk_of(current_id);
                    let object_id = pool.schema().object_id(current_id);
                    return Some(DataSlot { entity, chunk: item_chunk, object_id });
                }
            }
        }
    }
}

/// Iterator over every live entity in a pool, newest chunk first.
pub struct AllEntities {
    chunks: Vec<Arc<LinkedChunk>>,
    cursor: i32,
}

impl Iterator for AllEntities {
    type Item = Arc<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let chunk = self.chunks.last()?;
            while self.cursor >= 0 {
                let object_id = self.cursor as u32;
                self.cursor -= 1;
                if let Some(entity) = chunk.item(object_id) {
                    return Some(entity);
                }
            }
            self.chunks.pop();
            self.cursor = self.chunks.last().map_or(-1, |chunk| chunk.scan_top());
        }
    }
}
