//! LIFO recycler of freed ids.

use parking_lot::Mutex;

use crate::id::DETACHED_BIT;

/// A growable stack of recycled 32-bit ids.
///
/// [`DETACHED_BIT`] signals an empty stack; it can never collide with a live
/// id because live ids have bit 31 clear. The interior mutex keeps the
/// common pop path down to one uncontended atomic acquisition.
pub struct IdStack {
    items: Mutex<Vec<u32>>,
}

impl IdStack {
    /// Creates a stack with the given initial capacity. Growth doubles.
    pub fn new(capacity: usize) -> Self {
        Self { items: Mutex::new(Vec::with_capacity(capacity)) }
    }

    /// Pushes a freed id.
    pub fn push(&self, id: u32) { self.items.lock().push(id); }

    /// Pops the most recently freed id, or [`DETACHED_BIT`] if none is left.
    pub fn pop(&self) -> u32 { self.items.lock().pop().unwrap_or(DETACHED_BIT) }

    /// Number of recycled ids currently held.
    pub fn len(&self) -> usize { self.items.lock().len() }

    /// Returns whether no recycled id is held.
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
