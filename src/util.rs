use std::cell::UnsafeCell;

/// A shared slot whose value is published through external synchronization.
///
/// Chunk slot arrays are written by at most one thread per slot (the thread
/// that currently holds the slot's object id) and the write becomes visible
/// to readers through a subsequent atomic read of the owning chunk's `index`
/// or through the state lock. The cell itself performs no synchronization.
pub(crate) struct SyncSlot<T> {
    cell: UnsafeCell<T>,
}

// Sound under the publication protocol described above.
unsafe impl<T: Send + Sync> Sync for SyncSlot<T> {}

impl<T> SyncSlot<T> {
    pub(crate) fn new(value: T) -> Self { Self { cell: UnsafeCell::new(value) } }

    /// Reads the slot.
    ///
    /// # Safety
    /// No write to the same slot may be concurrent with this read.
    pub(crate) unsafe fn get(&self) -> &T { &*self.cell.get() }

    /// Overwrites the slot.
    ///
    /// # Safety
    /// The caller must have exclusive write access to the slot, i.e. the
    /// slot's object id is currently allocated to the calling thread.
    pub(crate) unsafe fn set(&self, value: T) { *self.cell.get() = value; }
}
