//! Packed 32-bit entity ids.
//!
//! An id is laid out as `|DETACHED(1)|CHUNK_ID(31-b)|OBJECT_ID(b)|` where `b`
//! is the chunk bit. The detached flag marks handles that no longer refer to
//! a live slot; live ids always have it clear, which is why [`DETACHED_BIT`]
//! doubles as the "empty" sentinel of the id recycler.

/// Number of id bits below the detached flag.
pub const TOTAL_BIT: u32 = 31;
/// Smallest supported chunk bit.
pub const MIN_CHUNK_BIT: u32 = 8;
/// Largest supported chunk bit.
pub const MAX_CHUNK_BIT: u32 = 16;
/// Bit position of the detached flag.
pub const DETACHED_BIT_IDX: u32 = 31;
/// The detached flag. Never set on a live id.
pub const DETACHED_BIT: u32 = 1 << DETACHED_BIT_IDX;

/// Returns whether the detached flag is set on `id`.
pub fn is_detached(id: u32) -> bool { id & DETACHED_BIT != 0 }

/// Returns `id` with the detached flag set.
pub fn detach(id: u32) -> u32 { id | DETACHED_BIT }

/// Derives the masks and counts for one choice of chunk bit.
///
/// All operations are pure bit manipulation; the schema never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSchema {
    chunk_bit:      u32,
    chunk_count:    u32,
    chunk_id_mask:  u32,
    chunk_capacity: u32,
    object_id_mask: u32,
}

impl IdSchema {
    /// Creates a schema from the chunk bit.
    ///
    /// # Panics
    /// Panics if `chunk_bit` is outside `MIN_CHUNK_BIT..=MAX_CHUNK_BIT`.
    pub fn new(chunk_bit: u32) -> Self {
        assert!(
            (MIN_CHUNK_BIT..=MAX_CHUNK_BIT).contains(&chunk_bit),
            "chunk bit {chunk_bit} out of range {MIN_CHUNK_BIT}..={MAX_CHUNK_BIT}",
        );
        Self {
            chunk_bit,
            chunk_count: 1 << (TOTAL_BIT - chunk_bit),
            chunk_id_mask: (1 << (TOTAL_BIT - chunk_bit)) - 1,
            chunk_capacity: 1 << chunk_bit.min(MAX_CHUNK_BIT),
            object_id_mask: (1 << chunk_bit) - 1,
        }
    }

    /// Number of addressable chunks.
    pub fn chunk_count(&self) -> u32 { self.chunk_count }

    /// Number of slots per chunk.
    pub fn chunk_capacity(&self) -> u32 { self.chunk_capacity }

    /// Packs a chunk id and an object id into one id.
    pub fn create_id(&self, chunk_id: u32, object_id: u32) -> u32 {
        (chunk_id & self.chunk_id_mask) << self.chunk_bit | (object_id & self.object_id_mask)
    }

    /// Extracts the chunk id.
    pub fn chunk_id(&self, id: u32) -> u32 { (id >> self.chunk_bit) & self.chunk_id_mask }

    /// Extracts the object id.
    pub fn object_id(&self, id: u32) -> u32 { id & self.object_id_mask }

    /// Formats an id as `|detached:chunkId:objectId|` for log lines.
    pub fn id_to_string(&self, id: u32) -> String {
        format!(
            "|{}:{}:{}|",
            (id & DETACHED_BIT) >> DETACHED_BIT_IDX,
            self.chunk_id(id),
            self.object_id(id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_round_trip() {
        let schema = IdSchema::new(8);
        assert_eq!(schema.create_id(3, 17), 785);
        assert_eq!(schema.chunk_id(785), 3);
        assert_eq!(schema.object_id(785), 17);
        assert!(!is_detached(785));
    }

    #[test]
    fn round_trip_at_boundaries() {
        for chunk_bit in [MIN_CHUNK_BIT, 12, MAX_CHUNK_BIT] {
            let schema = IdSchema::new(chunk_bit);
            for chunk_id in [0, 1, schema.chunk_count() - 1] {
                for object_id in [0, 1, schema.chunk_capacity() - 1] {
                    let id = schema.create_id(chunk_id, object_id);
                    assert_eq!(schema.chunk_id(id), chunk_id, "chunk bit {chunk_bit}");
                    assert_eq!(schema.object_id(id), object_id, "chunk bit {chunk_bit}");
                    assert!(!is_detached(id));
                }
            }
        }
    }

    #[test]
    fn counts_derive_from_chunk_bit() {
        let schema = IdSchema::new(8);
        assert_eq!(schema.chunk_count(), 1 << 23);
        assert_eq!(schema.chunk_capacity(), 256);

        let schema = IdSchema::new(16);
        assert_eq!(schema.chunk_count(), 1 << 15);
        assert_eq!(schema.chunk_capacity(), 1 << 16);
    }

    #[test]
    fn detached_flag() {
        let schema = IdSchema::new(8);
        let id = schema.create_id(5, 42);
        let detached = detach(id);
        assert!(is_detached(detached));
        assert_eq!(schema.chunk_id(detached), 5);
        assert_eq!(schema.object_id(detached), 42);
    }

    #[test]
    #[should_panic = "chunk bit 7 out of range"]
    fn rejects_small_chunk_bit() { IdSchema::new(7); }

    #[test]
    fn formats_ids() {
        let schema = IdSchema::new(8);
        assert_eq!(schema.id_to_string(schema.create_id(3, 17)), "|0:3:17|");
        assert_eq!(schema.id_to_string(detach(schema.create_id(3, 17))), "|1:3:17|");
    }
}
