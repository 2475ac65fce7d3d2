//! World configuration.
//!
//! The defaults match the original tuning: a chunk bit of 14 (16384-slot
//! chunks) and a 1024-entry class index table. Both can be overridden
//! through the environment, mirroring how the host runtime passes system
//! properties down to the engine.

use std::env;

use crate::composition::COMPONENT_INDEX_CAPACITY;
use crate::error::Error;
use crate::id::{MAX_CHUNK_BIT, MIN_CHUNK_BIT};

/// Environment variable overriding [`Config::chunk_bit`].
pub const CHUNK_BIT_VAR: &str = "CORRAL_CHUNK_BIT";
/// Environment variable overriding [`Config::class_index_capacity`].
pub const CLASS_INDEX_CAPACITY_VAR: &str = "CORRAL_CLASS_INDEX_CAPACITY";

const DEFAULT_CHUNK_BIT: u32 = 14;

/// Tuning knobs for a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of object-id bits in a packed id. Clamped into
    /// `MIN_CHUNK_BIT..=MAX_CHUNK_BIT` when the world is created.
    pub chunk_bit: u32,
    /// Capacity of the dense class-to-ordinal projection tables.
    pub class_index_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_bit: DEFAULT_CHUNK_BIT,
            class_index_capacity: COMPONENT_INDEX_CAPACITY,
        }
    }
}

impl Config {
    /// Reads the configuration from the environment, falling back to the
    /// defaults for unset variables.
    ///
    /// A variable that is set but unparsable is an error; silently ignoring
    /// a typo would leave the caller with a differently-shaped id space.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(value) = read_var(CHUNK_BIT_VAR)? {
            config.chunk_bit = value;
        }
        if let Some(value) = read_var(CLASS_INDEX_CAPACITY_VAR)? {
            config.class_index_capacity = value;
        }
        Ok(config)
    }

    /// The chunk bit clamped into the supported range, warning when the
    /// configured value is out of bounds.
    pub(crate) fn clamped_chunk_bit(&self) -> u32 {
        let clamped = self.chunk_bit.clamp(MIN_CHUNK_BIT, MAX_CHUNK_BIT);
        if clamped != self.chunk_bit {
            log::warn!(
                "chunk bit {} out of range {MIN_CHUNK_BIT}..={MAX_CHUNK_BIT}, using {clamped}",
                self.chunk_bit,
            );
        }
        clamped
    }
}

fn read_var<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, Error> {
    match env::var(var) {
        Ok(value) => match value.parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::InvalidConfig { var, value }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.chunk_bit, 14);
        assert_eq!(config.class_index_capacity, 1024);
    }

    #[test]
    fn clamps_chunk_bit() {
        assert_eq!(Config { chunk_bit: 4, ..Config::default() }.clamped_chunk_bit(), 8);
        assert_eq!(Config { chunk_bit: 24, ..Config::default() }.clamped_chunk_bit(), 16);
        assert_eq!(Config { chunk_bit: 12, ..Config::default() }.clamped_chunk_bit(), 12);
    }
}
