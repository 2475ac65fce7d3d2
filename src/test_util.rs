#![allow(missing_docs)]

use parking_lot::Once;

use crate::composition::State;

pub fn init() {
    static SET_LOGGER_ONCE: Once = Once::new();
    SET_LOGGER_ONCE.call_once(env_logger::init);
}

// Shared component types. Plain values; everything interesting happens in
// the storage underneath them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position(pub i32, pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Velocity(pub i32, pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamina(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(pub &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag(pub bool);

/// A test state with three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Paused,
}

impl State for Phase {
    fn ordinal(&self) -> u32 { *self as u32 }
}

/// A second state type, to check that chains key on the state's class too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Calm,
    Angry,
}

impl State for Mood {
    fn ordinal(&self) -> u32 { *self as u32 }
}
