//! Storage and identity core for an entity–component–system runtime.
//!
//! corral allocates, indexes and iterates over large populations of entities
//! whose identities are dense 32-bit handles and whose component payloads
//! are laid out column-wise for cache-friendly scans.
//!
//! # Layout
//! Three layers stack on top of each other:
//!
//! - A multi-tenant [`pool`]: ids are recycled through per-tenant LIFO
//!   stacks, fresh ids come from a pre-stamped cursor, and entities of one
//!   shape live contiguously in fixed-capacity linked chunks.
//! - A [`composition`] layer mapping each distinct component shape to one
//!   tenant, projecting component types to column ordinals through a dense
//!   class-index table, and remapping columns when an entity's shape
//!   changes.
//! - An entity state layer linking equal-state entities into doubly-linked
//!   chains rooted in a per-composition concurrent index, so that all
//!   entities currently in an enumerated state can be walked head to tail.
//!
//! The [`world`] façade ties the layers together: it interns compositions,
//! drives migrations and answers typed queries of one to six component
//! types.
//!
//! # Concurrency
//! All operations take `&self` and may run from parallel threads. Handing
//! out a recycled id is lock-free apart from one stack access; fresh ids
//! serialize on a tenant-local cursor lock. Entity data tuples are swapped
//! wholesale, so readers observe the pre- or post-migration view, never a
//! torn one; iterators detect entities that migrated mid-scan and skip
//! them.

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(doc, warn(missing_docs))]

pub mod class_index;
pub use class_index::{ClassIndex, IndexKey};

pub mod composition;
pub use composition::{Composition, State};

pub mod config;
pub use config::Config;

pub mod entity;
pub use entity::{component, Component, Entity};

mod error;
pub use error::Error;

pub mod id;
pub use id::IdSchema;

pub mod pool;
pub use pool::{ChunkedPool, IdStack, LinkedChunk, Tenant};

pub mod results;

mod util;

pub mod world;
pub use world::{Factory, World};

#[cfg(any(test, feature = "internal-bench"))]
pub mod test_util;
