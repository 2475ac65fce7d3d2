//! Query result tuples.
//!
//! Each tuple carries the typed component payload(s) of one entity plus the
//! entity itself, in the arity the query asked for.

use std::sync::Arc;

use crate::entity::Entity;

/// A one-component result.
#[derive(Debug, Clone)]
pub struct Comp1<T> {
    /// The component payload.
    pub comp:   Arc<T>,
    /// The entity carrying it.
    pub entity: Arc<Entity>,
}

/// A two-component result.
#[derive(Debug, Clone)]
pub struct Comp2<T1, T2> {
    /// The first component payload.
    pub comp1:  Arc<T1>,
    /// The second component payload.
    pub comp2:  Arc<T2>,
    /// The entity carrying them.
    pub entity: Arc<Entity>,
}

/// A three-component result.
#[derive(Debug, Clone)]
pub struct Comp3<T1, T2, T3> {
    /// The first component payload.
    pub comp1:  Arc<T1>,
    /// The second component payload.
    pub comp2:  Arc<T2>,
    /// The third component payload.
    pub comp3:  Arc<T3>,
    /// The entity carrying them.
    pub entity: Arc<Entity>,
}

/// A four-component result.
#[derive(Debug, Clone)]
pub struct Comp4<T1, T2, T3, T4> {
    /// The first component payload.
    pub comp1:  Arc<T1>,
    /// The second component payload.
    pub comp2:  Arc<T2>,
    /// The third component payload.
    pub comp3:  Arc<T3>,
    /// The fourth component payload.
    pub comp4:  Arc<T4>,
    /// The entity carrying them.
    pub entity: Arc<Entity>,
}

/// A five-component result.
#[derive(Debug, Clone)]
pub struct Comp5<T1, T2, T3, T4, T5> {
    /// The first component payload.
    pub comp1:  Arc<T1>,
    /// The second component payload.
    pub comp2:  Arc<T2>,
    /// The third component payload.
    pub comp3:  Arc<T3>,
    /// The fourth component payload.
    pub comp4:  Arc<T4>,
    /// The fifth component payload.
    pub comp5:  Arc<T5>,
    /// The entity carrying them.
    pub entity: Arc<Entity>,
}

/// A six-component result.
#[derive(Debug, Clone)]
pub struct Comp6<T1, T2, T3, T4, T5, T6> {
    /// The first component payload.
    pub comp1:  Arc<T1>,
    /// The second component payload.
    pub comp2:  Arc<T2>,
    /// The third component payload.
    pub comp3:  Arc<T3>,
    /// The fourth component payload.
    pub comp4:  Arc<T4>,
    /// The fifth component payload.
    pub comp5:  Arc<T5>,
    /// The sixth component payload.
    pub comp6:  Arc<T6>,
    /// The entity carrying them.
    pub entity: Arc<Entity>,
}
