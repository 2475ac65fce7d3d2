use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::entity::Component;
use crate::error::Error;
use crate::test_util::{self, Health, Label, Phase, Position, Velocity};
use crate::world::World;

fn world() -> World {
    test_util::init();
    World::create_with("world-tests", Config { chunk_bit: 8, ..Config::default() })
}

#[test]
fn factory_lookup_matches_by_name() {
    test_util::init();
    let factory = World::factory("corral").expect("known implementation");
    let world = factory.create_named("factory-made");
    assert_eq!(world.name(), "factory-made");

    // Partial names match, the way a classpath substring lookup would.
    assert!(World::factory("corr").is_ok());

    assert_eq!(
        World::factory("someone-else"),
        Err(Error::UnknownImplementation("someone-else".to_owned())),
    );
}

#[test]
fn chunk_bit_is_clamped_into_range() {
    test_util::init();
    let world = World::create_with("tiny", Config { chunk_bit: 2, ..Config::default() });
    assert_eq!(world.schema().chunk_capacity(), 256);

    let world = World::create_with("huge", Config { chunk_bit: 30, ..Config::default() });
    assert_eq!(world.schema().chunk_capacity(), 1 << 16);
}

#[test]
fn entities_intern_one_composition_per_shape() {
    let world = world();
    let a = world.create_entity(vec![Component::new(Position(0, 0))]);
    let b = world.create_entity(vec![Component::new(Position(1, 1))]);
    let c = world.create_entity(vec![
        Component::new(Position(2, 2)),
        Component::new(Velocity(1, 0)),
    ]);

    assert!(Arc::ptr_eq(
        &a.data().expect("live").composition,
        &b.data().expect("live").composition,
    ));
    assert!(!Arc::ptr_eq(
        &a.data().expect("live").composition,
        &c.data().expect("live").composition,
    ));
    assert_eq!(world.composition_count(), 2);
    assert_eq!(world.size(), 3);
}

#[test]
fn create_entity_as_extends_the_prefab() {
    let world = world();
    let prefab = world.create_entity(vec![
        Component::new(Position(7, 7)),
        Component::new(Label("prefab")),
    ]);

    let entity = world.create_entity_as(&prefab, vec![Component::new(Health(50))]);
    assert_eq!(entity.component_of::<Position>().as_deref(), Some(&Position(7, 7)));
    assert_eq!(entity.component_of::<Label>().as_deref(), Some(&Label("prefab")));
    assert_eq!(entity.component_of::<Health>().as_deref(), Some(&Health(50)));
    assert_eq!(prefab.data().expect("live").composition.len(), 2);
    assert_eq!(entity.data().expect("live").composition.len(), 3);
}

#[test]
#[should_panic = "duplicate component type"]
fn duplicate_component_types_are_rejected() {
    let world = world();
    world.create_entity(vec![Component::new(Health(1)), Component::new(Health(2))]);
}

#[test]
fn delete_entity_is_idempotent() {
    let world = world();
    let entity = world.create_entity(vec![Component::new(Health(1))]);

    assert!(world.delete_entity(&entity));
    assert!(entity.is_detached());
    assert!(entity.data().is_none());
    assert!(!world.delete_entity(&entity), "second delete reports false");
    assert_eq!(world.size(), 0);
}

#[test]
fn queries_span_every_matching_composition() {
    let world = world();
    world.create_entity(vec![Component::new(Position(1, 0))]);
    world.create_entity(vec![Component::new(Position(2, 0)), Component::new(Velocity(0, 1))]);
    world.create_entity(vec![
        Component::new(Position(3, 0)),
        Component::new(Velocity(0, 2)),
        Component::new(Health(10)),
    ]);
    world.create_entity(vec![Component::new(Health(99))]);

    let query = world.find_components::<Position>();
    assert_eq!(query.composition_count(), 3);
    let xs: HashSet<i32> = query.iter().map(|result| result.comp.0).collect();
    assert_eq!(xs, HashSet::from([1, 2, 3]));

    let narrowed = world.find_components::<Position>().filter::<Velocity>();
    assert_eq!(narrowed.composition_count(), 2);
    let xs: HashSet<i32> = narrowed.iter().map(|result| result.comp.0).collect();
    assert_eq!(xs, HashSet::from([2, 3]));

    let pairs: Vec<_> = world
        .find_components2::<Position, Velocity>()
        .iter()
        .map(|result| (result.comp1.0, result.comp2.1))
        .collect();
    assert_eq!(pairs.len(), 2);

    let triples: Vec<_> = world.find_components3::<Position, Velocity, Health>().iter().collect();
    assert_eq!(triples.len(), 1);
    assert_eq!(triples[0].comp3.0, 10);
}

#[test]
fn queries_for_unknown_types_are_empty() {
    let world = world();
    world.create_entity(vec![Component::new(Position(0, 0))]);

    // Velocity was never interned; the query spans no composition.
    let query = world.find_components::<Velocity>();
    assert_eq!(query.composition_count(), 0);
    assert_eq!(query.iter().count(), 0);
}

#[test]
fn queries_observe_payloads_by_reference() {
    let world = world();
    world.create_entity(vec![Component::new(Health(3)), Component::new(Position(0, 0))]);

    let query = world.find_components2::<Health, Position>();
    let result = query.iter().next().expect("one match");
    assert_eq!(result.comp1.0, 3);
    assert!(Arc::ptr_eq(
        &result.entity.component_of::<Health>().expect("live"),
        &result.comp1,
    ));
}

#[test]
fn state_queries_walk_the_chain_head_to_tail() {
    let world = world();
    let entities: Vec<_> =
        (0..4).map(|i| world.create_entity(vec![Component::new(Health(i))])).collect();
    for entity in &entities[..3] {
        world.set_state(entity, Some(Phase::Running));
    }

    let query = world.find_components::<Health>();
    let running: Vec<i32> = query.with_state(Phase::Running).map(|result| result.comp.0).collect();
    assert_eq!(running, vec![2, 1, 0], "chain yields newest first");
    assert_eq!(query.with_state(Phase::Idle).count(), 0);
}

#[test]
fn state_queries_span_compositions() {
    let world = world();
    let solo = world.create_entity(vec![Component::new(Health(1))]);
    let pair = world.create_entity(vec![
        Component::new(Health(2)),
        Component::new(Position(0, 0)),
    ]);
    world.set_state(&solo, Some(Phase::Paused));
    world.set_state(&pair, Some(Phase::Paused));

    let paused: HashSet<i32> = world
        .find_components::<Health>()
        .with_state(Phase::Paused)
        .map(|result| result.comp.0)
        .collect();
    assert_eq!(paused, HashSet::from([1, 2]));
}

#[test]
fn world_entities_cover_every_tenant() {
    let world = world();
    world.create_entity(vec![Component::new(Position(0, 0))]);
    world.create_entity(vec![Component::new(Health(1))]);
    world.create_entity(vec![Component::new(Health(2)), Component::new(Position(1, 1))]);

    assert_eq!(world.entities().count(), 3);
    let live: Vec<_> = world.entities().filter(|entity| !entity.is_detached()).collect();
    assert_eq!(live.len(), 3);
}

#[test]
fn concurrent_create_delete_keeps_sizes_consistent() {
    let world = world();
    let created = Mutex::new(Vec::new());

    rayon::scope(|scope| {
        for worker in 0..8 {
            let world = &world;
            let created = &created;
            scope.spawn(move |_| {
                let mut local = Vec::new();
                for i in 0..200 {
                    let entity = world.create_entity(vec![
                        Component::new(Position(worker, i)),
                        Component::new(Health(i)),
                    ]);
                    if i % 2 == 0 {
                        world.delete_entity(&entity);
                    } else {
                        local.push(entity);
                    }
                }
                created.lock().extend(local);
            });
        }
    });

    let survivors = created.into_inner();
    assert_eq!(world.size(), survivors.len());
    assert_eq!(world.size(), 8 * 100);
    for entity in &survivors {
        let resolved = world
            .entities()
            .any(|candidate| Arc::ptr_eq(&candidate, entity));
        assert!(resolved, "every survivor is reachable through the pool scan");
    }
    assert_eq!(world.find_components::<Health>().iter().count(), 8 * 100);
}

#[test]
fn concurrent_state_moves_keep_chains_walkable() {
    let world = world();
    let entities: Vec<_> =
        (0..256).map(|i| world.create_entity(vec![Component::new(Health(i))])).collect();
    let composition = entities[0].data().expect("live").composition.clone();

    rayon::scope(|scope| {
        for chunk in entities.chunks(32) {
            let world = &world;
            scope.spawn(move |_| {
                for entity in chunk {
                    world.set_state(entity, Some(Phase::Running));
                }
            });
        }
    });

    let mut seen = HashSet::new();
    for entity in composition.state_chain(Phase::Running) {
        assert!(seen.insert(entity.id()), "each chain member is visited exactly once");
    }
    assert_eq!(seen.len(), 256, "every attached entity is reachable from the head");
}
