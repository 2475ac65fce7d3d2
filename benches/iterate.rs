use corral::test_util::{Health, Position, Velocity};
use corral::{Component, Config, World};
use criterion::*;

fn iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    for log_entities in (8..=16).step_by(4) {
        let entities = 1u64 << log_entities;
        let world = World::create_with("bench", Config::default());
        for i in 0..entities as i32 {
            world.create_entity(vec![
                Component::new(Position(i, -i)),
                Component::new(Velocity(1, 1)),
                Component::new(Health(i)),
            ]);
        }

        group.throughput(Throughput::Elements(entities));
        group.bench_with_input(
            BenchmarkId::new("1 of 3 components", format!("{entities} entities")),
            &world,
            |b, world| {
                b.iter(|| {
                    world
                        .find_components::<Position>()
                        .iter()
                        .map(|result| result.comp.0 as i64)
                        .sum::<i64>()
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("3 of 3 components", format!("{entities} entities")),
            &world,
            |b, world| {
                b.iter(|| {
                    world
                        .find_components3::<Position, Velocity, Health>()
                        .iter()
                        .map(|result| (result.comp1.0 + result.comp3.0) as i64)
                        .sum::<i64>()
                });
            },
        );
    }
}

criterion_group!(benches, iterate);
criterion_main!(benches);
