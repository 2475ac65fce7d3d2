use corral::test_util::{Flag, Health, Label, Position, Stamina, Velocity};
use corral::{Component, Config, World};
use criterion::*;

fn create_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("create entity");

    macro_rules! create_entity_batch {
        ($num_comps:literal; $($comps:expr),* $(,)?) => {
            for log_entities in (0..=12).step_by(4) {
                let entities = 1u64 << log_entities;
                group.throughput(Throughput::Elements(entities));
                group.bench_with_input(
                    BenchmarkId::new(
                        format!("{} components", $num_comps),
                        format!("{entities} entities"),
                    ),
                    &entities,
                    |b, &entities| {
                        b.iter_batched(
                            || World::create_with("bench", Config::default()),
                            |world| {
                                for _ in 0..entities {
                                    world.create_entity(vec![$(Component::new($comps)),*]);
                                }
                            },
                            BatchSize::SmallInput,
                        );
                    },
                );
            }
        }
    }

    create_entity_batch!(1; Position(1, 1));
    create_entity_batch!(2; Position(1, 1), Velocity(2, 2));
    create_entity_batch!(4; Position(1, 1), Velocity(2, 2), Health(3), Stamina(4));
    create_entity_batch!(6;
        Position(1, 1),
        Velocity(2, 2),
        Health(3),
        Stamina(4),
        Label("bench"),
        Flag(true),
    );
}

criterion_group!(benches, create_entity);
criterion_main!(benches);
