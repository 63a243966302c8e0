use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ironhaven::core::rng::DeterministicRng;
use ironhaven::game::ai::{BehaviorDispatcher, OpenField};
use ironhaven::game::config::AiTuning;
use ironhaven::game::{Actor, ContentTables, EntityRegistry, EventBus, SharedRegistry};
use ironhaven::Vec2;

fn populated(count: u32) -> SharedRegistry {
    let content = ContentTables::bundled().expect("bundled content");
    let mut registry = EntityRegistry::new();
    registry.add(Actor::hero(Vec2::new(0.0, 0.0), 1000.0));

    let mut rng = DeterministicRng::new(7);
    for _ in 0..count {
        let position = rng.point_near(Vec2::new(0.0, 0.0), 3000.0);
        registry.add(content.build_enemy("raptor", position).expect("raptor template"));
    }
    registry.rebuild_spatial();
    registry.shared()
}

fn bench_dispatch_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_pass");
    let tuning = AiTuning::default();
    let bus = EventBus::new();

    for count in [100u32, 1_000, 5_000] {
        let registry = populated(count);
        let dispatcher = BehaviorDispatcher::new();
        let mut rng = DeterministicRng::new(42);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                black_box(dispatcher.run_pass(&registry, &bus, &tuning, &mut rng, &OpenField, 50.0))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dispatch_pass);
criterion_main!(benches);
