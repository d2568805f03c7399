use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use verlet3d::*;

fn prepare_world(body_count: usize) -> World {
    let mut world = World::new();
    world.add_composite(
        Composite::cuboid(200.0, 1.0, 200.0)
            .with_position(Vec3::new(0.0, -0.5, 0.0))
            .with_flag(flags::STATIC),
    );
    let side = (body_count as f32).cbrt().ceil() as usize;
    let mut placed = 0;
    'outer: for layer in 0..side {
        for row in 0..side {
            for col in 0..side {
                if placed == body_count {
                    break 'outer;
                }
                world.add_composite(Composite::sphere(0.4).with_position(Vec3::new(
                    col as f32 - side as f32 * 0.5,
                    1.0 + layer as f32,
                    row as f32 - side as f32 * 0.5,
                )));
                placed += 1;
            }
        }
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &count in &[64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("spheres", count), &count, |b, &count| {
            let mut world = prepare_world(count);
            b.iter(|| {
                world.step();
                black_box(world.step_count());
            })
        });
    }
    group.finish();
}

fn bench_broadphase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadphase");
    let world = prepare_world(1024);
    for (name, mut phase) in [
        (
            "spatial_hash",
            Box::new(SpatialHash::default()) as Box<dyn Broadphase>,
        ),
        ("sweep_and_prune", Box::new(SweepAndPrune::new())),
    ] {
        for (id, node) in world.composites.iter_with_ids() {
            phase.update(id, &node.global.expanded_hitbox);
        }
        group.bench_function(name, |b| {
            let probe = Aabb::new(Vec3::splat(-3.0), Vec3::splat(3.0));
            b.iter(|| {
                let mut hits = 0u32;
                phase.query(black_box(&probe), &mut |_| hits += 1);
                black_box(hits);
            })
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let world = prepare_world(256);
    c.bench_function("snapshot_round_trip", |b| {
        b.iter(|| {
            let snapshot = world.to_snapshot();
            black_box(World::from_snapshot(snapshot).unwrap());
        })
    });
}

criterion_group!(benches, bench_world_step, bench_broadphase, bench_snapshot);
criterion_main!(benches);
