use glam::Vec3;
use verlet3d::*;

fn pair(world: &mut World, separation: f32) -> (EntityId, EntityId) {
    let a = world.add_composite(Composite::sphere(0.2));
    let b = world.add_composite(
        Composite::sphere(0.2).with_position(Vec3::new(separation, 0.0, 0.0)),
    );
    (a, b)
}

fn distance(world: &World, a: EntityId, b: EntityId) -> f32 {
    world
        .get(a)
        .unwrap()
        .global
        .body
        .position
        .distance(world.get(b).unwrap().global.body.position)
}

#[test]
fn rod_pulls_bodies_to_its_length() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let (a, b) = pair(&mut world, 3.0);
    world
        .add_constraint(ConstraintKind::Distance(DistanceConstraint::rod(a, b, 2.0)))
        .unwrap();

    for _ in 0..5 {
        world.step();
    }
    let d = distance(&world, a, b);
    assert!((d - 2.0).abs() < 1e-2, "rod length off: {}", d);

    // It stays on the rod afterwards.
    for _ in 0..10 {
        world.step();
        let d = distance(&world, a, b);
        assert!((d - 2.0).abs() < 1e-2, "rod drifted to {}", d);
    }
}

#[test]
fn rod_pushes_bodies_apart_when_too_close() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let (a, b) = pair(&mut world, 1.0);
    world
        .add_constraint(ConstraintKind::Distance(DistanceConstraint::rod(a, b, 2.0)))
        .unwrap();

    for _ in 0..5 {
        world.step();
    }
    let d = distance(&world, a, b);
    assert!((d - 2.0).abs() < 1e-2, "rod length off: {}", d);
}

#[test]
fn slack_band_leaves_bodies_alone() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let (a, b) = pair(&mut world, 3.0);
    world
        .add_constraint(ConstraintKind::Distance(DistanceConstraint::new(
            a, b, 1.0, 5.0,
        )))
        .unwrap();

    for _ in 0..5 {
        world.step();
    }
    assert_eq!(
        world.get(a).unwrap().global.body.position,
        Vec3::ZERO,
        "body inside the dead band moved"
    );
    assert!((distance(&world, a, b) - 3.0).abs() < 1e-6);
}

#[test]
fn anchored_rod_moves_only_the_free_body() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let anchor = world.add_composite(Composite::sphere(0.2).with_flag(flags::STATIC));
    let free = world.add_composite(
        Composite::sphere(0.2).with_position(Vec3::new(3.0, 0.0, 0.0)),
    );
    world
        .add_constraint(ConstraintKind::Distance(DistanceConstraint::rod(
            anchor, free, 2.0,
        )))
        .unwrap();

    for _ in 0..5 {
        world.step();
    }
    assert_eq!(world.get(anchor).unwrap().global.body.position, Vec3::ZERO);
    let d = distance(&world, anchor, free);
    assert!((d - 2.0).abs() < 1e-2, "rod length off: {}", d);
}
