use glam::Vec3;
use verlet3d::*;

#[test]
fn bodies_fall_under_gravity() {
    let mut world = World::new();
    let ball = world.add_composite(Composite::sphere(0.5).with_position(Vec3::new(0.0, 10.0, 0.0)));

    world.step();

    let y = world.get(ball).expect("body should exist").global.body.position.y;
    assert!(y < 10.0, "body should start falling, y = {}", y);
}

#[test]
fn elastic_impact_swaps_equal_mass_velocities() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let bouncy = Material::new(0.0, 1.0);
    let a = world.add_composite(
        Composite::sphere(0.5)
            .with_position(Vec3::new(-1.0, 0.0, 0.0))
            .with_material(bouncy),
    );
    let b = world.add_composite(
        Composite::sphere(0.5)
            .with_position(Vec3::new(1.0, 0.0, 0.0))
            .with_material(bouncy),
    );
    world
        .get_mut(a)
        .unwrap()
        .global
        .body
        .set_velocity(Vec3::new(0.05, 0.0, 0.0));
    world
        .get_mut(b)
        .unwrap()
        .global
        .body
        .set_velocity(Vec3::new(-0.05, 0.0, 0.0));

    for _ in 0..4 {
        world.step();
    }

    let va = world.get(a).unwrap().global.body.velocity();
    let vb = world.get(b).unwrap().global.body.velocity();
    assert!(va.x < -0.045, "first sphere should rebound, vx = {}", va.x);
    assert!(vb.x > 0.045, "second sphere should rebound, vx = {}", vb.x);
    // Equal masses, so momentum stays zero.
    assert!((va.x + vb.x).abs() < 1e-3, "momentum drifted: {}", va.x + vb.x);
}

#[test]
fn inelastic_impact_stops_symmetric_pair() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let dead = Material::new(0.0, 0.0);
    let a = world.add_composite(
        Composite::sphere(0.5)
            .with_position(Vec3::new(-1.0, 0.0, 0.0))
            .with_material(dead),
    );
    let b = world.add_composite(
        Composite::sphere(0.5)
            .with_position(Vec3::new(1.0, 0.0, 0.0))
            .with_material(dead),
    );
    world
        .get_mut(a)
        .unwrap()
        .global
        .body
        .set_velocity(Vec3::new(0.05, 0.0, 0.0));
    world
        .get_mut(b)
        .unwrap()
        .global
        .body
        .set_velocity(Vec3::new(-0.05, 0.0, 0.0));

    for _ in 0..4 {
        world.step();
    }

    let va = world.get(a).unwrap().global.body.velocity();
    let vb = world.get(b).unwrap().global.body.velocity();
    assert!(va.length() < 5e-3, "first sphere should stop, v = {:?}", va);
    assert!(vb.length() < 5e-3, "second sphere should stop, v = {:?}", vb);
}

#[test]
fn static_bodies_never_move() {
    let mut world = World::new();
    let floor = world.add_composite(
        Composite::cuboid(20.0, 1.0, 20.0)
            .with_position(Vec3::new(0.0, -0.5, 0.0))
            .with_flag(flags::STATIC),
    );
    let ball =
        world.add_composite(Composite::sphere(0.5).with_position(Vec3::new(0.0, 3.0, 0.0)));

    for _ in 0..20 {
        world.step();
        let body = &world.get(floor).unwrap().global.body;
        assert_eq!(body.position, Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(body.velocity(), Vec3::ZERO);
    }
    // The ball actually landed on it.
    assert!(world.get(ball).unwrap().global.body.position.y < 3.0);
}

#[test]
fn sphere_rests_on_cuboid_with_bounded_penetration() {
    let mut world = World::new();
    world.add_composite(
        Composite::cuboid(20.0, 1.0, 20.0)
            .with_position(Vec3::new(0.0, -0.5, 0.0))
            .with_flag(flags::STATIC),
    );
    let ball =
        world.add_composite(Composite::sphere(0.5).with_position(Vec3::new(0.0, 2.0, 0.0)));

    for _ in 0..30 {
        world.step();
    }

    // Resting height is the slab top plus the radius.
    let y = world.get(ball).unwrap().global.body.position.y;
    assert!(
        (y - 0.5).abs() < 0.2,
        "ball should rest on the slab, y = {}",
        y
    );

    // And it stays put afterwards.
    for _ in 0..10 {
        world.step();
    }
    let settled = world.get(ball).unwrap().global.body.position.y;
    assert!(
        (settled - y).abs() < 0.05,
        "ball drifted after settling: {} -> {}",
        y,
        settled
    );
}

#[test]
fn infinite_mass_composite_is_immovable() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let anchor = world.add_composite(
        Composite::sphere(1.0)
            .with_position(Vec3::new(0.0, 0.0, 0.0))
            .with_mass(f32::INFINITY),
    );
    let bullet =
        world.add_composite(Composite::sphere(0.5).with_position(Vec3::new(-3.0, 0.0, 0.0)));
    world
        .get_mut(bullet)
        .unwrap()
        .global
        .body
        .set_velocity(Vec3::new(0.1, 0.0, 0.0));

    for _ in 0..6 {
        world.step();
    }

    let body = &world.get(anchor).unwrap().global.body;
    assert_eq!(body.position, Vec3::ZERO, "anchor moved");
    assert_eq!(body.velocity(), Vec3::ZERO, "anchor picked up velocity");
    // The bullet bounced or stopped, but did not pass through.
    assert!(world.get(bullet).unwrap().global.body.position.x < 1.5);
}
