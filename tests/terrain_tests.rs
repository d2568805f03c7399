use glam::Vec3;
use verlet3d::*;

fn flat_ground(world: &mut World, height: f32) -> EntityId {
    let field = Terrain::flat(16, 16, 1.0, height);
    world.add_composite(
        Composite::new(ShapeGeometry::Terrain(field)).with_flag(flags::STATIC),
    )
}

#[test]
fn sphere_settles_on_flat_terrain() {
    let mut world = World::new();
    flat_ground(&mut world, 0.0);
    let ball =
        world.add_composite(Composite::sphere(0.5).with_position(Vec3::new(0.3, 2.0, 0.3)));

    for _ in 0..40 {
        world.step();
    }

    let y = world.get(ball).unwrap().global.body.position.y;
    assert!(
        (y - 0.5).abs() < 0.2,
        "ball should rest at surface height plus radius, y = {}",
        y
    );
}

#[test]
fn sphere_rolls_off_nothing_outside_the_grid() {
    let mut world = World::new();
    flat_ground(&mut world, 0.0);
    // Far outside the 16x16 cell footprint.
    let ball =
        world.add_composite(Composite::sphere(0.5).with_position(Vec3::new(40.0, 2.0, 0.0)));

    for _ in 0..10 {
        world.step();
    }
    let y = world.get(ball).unwrap().global.body.position.y;
    assert!(y < -5.0, "off-grid ball should keep falling, y = {}", y);
}

#[test]
fn point_probe_reports_height_above_terrain() {
    let mut world = World::new();
    let ground = flat_ground(&mut world, 2.0);
    let marker = world.add_composite(
        Composite::new(ShapeGeometry::Point)
            .with_position(Vec3::new(1.2, 5.0, -0.7))
            .with_mass(f32::INFINITY),
    );
    world.step();

    let contact =
        CollisionDetector::terrain_point_probe(&world.composites, ground, marker)
            .expect("probe should hit the grid");
    // Depth is surface minus point along the up normal: three units below.
    assert!(
        (contact.penetration.y + 3.0).abs() < 1e-3,
        "unexpected probe depth {:?}",
        contact.penetration
    );
}

#[test]
fn point_shapes_collide_with_terrain_when_below() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    flat_ground(&mut world, 0.0);
    let marker = world.add_composite(
        Composite::new(ShapeGeometry::Point).with_position(Vec3::new(0.5, -0.05, 0.5)),
    );

    world.step();
    assert!(
        !world.get(marker).unwrap().touching.is_empty(),
        "buried point should register terrain contact"
    );
}
