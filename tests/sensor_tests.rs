use std::cell::Cell;
use std::rc::Rc;

use glam::Vec3;
use verlet3d::*;

#[test]
fn sensor_reports_overlaps_without_pushing_back() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let zone = world.add_composite(
        Composite::sphere(1.0)
            .with_flag(flags::STATIC)
            .with_sensor(true),
    );
    let probe = world.add_composite(
        Composite::sphere(0.3).with_position(Vec3::new(-3.0, 0.0, 0.0)),
    );
    world
        .get_mut(probe)
        .unwrap()
        .global
        .body
        .set_velocity(Vec3::new(0.1, 0.0, 0.0));

    let overlaps = Rc::new(Cell::new(0u32));
    let seen = overlaps.clone();
    world.on(
        zone,
        EventKind::Collision,
        Box::new(move |_, event| {
            if let Event::Collision(contact) = event {
                assert!(contact.ignore, "sensor contact should be flagged");
                seen.set(seen.get() + 1);
            }
        }),
    );

    for _ in 0..8 {
        world.step();
    }

    assert!(overlaps.get() > 0, "sensor never fired");
    let body = &world.get(probe).unwrap().global.body;
    let vx = body.velocity().x;
    assert!(
        (vx - 0.1).abs() < 1e-5,
        "sensor deflected the probe, vx = {}",
        vx
    );
    assert!(
        body.position.x > 1.3,
        "probe should pass through, x = {}",
        body.position.x
    );
}

#[test]
fn touching_lists_include_sensor_overlaps() {
    let mut world = World::new();
    world.set_gravity(Vec3::ZERO);
    let zone = world.add_composite(
        Composite::sphere(1.0)
            .with_flag(flags::STATIC)
            .with_sensor(true),
    );
    let probe = world.add_composite(
        Composite::sphere(0.3).with_position(Vec3::new(-1.0, 0.0, 0.0)),
    );
    world
        .get_mut(probe)
        .unwrap()
        .global
        .body
        .set_velocity(Vec3::new(0.05, 0.0, 0.0));

    world.step();

    assert!(world.get(probe).unwrap().touching.contains(&zone));
    assert!(world.get(zone).unwrap().touching.contains(&probe));
}
