//! Drops a stack of spheres onto a terrain and prints where they end up.
//!
//! Run with `cargo run --example basic_simulation`.

use verlet3d::*;

fn main() {
    let mut world = World::new();
    world.add_composite(
        Composite::new(ShapeGeometry::Terrain(Terrain::flat(32, 32, 1.0, 0.0)))
            .with_name("ground")
            .with_flag(flags::STATIC),
    );

    let mut balls = Vec::new();
    for i in 0..10 {
        let id = world.add_composite(
            Composite::sphere(0.4)
                .with_name(&format!("ball-{i}"))
                .with_position(Vec3::new((i as f32 * 0.11).sin() * 2.0, 2.0 + i as f32, 0.0)),
        );
        balls.push(id);
    }

    // Print the first touchdown of each ball.
    for &id in &balls {
        let mut landed = false;
        world.on(
            id,
            EventKind::Collision,
            Box::new(move |composites, event| {
                if landed {
                    return;
                }
                if let Event::Collision(contact) = event {
                    let name = composites
                        .get(contact.body1)
                        .map(|n| n.name.clone())
                        .unwrap_or_default();
                    println!("{name} touched down at {:?}", contact.point);
                    landed = true;
                }
            }),
        );
    }

    for _ in 0..120 {
        world.step();
    }

    for &id in &balls {
        let node = world.get(id).expect("ball still in the world");
        println!(
            "{:<8} position {:>7.3?} sleeping: {}",
            node.name, node.global.body.position, node.sleeping
        );
    }
}
