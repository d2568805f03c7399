//! Pair management and the shape-pair dispatch table.
//!
//! Handlers run with shapes ordered by ascending type id and produce
//! contacts whose normal points from the second shape toward the first.

use std::collections::HashSet;

use glam::{Quat, Vec3};

use crate::collision::broadphase::Broadphase;
use crate::collision::ccd::{refine_toi, swept_interval};
use crate::collision::contact::CollisionContact;
use crate::collision::narrowphase::{
    clamp_to_half_extents, probe_polyhedron, snap_to_nearest_face,
};
use crate::config;
use crate::core::body::BodyState;
use crate::core::composite::Composite;
use crate::core::registry::{ShapeKind, KIND_COUNT};
use crate::core::shapes::{ShapeGeometry, Terrain, Triangle};
use crate::core::types::flags;
use crate::utils::allocator::{Arena, EntityId};

type HandlerFn = fn(&Arena<Composite>, EntityId, EntityId, &mut Vec<CollisionContact>);

pub struct CollisionDetector {
    handlers: [[Option<HandlerFn>; KIND_COUNT]; KIND_COUNT],
    pub contacts: Vec<CollisionContact>,
    seen: HashSet<(EntityId, EntityId)>,
}

impl Default for CollisionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionDetector {
    pub fn new() -> Self {
        let mut handlers: [[Option<HandlerFn>; KIND_COUNT]; KIND_COUNT] =
            [[None; KIND_COUNT]; KIND_COUNT];
        let mut register = |a: ShapeKind, b: ShapeKind, f: HandlerFn| {
            handlers[a.type_id()][b.type_id()] = Some(f);
        };
        register(ShapeKind::Sphere, ShapeKind::Sphere, handle_sphere_sphere);
        register(ShapeKind::Sphere, ShapeKind::Cuboid, handle_sphere_cuboid);
        register(
            ShapeKind::Sphere,
            ShapeKind::Polyhedron,
            handle_sphere_polyhedron,
        );
        register(ShapeKind::Sphere, ShapeKind::Terrain, handle_sphere_terrain);
        register(ShapeKind::Terrain, ShapeKind::Point, handle_terrain_point);

        Self {
            handlers,
            contacts: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn handler_for(&self, a: ShapeKind, b: ShapeKind) -> Option<HandlerFn> {
        self.handlers[a.type_id().min(b.type_id())][a.type_id().max(b.type_id())]
    }

    /// Queries the broad phase for every awake, non-static shape and runs
    /// the matching handler on each new canonical pair.
    pub fn handle_all(&mut self, composites: &Arena<Composite>, broadphase: &dyn Broadphase) {
        self.seen.clear();

        let initiators: Vec<EntityId> = composites
            .iter_with_ids()
            .filter(|(_, shape)| !shape.sleeping && !shape.has_flag(flags::STATIC))
            .map(|(id, _)| id)
            .collect();

        for id in initiators {
            let Some(shape) = composites.get(id) else {
                continue;
            };
            let query_box = shape.global.expanded_hitbox;
            let mut candidates = Vec::new();
            broadphase.query(&query_box, &mut |other| {
                if other != id {
                    candidates.push(other);
                }
            });
            for other in candidates {
                self.add_pair(composites, id, other);
            }
        }
    }

    fn add_pair(&mut self, composites: &Arena<Composite>, a: EntityId, b: EntityId) {
        let key = (a.min(b), a.max(b));
        if !self.seen.insert(key) {
            return;
        }

        let (Some(shape_a), Some(shape_b)) = (composites.get(a), composites.get(b)) else {
            return;
        };
        if shape_a.max_parent == shape_b.max_parent {
            return;
        }
        if shape_a.is_immovable() && shape_b.is_immovable() {
            return;
        }
        if !shape_a.filter.matches(&shape_b.filter) {
            return;
        }
        if !shape_a
            .global
            .expanded_hitbox
            .intersects(&shape_b.global.expanded_hitbox)
        {
            return;
        }
        let Some(handler) = self.handler_for(shape_a.kind(), shape_b.kind()) else {
            return;
        };

        // Canonical argument order: lower type id first.
        let (first, second) = if shape_a.kind().type_id() <= shape_b.kind().type_id() {
            (a, b)
        } else {
            (b, a)
        };
        handler(composites, first, second, &mut self.contacts);
    }

    /// Manual terrain probe: the would-be contact for a point shape, even
    /// when it is not penetrating. Nothing is registered.
    pub fn terrain_point_probe(
        composites: &Arena<Composite>,
        terrain_id: EntityId,
        point_id: EntityId,
    ) -> Option<CollisionContact> {
        let terrain = composites.get(terrain_id)?;
        let point = composites.get(point_id)?;
        terrain_point_contact(terrain, point, true)
    }
}

fn position_at(body: &BodyState, t: f32) -> Vec3 {
    body.previous_position.lerp(body.position, t)
}

fn rotation_at(body: &BodyState, t: f32) -> Quat {
    body.previous_rotation.slerp(body.rotation, t).normalize()
}

fn sphere_radius(shape: &Composite) -> Option<f32> {
    match shape.geometry {
        ShapeGeometry::Sphere { radius } => Some(radius),
        _ => None,
    }
}

fn handle_sphere_sphere(
    composites: &Arena<Composite>,
    id1: EntityId,
    id2: EntityId,
    out: &mut Vec<CollisionContact>,
) {
    let (Some(s1), Some(s2)) = (composites.get(id1), composites.get(id2)) else {
        return;
    };
    let (Some(r1), Some(r2)) = (sphere_radius(s1), sphere_radius(s2)) else {
        return;
    };
    let b1 = &s1.global.body;
    let b2 = &s2.global.body;

    let relative = b1.velocity() - b2.velocity();
    let Some(interval) = swept_interval(&s1.global.hitbox, relative, &s2.global.hitbox) else {
        return;
    };

    let radius_sum = r1 + r2;
    let (t, d) = refine_toi(interval, config::TOI_BINARY_SEARCH_DEPTH, |t| {
        position_at(b1, t).distance_squared(position_at(b2, t)) - radius_sum * radius_sum
    });
    if d > 0.0 {
        return;
    }

    let delta = position_at(b1, t) - position_at(b2, t);
    let normal = if delta.length_squared() > 0.0 {
        delta.normalize()
    } else {
        Vec3::X
    };
    let depth = radius_sum - b1.position.distance(b2.position);
    let point = b1.position - normal * r1;
    out.push(CollisionContact::new(s1, s2, point, normal, normal * depth));
}

fn handle_sphere_cuboid(
    composites: &Arena<Composite>,
    sphere_id: EntityId,
    cuboid_id: EntityId,
    out: &mut Vec<CollisionContact>,
) {
    let (Some(sphere), Some(cuboid)) = (composites.get(sphere_id), composites.get(cuboid_id))
    else {
        return;
    };
    let Some(radius) = sphere_radius(sphere) else {
        return;
    };
    let ShapeGeometry::Cuboid {
        width,
        height,
        depth,
    } = cuboid.geometry
    else {
        return;
    };
    let half = Vec3::new(width, height, depth) * 0.5;
    let sb = &sphere.global.body;
    let cb = &cuboid.global.body;

    let relative = sb.velocity() - cb.velocity();
    let Some(interval) = swept_interval(&sphere.global.hitbox, relative, &cuboid.global.hitbox)
    else {
        return;
    };

    // Local-frame separation: negative once the clamped point is within the
    // radius, and more negative the deeper the center sits inside.
    let local_probe = |t: f32| -> (Vec3, Vec3, bool) {
        let rotation = rotation_at(cb, t);
        let rel = rotation.conjugate() * (position_at(sb, t) - position_at(cb, t));
        let clamped = clamp_to_half_extents(rel, half);
        let inside = clamped == rel;
        let closest = if inside {
            snap_to_nearest_face(rel, half)
        } else {
            clamped
        };
        (rel, closest, inside)
    };
    let distance = |t: f32| -> f32 {
        let (rel, closest, inside) = local_probe(t);
        let dist = rel.distance_squared(closest);
        if inside {
            -(dist + radius * radius)
        } else {
            dist - radius * radius
        }
    };

    let (t, d) = refine_toi(interval, config::TOI_BINARY_SEARCH_DEPTH, distance);
    if d > 0.0 {
        return;
    }

    let (_, closest_local, inside) = local_probe(t);
    let closest_world = rotation_at(cb, t) * closest_local + position_at(cb, t);
    let mut normal = (position_at(sb, t) - closest_world).normalize_or_zero();
    if normal == Vec3::ZERO {
        normal = Vec3::Y;
    }
    if inside {
        normal = -normal;
    }

    // Depth measured against end-of-tick transforms.
    let (_, closest_now, _) = local_probe(1.0);
    let closest_now_world = cb.rotation * closest_now + cb.position;
    let penetration =
        normal * radius + normal * (closest_now_world - sb.position).dot(normal);
    let point = sb.position - normal * radius;
    out.push(CollisionContact::new(sphere, cuboid, point, normal, penetration));
}

fn handle_sphere_polyhedron(
    composites: &Arena<Composite>,
    sphere_id: EntityId,
    poly_id: EntityId,
    out: &mut Vec<CollisionContact>,
) {
    let (Some(sphere), Some(poly_shape)) = (composites.get(sphere_id), composites.get(poly_id))
    else {
        return;
    };
    let Some(radius) = sphere_radius(sphere) else {
        return;
    };
    let ShapeGeometry::Polyhedron(ref poly) = poly_shape.geometry else {
        return;
    };
    if poly.faces.is_empty() {
        return;
    }
    let sb = &sphere.global.body;
    let pb = &poly_shape.global.body;

    let relative = sb.velocity() - pb.velocity();
    let Some(interval) = swept_interval(&sphere.global.hitbox, relative, &poly_shape.global.hitbox)
    else {
        return;
    };

    let local_center = |t: f32| -> Vec3 {
        rotation_at(pb, t).conjugate() * (position_at(sb, t) - position_at(pb, t))
    };
    let search_depth = if poly.convex {
        config::TOI_BINARY_SEARCH_DEPTH
    } else {
        config::TOI_CONCAVE_SEARCH_DEPTH
    };

    let (t, d) = refine_toi(interval, search_depth, |t| {
        probe_polyhedron(poly, local_center(t), radius).signed_distance(radius)
    });
    if d > 0.0 {
        return;
    }

    let probe = probe_polyhedron(poly, local_center(t), radius);
    let Some((closest_local, face_normal)) = probe.closest else {
        return;
    };

    let rotation_t = rotation_at(pb, t);
    let closest_world = rotation_t * closest_local + position_at(pb, t);
    let mut normal = (position_at(sb, t) - closest_world).normalize_or_zero();
    if normal == Vec3::ZERO {
        normal = rotation_t * face_normal;
    }
    if probe.inside {
        normal = -normal;
    }

    let closest_now_world = pb.rotation * closest_local + pb.position;
    let penetration =
        normal * radius + normal * (closest_now_world - sb.position).dot(normal);
    let point = sb.position - normal * radius;
    out.push(CollisionContact::new(
        sphere,
        poly_shape,
        point,
        normal,
        penetration,
    ));
}

/// Triangle of a terrain cell converted into the terrain's local frame.
fn local_triangle(terrain: &Terrain, tri: &Triangle) -> Triangle {
    Triangle {
        a: terrain.heightmap_to_local(tri.a),
        b: terrain.heightmap_to_local(tri.b),
        c: terrain.heightmap_to_local(tri.c),
    }
}

fn upward_normal(tri: &Triangle) -> Vec3 {
    let n = tri.normal();
    if n.y < 0.0 {
        -n
    } else {
        n
    }
}

fn handle_sphere_terrain(
    composites: &Arena<Composite>,
    sphere_id: EntityId,
    terrain_id: EntityId,
    out: &mut Vec<CollisionContact>,
) {
    let (Some(sphere), Some(terrain_shape)) =
        (composites.get(sphere_id), composites.get(terrain_id))
    else {
        return;
    };
    let Some(radius) = sphere_radius(sphere) else {
        return;
    };
    let ShapeGeometry::Terrain(ref terrain) = terrain_shape.geometry else {
        return;
    };
    let sb = &sphere.global.body;
    let tb = &terrain_shape.global.body;

    let relative = sb.velocity() - tb.velocity();
    let Some(interval) =
        swept_interval(&sphere.global.hitbox, relative, &terrain_shape.global.hitbox)
    else {
        return;
    };

    let heightmap_center = |t: f32| -> Vec3 {
        let local = rotation_at(tb, t).conjugate() * (position_at(sb, t) - position_at(tb, t));
        terrain.local_to_heightmap(local)
    };

    // Height above the covering triangle, minus the radius. Off-grid
    // centers stay positive so the search never latches onto them.
    let (_t, d) = refine_toi(interval, config::TOI_BINARY_SEARCH_DEPTH, |t| {
        let hm = heightmap_center(t);
        match terrain.triangle_at(hm) {
            Some(tri) => hm.y - tri.height_at(hm.x, hm.z) - radius,
            None => f32::INFINITY,
        }
    });
    if d > 0.0 {
        return;
    }

    let hm_now = heightmap_center(1.0);
    let Some(center_tri) = terrain.triangle_at(hm_now) else {
        return;
    };
    let center_local = tb.rotation.conjugate() * (sb.position - tb.position);

    let surface_height = center_tri.height_at(hm_now.x, hm_now.z);
    if hm_now.y < surface_height {
        // Center buried below the surface: one deep contact lifting the
        // center back to the surface point.
        let tri_local = local_triangle(terrain, &center_tri);
        let normal = tb.rotation * upward_normal(&tri_local);
        let surface_local =
            terrain.heightmap_to_local(Vec3::new(hm_now.x, surface_height, hm_now.z));
        let surface_world = tb.rotation * surface_local + tb.position;
        out.push(CollisionContact::new(
            sphere,
            terrain_shape,
            surface_world,
            normal,
            surface_world - sb.position,
        ));
        return;
    }

    // Fan over the 3x3 neighborhood of the settled cell.
    let (cx, cz) = (hm_now.x.floor() as i64, hm_now.z.floor() as i64);
    for dz in -1..=1 {
        for dx in -1..=1 {
            let (x, z) = (cx + dx, cz + dz);
            if !terrain.cell_in_bounds(x, z) {
                continue;
            }
            let (lower, upper) = terrain.triangle_pair(x as u32, z as u32);
            for tri in [lower, upper] {
                let tri_local = local_triangle(terrain, &tri);
                let closest = tri_local.closest_point(center_local);
                let distance = closest.distance(center_local);
                let depth = radius - distance;
                if depth <= 0.0 {
                    continue;
                }
                let direction = (center_local - closest).normalize_or_zero();
                let normal_local = if direction == Vec3::ZERO {
                    upward_normal(&tri_local)
                } else {
                    direction
                };
                let normal = tb.rotation * normal_local;
                let point = tb.rotation * closest + tb.position;
                out.push(CollisionContact::new(
                    sphere,
                    terrain_shape,
                    point,
                    normal,
                    normal * depth,
                ));
            }
        }
    }
}

fn handle_terrain_point(
    composites: &Arena<Composite>,
    terrain_id: EntityId,
    point_id: EntityId,
    out: &mut Vec<CollisionContact>,
) {
    let (Some(terrain), Some(point)) = (composites.get(terrain_id), composites.get(point_id))
    else {
        return;
    };
    if let Some(contact) = terrain_point_contact(terrain, point, false) {
        out.push(contact);
    }
}

/// Top-surface probe under a point shape. With `manual` set the contact is
/// returned even when the point floats above the surface.
fn terrain_point_contact(
    terrain_shape: &Composite,
    point_shape: &Composite,
    manual: bool,
) -> Option<CollisionContact> {
    let ShapeGeometry::Terrain(ref terrain) = terrain_shape.geometry else {
        return None;
    };
    if !matches!(point_shape.geometry, ShapeGeometry::Point) {
        return None;
    }
    let tb = &terrain_shape.global.body;
    let position = point_shape.global.body.position;

    let local = tb.rotation.conjugate() * (position - tb.position);
    let hm = terrain.local_to_heightmap(local);
    let tri = terrain.triangle_at(hm)?;
    let tri_local = local_triangle(terrain, &tri);

    let normal = tb.rotation * upward_normal(&tri_local);
    let anchor_world = tb.rotation * tri_local.a + tb.position;
    let depth = (anchor_world - position).dot(normal);
    if depth <= 0.0 && !manual {
        return None;
    }

    Some(CollisionContact::new(
        point_shape,
        terrain_shape,
        position,
        normal,
        normal * depth,
    ))
}
