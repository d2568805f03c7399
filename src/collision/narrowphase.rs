//! Narrow-phase geometric predicates shared by the shape-pair handlers.

use glam::Vec3;

use crate::core::shapes::{Polyhedron, Triangle};
use crate::core::types::Aabb;

/// Closest point to `p` within a centered box of the given half extents.
pub fn clamp_to_half_extents(p: Vec3, half: Vec3) -> Vec3 {
    p.clamp(-half, half)
}

/// Nearest surface point when `p` is inside the box: snap the axis with the
/// smallest distance to its face.
pub fn snap_to_nearest_face(p: Vec3, half: Vec3) -> Vec3 {
    let mut axis = 0;
    let mut best = f32::INFINITY;
    for i in 0..3 {
        let gap = half[i] - p[i].abs();
        if gap < best {
            best = gap;
            axis = i;
        }
    }
    let mut out = p;
    out[axis] = if p[axis] >= 0.0 { half[axis] } else { -half[axis] };
    out
}

/// Möller–Trumbore with a fixed ray; used for parity containment tests.
fn ray_hits_triangle(origin: Vec3, dir: Vec3, tri: &Triangle) -> bool {
    let e1 = tri.b - tri.a;
    let e2 = tri.c - tri.a;
    let h = dir.cross(e2);
    let det = e1.dot(h);
    if det.abs() < 1e-9 {
        return false;
    }
    let inv = 1.0 / det;
    let s = origin - tri.a;
    let u = s.dot(h) * inv;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    e1.dot(q) * inv > 1e-9
}

/// Result of probing a polyhedron with a sphere in the polyhedron's local
/// frame.
#[derive(Debug, Clone, Copy)]
pub struct PolyhedronProbe {
    /// Closest face point and that face's normal, if any face qualified.
    pub closest: Option<(Vec3, Vec3)>,
    pub distance_squared: f32,
    pub inside: bool,
}

impl PolyhedronProbe {
    /// Signed separation driving the impact-time binary search: negative
    /// while touching or contained.
    pub fn signed_distance(&self, radius: f32) -> f32 {
        if self.inside {
            -(self.distance_squared + radius * radius)
        } else {
            self.distance_squared - radius * radius
        }
    }
}

/// Finds the closest face point to a sphere center in polyhedron-local
/// space. Faces are pruned against the sphere's local box; if every face is
/// pruned away the scan reruns exhaustively. Containment uses face planes
/// for convex volumes and horizontal-ray parity for concave ones.
pub fn probe_polyhedron(poly: &Polyhedron, center: Vec3, radius: f32) -> PolyhedronProbe {
    let sphere_box = Aabb::new(center - Vec3::splat(radius), center + Vec3::splat(radius));

    let mut convex_inside = poly.convex;
    let mut crossings = 0u32;
    let ray_dir = Vec3::X;

    let scan = |prune: bool| {
        let mut closest: Option<(Vec3, Vec3)> = None;
        let mut best = f32::INFINITY;
        for index in 0..poly.faces.len() {
            let tri = poly.face_triangle(index);
            if prune {
                let face_box = Aabb::from_points(&[tri.a, tri.b, tri.c]);
                if !face_box.intersects(&sphere_box) {
                    continue;
                }
            }
            let point = tri.closest_point(center);
            let dist = point.distance_squared(center);
            if dist < best {
                best = dist;
                closest = Some((point, poly.normals[index]));
            }
        }
        (closest, best)
    };

    for index in 0..poly.faces.len() {
        let tri = poly.face_triangle(index);
        if poly.convex {
            if (tri.a - center).dot(poly.normals[index]) < 0.0 {
                convex_inside = false;
            }
        } else if ray_hits_triangle(center, ray_dir, &tri) {
            crossings += 1;
        }
    }

    let (mut closest, mut best) = scan(true);
    if closest.is_none() {
        (closest, best) = scan(false);
    }

    let mut inside = if poly.convex {
        convex_inside
    } else {
        crossings % 2 == 1
    };
    // Grazing guard: the parity test lies right at a surface crossing.
    if inside && !poly.convex {
        if let Some((point, normal)) = closest {
            if (point - center).dot(normal) < 0.0 {
                inside = false;
            }
        }
    }

    PolyhedronProbe {
        closest,
        distance_squared: best,
        inside,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_tetrahedron(convex: bool) -> Polyhedron {
        // Vertices around the origin so containment tests have an interior.
        let vertices = vec![
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
        ];
        // Wound so normals face outward.
        let faces = vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        Polyhedron::new(vertices, faces, convex)
    }

    #[test]
    fn snap_moves_to_the_nearest_face() {
        let half = Vec3::new(1.0, 2.0, 3.0);
        let snapped = snap_to_nearest_face(Vec3::new(0.5, -1.0, 0.0), half);
        assert_relative_eq!(snapped.distance(Vec3::new(1.0, -1.0, 0.0)), 0.0);
    }

    #[test]
    fn convex_containment_uses_face_planes() {
        let poly = unit_tetrahedron(true);
        assert!(probe_polyhedron(&poly, Vec3::ZERO, 0.1).inside);
        assert!(!probe_polyhedron(&poly, Vec3::new(3.0, 0.0, 0.0), 0.1).inside);
    }

    #[test]
    fn concave_containment_uses_ray_parity() {
        let poly = unit_tetrahedron(false);
        assert!(probe_polyhedron(&poly, Vec3::new(0.0, 0.0, 0.0), 0.05).inside);
        assert!(!probe_polyhedron(&poly, Vec3::new(0.0, 3.0, 0.0), 0.05).inside);
    }

    #[test]
    fn signed_distance_flips_sign_at_the_surface() {
        let poly = unit_tetrahedron(true);
        let outside = probe_polyhedron(&poly, Vec3::new(3.0, 3.0, 3.0), 0.5);
        assert!(outside.signed_distance(0.5) > 0.0);
        let touching = probe_polyhedron(&poly, Vec3::new(1.0, 1.0, 1.0), 0.5);
        assert!(touching.signed_distance(0.5) <= 0.0);
    }
}
