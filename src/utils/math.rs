//! Additional math helpers layered on top of `glam`.

use glam::{Mat3, Quat, Vec3};

/// Converts an angular velocity vector (radians/tick) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-6 {
        return Quat::IDENTITY;
    }
    let axis = angular.normalize();
    Quat::from_axis_angle(axis, angle)
}

/// Projects `v` onto the (normalized) direction `n`.
pub fn project_onto(v: Vec3, n: Vec3) -> Vec3 {
    n * v.dot(n)
}

/// Removes from `v` the component along the (normalized) direction `n`.
pub fn project_onto_plane(v: Vec3, n: Vec3) -> Vec3 {
    v - project_onto(v, n)
}

/// Parallel-axis term for shifting an inertia tensor by `offset`:
/// `m * (|d|² E − d ⊗ d)`.
pub fn parallel_axis(mass: f32, offset: Vec3) -> Mat3 {
    if !mass.is_finite() {
        return Mat3::ZERO;
    }
    let d2 = offset.length_squared();
    let outer = Mat3::from_cols(
        offset * offset.x,
        offset * offset.y,
        offset * offset.z,
    );
    (Mat3::IDENTITY * d2 - outer) * mass
}

/// Rotates an inertia tensor into the frame given by `rotation`.
pub fn rotate_inertia(inertia: Mat3, rotation: Quat) -> Mat3 {
    let r = Mat3::from_quat(rotation);
    r * inertia * r.transpose()
}

/// Closest point on triangle `(a, b, c)` to `p` (Ericson's barycentric walk).
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn closest_point_covers_face_edge_and_vertex() {
        let a = Vec3::ZERO;
        let b = Vec3::new(2.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 0.0, 2.0);

        let on_face = closest_point_on_triangle(Vec3::new(0.5, 1.0, 0.5), a, b, c);
        assert_relative_eq!(on_face.y, 0.0);
        assert_relative_eq!(on_face.x, 0.5);

        let on_vertex = closest_point_on_triangle(Vec3::new(-1.0, 0.0, -1.0), a, b, c);
        assert_relative_eq!(on_vertex.distance(a), 0.0);

        let on_edge = closest_point_on_triangle(Vec3::new(1.0, 0.0, -1.0), a, b, c);
        assert_relative_eq!(on_edge.distance(Vec3::new(1.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn parallel_axis_matches_point_mass() {
        let shifted = parallel_axis(2.0, Vec3::new(0.0, 3.0, 0.0));
        assert_relative_eq!(shifted.x_axis.x, 18.0);
        assert_relative_eq!(shifted.y_axis.y, 0.0);
        assert_relative_eq!(shifted.z_axis.z, 18.0);
    }
}
