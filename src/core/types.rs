use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world or local space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn translated(&self, delta: Vec3) -> Aabb {
        Aabb::new(self.min + delta, self.max + delta)
    }

    pub fn expanded(&self, margin: Vec3) -> Aabb {
        Aabb::new(self.min - margin, self.max + margin)
    }

    /// World box of this local box under a rigid transform, from the eight
    /// rotated corners.
    pub fn transformed(&self, rotation: Quat, translation: Vec3) -> Aabb {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        let mut bounds = Aabb::empty();
        for corner in corners {
            bounds.extend(rotation * corner + translation);
        }
        bounds
    }
}

/// Surface response parameters combined pairwise at contact time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

impl Material {
    pub fn new(friction: f32, restitution: f32) -> Self {
        Self {
            friction,
            restitution,
        }
    }

    /// Symmetric pairwise combination used for contacts.
    pub fn combined(&self, other: &Material) -> Material {
        Material {
            friction: (self.friction + other.friction) * 0.5,
            restitution: (self.restitution + other.restitution) * 0.5,
        }
    }
}

/// Layer/mask pair controlling which shapes may collide.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub layer: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    /// Both filters must accept each other's layer.
    pub fn matches(&self, other: &CollisionFilter) -> bool {
        (self.layer & other.mask) != 0 && (other.layer & self.mask) != 0
    }
}

/// Behavior flags on a composite. Effective flags are OR-ed down the tree.
pub mod flags {
    /// Immovable; never initiates collision queries.
    pub const STATIC: u32 = 1 << 0;
    /// Takes part in broad-phase queries.
    pub const OCCUPIES_SPACE: u32 = 1 << 1;
    /// Aggregation recenters the local origin at the mass centroid.
    pub const CENTER_OF_MASS: u32 = 1 << 2;
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn filters_match_both_ways() {
        let a = CollisionFilter { layer: 0b01, mask: 0b10 };
        let b = CollisionFilter { layer: 0b10, mask: 0b01 };
        let c = CollisionFilter { layer: 0b10, mask: 0b10 };
        assert!(a.matches(&b));
        assert!(!a.matches(&c), "one-way acceptance must not match");
    }

    #[test]
    fn transformed_box_contains_rotated_corners() {
        let unit = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let spun = unit.transformed(
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            Vec3::new(10.0, 0.0, 0.0),
        );
        let expected = 2.0_f32.sqrt();
        assert!((spun.max.x - (10.0 + expected)).abs() < 1e-5);
        assert!((spun.min.x - (10.0 - expected)).abs() < 1e-5);
        assert!((spun.max.y - 1.0).abs() < 1e-6);
    }
}
