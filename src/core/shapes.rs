//! Shape geometry carried by composites: the tagged union, polyhedron and
//! terrain data, and the triangle helper shared by their narrow phases.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::registry::ShapeKind;
use super::types::Aabb;
use crate::utils::math;

/// Geometry of a single composite node. `Composite` and `Point` have no
/// volume; only volumetric kinds should carry the occupies-space flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ShapeGeometry {
    Composite,
    Sphere { radius: f32 },
    Cuboid { width: f32, height: f32, depth: f32 },
    Polyhedron(Polyhedron),
    Terrain(Terrain),
    Point,
}

impl ShapeGeometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeGeometry::Composite => ShapeKind::Composite,
            ShapeGeometry::Sphere { .. } => ShapeKind::Sphere,
            ShapeGeometry::Cuboid { .. } => ShapeKind::Cuboid,
            ShapeGeometry::Polyhedron(_) => ShapeKind::Polyhedron,
            ShapeGeometry::Terrain(_) => ShapeKind::Terrain,
            ShapeGeometry::Point => ShapeKind::Point,
        }
    }

    /// Bounds in the shape's own frame.
    pub fn local_hitbox(&self) -> Aabb {
        match self {
            ShapeGeometry::Composite | ShapeGeometry::Point => {
                Aabb::new(Vec3::ZERO, Vec3::ZERO)
            }
            ShapeGeometry::Sphere { radius } => {
                Aabb::new(Vec3::splat(-radius), Vec3::splat(*radius))
            }
            ShapeGeometry::Cuboid {
                width,
                height,
                depth,
            } => {
                let half = Vec3::new(*width, *height, *depth) * 0.5;
                Aabb::new(-half, half)
            }
            ShapeGeometry::Polyhedron(poly) => Aabb::from_points(&poly.vertices),
            ShapeGeometry::Terrain(terrain) => terrain.local_hitbox(),
        }
    }

    /// World bounds under a rigid transform. Spheres stay tight under
    /// rotation; everything else transforms its eight local corners.
    pub fn world_hitbox(&self, rotation: Quat, position: Vec3) -> Aabb {
        match self {
            ShapeGeometry::Sphere { radius } => Aabb::new(
                position - Vec3::splat(*radius),
                position + Vec3::splat(*radius),
            ),
            _ => self.local_hitbox().transformed(rotation, position),
        }
    }

    /// Inertia tensor about the local origin for the given mass.
    pub fn local_inertia(&self, mass: f32) -> Mat3 {
        if !mass.is_finite() {
            return Mat3::from_diagonal(Vec3::splat(f32::INFINITY));
        }
        match self {
            ShapeGeometry::Composite | ShapeGeometry::Point => Mat3::ZERO,
            ShapeGeometry::Sphere { radius } => {
                Mat3::from_diagonal(Vec3::splat(0.4 * mass * radius * radius))
            }
            ShapeGeometry::Cuboid {
                width,
                height,
                depth,
            } => {
                let (w2, h2, d2) = (width * width, height * height, depth * depth);
                let factor = mass / 12.0;
                Mat3::from_diagonal(Vec3::new(
                    factor * (h2 + d2),
                    factor * (w2 + d2),
                    factor * (w2 + h2),
                ))
            }
            // Bounding-box approximation; good enough for chunky props.
            ShapeGeometry::Polyhedron(poly) => {
                let size = Aabb::from_points(&poly.vertices).extent() * 2.0;
                let factor = mass / 12.0;
                Mat3::from_diagonal(Vec3::new(
                    factor * (size.y * size.y + size.z * size.z),
                    factor * (size.x * size.x + size.z * size.z),
                    factor * (size.x * size.x + size.y * size.y),
                ))
            }
            ShapeGeometry::Terrain(terrain) => {
                let size = terrain.local_hitbox().extent() * 2.0;
                let factor = mass / 12.0;
                Mat3::from_diagonal(Vec3::new(
                    factor * (size.y * size.y + size.z * size.z),
                    factor * (size.x * size.x + size.z * size.z),
                    factor * (size.x * size.x + size.y * size.y),
                ))
            }
        }
    }
}

/// Triangle-faced volume. Convex volumes use face-plane containment; concave
/// ones fall back to a ray-parity test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyhedron {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    /// Outward face normals, recomputed whenever the mesh changes.
    pub normals: Vec<Vec3>,
    pub convex: bool,
}

impl Polyhedron {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[u32; 3]>, convex: bool) -> Self {
        let mut poly = Self {
            vertices,
            faces,
            normals: Vec::new(),
            convex,
        };
        poly.recompute_normals();
        poly
    }

    pub fn recompute_normals(&mut self) {
        self.normals = self
            .faces
            .iter()
            .map(|face| {
                let (a, b, c) = self.corners(face);
                (b - a).cross(c - a).normalize_or_zero()
            })
            .collect();
    }

    fn corners(&self, face: &[u32; 3]) -> (Vec3, Vec3, Vec3) {
        (
            self.vertices[face[0] as usize],
            self.vertices[face[1] as usize],
            self.vertices[face[2] as usize],
        )
    }

    pub fn face_triangle(&self, index: usize) -> Triangle {
        let (a, b, c) = self.corners(&self.faces[index]);
        Triangle { a, b, c }
    }
}

/// Heightfield over a regular x/z grid centered on the local origin. Heights
/// are in world units on y; cells are `terrain_scale` wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terrain {
    pub heights: Vec<f32>,
    pub width_segments: u32,
    pub depth_segments: u32,
    pub terrain_scale: f32,
}

impl Terrain {
    pub fn new(heights: Vec<f32>, width_segments: u32, depth_segments: u32, scale: f32) -> Self {
        let expected = ((width_segments + 1) * (depth_segments + 1)) as usize;
        assert_eq!(
            heights.len(),
            expected,
            "terrain needs (w+1)*(d+1) height samples"
        );
        Self {
            heights,
            width_segments,
            depth_segments,
            terrain_scale: scale,
        }
    }

    pub fn flat(width_segments: u32, depth_segments: u32, scale: f32, height: f32) -> Self {
        let count = ((width_segments + 1) * (depth_segments + 1)) as usize;
        Self::new(vec![height; count], width_segments, depth_segments, scale)
    }

    pub fn sample(&self, ix: u32, iz: u32) -> f32 {
        self.heights[(iz * (self.width_segments + 1) + ix) as usize]
    }

    pub fn local_hitbox(&self) -> Aabb {
        let half_w = self.width_segments as f32 * 0.5 * self.terrain_scale;
        let half_d = self.depth_segments as f32 * 0.5 * self.terrain_scale;
        let mut low = f32::INFINITY;
        let mut high = f32::NEG_INFINITY;
        for &h in &self.heights {
            low = low.min(h);
            high = high.max(h);
        }
        Aabb::new(Vec3::new(-half_w, low, -half_d), Vec3::new(half_w, high, half_d))
    }

    /// Local x/z to fractional grid coordinates; y passes through.
    pub fn local_to_heightmap(&self, local: Vec3) -> Vec3 {
        let inv = 1.0 / self.terrain_scale;
        Vec3::new(
            local.x * inv + self.width_segments as f32 * 0.5,
            local.y,
            local.z * inv + self.depth_segments as f32 * 0.5,
        )
    }

    pub fn heightmap_to_local(&self, hm: Vec3) -> Vec3 {
        Vec3::new(
            (hm.x - self.width_segments as f32 * 0.5) * self.terrain_scale,
            hm.y,
            (hm.z - self.depth_segments as f32 * 0.5) * self.terrain_scale,
        )
    }

    pub fn cell_in_bounds(&self, cx: i64, cz: i64) -> bool {
        cx >= 0
            && cz >= 0
            && (cx as u32) < self.width_segments
            && (cz as u32) < self.depth_segments
    }

    /// Both triangles of a cell, in heightmap coordinates.
    pub fn triangle_pair(&self, cx: u32, cz: u32) -> (Triangle, Triangle) {
        let (x0, z0) = (cx as f32, cz as f32);
        let corner = |dx: u32, dz: u32| {
            Vec3::new(
                x0 + dx as f32,
                self.sample(cx + dx, cz + dz),
                z0 + dz as f32,
            )
        };
        let a = corner(0, 0);
        let b = corner(1, 0);
        let c = corner(0, 1);
        let d = corner(1, 1);
        (Triangle { a, b, c }, Triangle { a: b, b: d, c })
    }

    /// Triangle covering a heightmap position, or None outside the grid.
    pub fn triangle_at(&self, hm: Vec3) -> Option<Triangle> {
        let cx = hm.x.floor() as i64;
        let cz = hm.z.floor() as i64;
        if !self.cell_in_bounds(cx, cz) {
            return None;
        }
        let (lower, upper) = self.triangle_pair(cx as u32, cz as u32);
        let fx = hm.x - cx as f32;
        let fz = hm.z - cz as f32;
        Some(if fx + fz < 1.0 { lower } else { upper })
    }
}

/// Triangle in either local or heightmap space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a).normalize_or_zero()
    }

    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        math::closest_point_on_triangle(p, self.a, self.b, self.c)
    }

    /// Height of the triangle's plane at (x, z). The plane must not be
    /// vertical.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let n = (self.b - self.a).cross(self.c - self.a);
        if n.y.abs() < f32::EPSILON {
            return self.a.y;
        }
        // Plane equation solved for y.
        self.a.y - (n.x * (x - self.a.x) + n.z * (z - self.a.z)) / n.y
    }
}
