//! Composite world objects: tree nodes that carry geometry and a Verlet
//! body in both a parent-relative and a world frame.
//!
//! Conventions:
//! - `local.body` holds the node's own mass/inertia and, for non-roots, its
//!   transform relative to the parent.
//! - `global.body` is the world frame; for roots it is authoritative and
//!   carries the aggregated mass/inertia of the whole subtree.
//! - Tree edges are arena ids; `max_parent` caches the root ancestor.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::body::BodyState;
use super::registry::ShapeKind;
use super::shapes::ShapeGeometry;
use super::types::{flags, Aabb, CollisionFilter, Material};
use crate::config;
use crate::utils::allocator::{Arena, EntityId};
use crate::utils::math;

/// Body state plus cached world bounds for one frame of reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    pub body: BodyState,
    pub hitbox: Aabb,
    pub expanded_hitbox: Aabb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composite {
    pub id: EntityId,
    pub name: String,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub max_parent: EntityId,

    pub geometry: ShapeGeometry,
    pub local: Frame,
    pub global: Frame,
    pub material: Material,

    /// This node's own flags; `global_flags` ORs in every ancestor's.
    pub flags: u32,
    pub global_flags: u32,
    pub filter: CollisionFilter,
    pub sensor: bool,

    pub sleeping: bool,
    pub sleep_frames: u32,
    /// Shapes in contact during the last substep.
    pub touching: Vec<EntityId>,
    pub to_be_removed: bool,
}

impl Composite {
    pub fn new(geometry: ShapeGeometry) -> Self {
        let occupies = !matches!(
            geometry,
            ShapeGeometry::Composite | ShapeGeometry::Point
        );
        let mut composite = Self {
            id: EntityId::default(),
            name: String::new(),
            parent: None,
            children: Vec::new(),
            max_parent: EntityId::default(),
            geometry,
            local: Frame::default(),
            global: Frame::default(),
            material: Material::default(),
            flags: if occupies { flags::OCCUPIES_SPACE } else { 0 },
            global_flags: 0,
            filter: CollisionFilter::default(),
            sensor: false,
            sleeping: false,
            sleep_frames: 0,
            touching: Vec::new(),
            to_be_removed: false,
        };
        composite.global_flags = composite.flags;
        composite.set_own_mass(1.0);
        composite
    }

    pub fn sphere(radius: f32) -> Self {
        Self::new(ShapeGeometry::Sphere { radius })
    }

    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Self::new(ShapeGeometry::Cuboid {
            width,
            height,
            depth,
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.global.body.position = position;
        self.global.body.previous_position = position;
        self.local.body.position = position;
        self.local.body.previous_position = position;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.set_own_mass(mass);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_flag(mut self, flag: u32) -> Self {
        self.set_flag(flag, true);
        self
    }

    pub fn with_sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        (self.global_flags & flag) != 0
    }

    pub fn set_flag(&mut self, flag: u32, value: bool) {
        if value {
            self.flags |= flag;
            self.global_flags |= flag;
        } else {
            self.flags &= !flag;
            self.global_flags &= !flag;
        }
    }

    /// Sets this node's own mass and matching shape inertia.
    pub fn set_own_mass(&mut self, mass: f32) {
        self.local.body.set_mass(mass);
        self.local.body.moment_of_inertia = self.geometry.local_inertia(mass);
        // Aggregates are refreshed on attach; a lone node is its own total.
        self.global.body.set_mass(mass);
        self.global.body.set_inertia(self.local.body.moment_of_inertia);
    }

    /// Infinite aggregate mass or a STATIC flag anywhere up the tree.
    pub fn is_immovable(&self) -> bool {
        !self.global.body.mass.is_finite() || self.has_flag(flags::STATIC)
    }

    /// Subtree mass as seen by the positional corrector.
    pub fn effective_total_mass(&self) -> f32 {
        if self.is_immovable() {
            f32::INFINITY
        } else {
            self.global.body.mass
        }
    }

    /// Force/torque pair an impulse at `point` produces, or None when the
    /// body cannot move.
    pub fn get_force_effect(&self, impulse: Vec3, point: Vec3) -> Option<(Vec3, Vec3)> {
        if self.is_immovable() {
            return None;
        }
        let torque = (point - self.global.body.position).cross(impulse);
        Some((impulse, torque))
    }

    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        if self.is_immovable() {
            return Vec3::ZERO;
        }
        self.global.body.velocity_at_point(point)
    }

    /// Recomputes world bounds from geometry; expanded bounds add the
    /// broad-phase margin plus one tick of motion.
    pub fn update_hitboxes(&mut self) {
        let body = &self.global.body;
        self.global.hitbox = self.geometry.world_hitbox(body.rotation, body.position);
        let slack = Vec3::splat(config::HITBOX_MARGIN) + body.velocity().abs();
        self.global.expanded_hitbox = self.global.hitbox.expanded(slack);
    }
}

/// Ids of `root` and all descendants, parents before children.
pub fn subtree_ids(composites: &Arena<Composite>, root: EntityId) -> Vec<EntityId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(node) = composites.get(id) {
            out.push(id);
            stack.extend(node.children.iter().copied());
        }
    }
    out
}

/// Re-caches `max_parent` across a subtree after the tree changes.
pub fn refresh_max_parent(composites: &mut Arena<Composite>, root: EntityId) {
    for id in subtree_ids(composites, root) {
        if let Some(node) = composites.get_mut(id) {
            node.max_parent = root;
        }
    }
}

/// Propagates the root's world frame down the tree and refreshes caches.
/// Sleeping subtrees keep their frozen hitboxes.
pub fn sync_all(composites: &mut Arena<Composite>, root: EntityId) {
    let Some(node) = composites.get_mut(root) else {
        return;
    };
    node.global_flags = node.flags;
    node.global.body.update_world_inertia();
    let sleeping = node.sleeping;
    if !sleeping {
        node.update_hitboxes();
    }

    let mut stack: Vec<EntityId> = node.children.clone();
    while let Some(id) = stack.pop() {
        let Some(parent_id) = composites.get(id).and_then(|n| n.parent) else {
            continue;
        };
        let Some(parent) = composites.get(parent_id) else {
            continue;
        };
        let p_pos = parent.global.body.position;
        let p_prev_pos = parent.global.body.previous_position;
        let p_rot = parent.global.body.rotation;
        let p_prev_rot = parent.global.body.previous_rotation;
        let p_angular = parent.global.body.angular_velocity;
        let p_flags = parent.global_flags;

        let Some(child) = composites.get_mut(id) else {
            continue;
        };
        let offset = child.local.body.position;
        let body = &mut child.global.body;
        body.position = p_pos + p_rot * offset;
        body.previous_position = p_prev_pos + p_prev_rot * offset;
        body.rotation = (p_rot * child.local.body.rotation).normalize();
        body.previous_rotation = (p_prev_rot * child.local.body.previous_rotation).normalize();
        body.angular_velocity = p_angular;
        child.global_flags = p_flags | child.flags;
        child.sleeping = sleeping;
        if !sleeping {
            child.update_hitboxes();
        }
        stack.extend(child.children.iter().copied());
    }
}

/// Recomputes the root's aggregate mass and inertia from the subtree.
/// With CENTER_OF_MASS set, the local origin is recentered at the mass
/// centroid (world positions stay put).
pub fn aggregate_mass(composites: &mut Arena<Composite>, root: EntityId) {
    let nodes = subtree_offsets(composites, root);

    let mut total_mass = 0.0f32;
    let mut weighted = Vec3::ZERO;
    for (_, offset, _, mass, _) in &nodes {
        total_mass += mass;
        if mass.is_finite() {
            weighted += *offset * *mass;
        }
    }

    let recenter = composites
        .get(root)
        .map(|n| (n.flags & flags::CENTER_OF_MASS) != 0)
        .unwrap_or(false);
    let centroid = if recenter && total_mass.is_finite() && total_mass > 0.0 {
        weighted / total_mass
    } else {
        Vec3::ZERO
    };

    let mut inertia = Mat3::ZERO;
    let mut infinite = !total_mass.is_finite();
    for (_, offset, rotation, mass, own_inertia) in &nodes {
        if !mass.is_finite() {
            infinite = true;
            continue;
        }
        let shifted = math::rotate_inertia(*own_inertia, *rotation)
            + math::parallel_axis(*mass, *offset - centroid);
        inertia += shifted;
    }

    if centroid != Vec3::ZERO {
        let rot = composites
            .get(root)
            .map(|n| n.global.body.rotation)
            .unwrap_or(Quat::IDENTITY);
        for id in subtree_ids(composites, root) {
            if id == root {
                continue;
            }
            if let Some(node) = composites.get_mut(id) {
                if node.parent == Some(root) {
                    node.local.body.position -= centroid;
                    node.local.body.previous_position -= centroid;
                }
            }
        }
        if let Some(node) = composites.get_mut(root) {
            node.global.body.position += rot * centroid;
            node.global.body.previous_position += rot * centroid;
        }
    }

    if let Some(node) = composites.get_mut(root) {
        let body = &mut node.global.body;
        if infinite {
            body.set_mass(f32::INFINITY);
            body.set_inertia(Mat3::from_diagonal(Vec3::splat(f32::INFINITY)));
        } else {
            body.set_mass(total_mass);
            body.set_inertia(inertia);
        }
        body.update_world_inertia();
    }
}

/// (id, offset from root, rotation relative to root, own mass, own inertia)
/// for every subtree node.
fn subtree_offsets(
    composites: &Arena<Composite>,
    root: EntityId,
) -> Vec<(EntityId, Vec3, Quat, f32, Mat3)> {
    let mut out = Vec::new();
    let mut stack = vec![(root, Vec3::ZERO, Quat::IDENTITY)];
    while let Some((id, offset, rotation)) = stack.pop() {
        let Some(node) = composites.get(id) else {
            continue;
        };
        out.push((
            id,
            offset,
            rotation,
            node.local.body.mass,
            node.local.body.moment_of_inertia,
        ));
        for &child in &node.children {
            if let Some(c) = composites.get(child) {
                stack.push((
                    child,
                    offset + rotation * c.local.body.position,
                    (rotation * c.local.body.rotation).normalize(),
                ));
            }
        }
    }
    out
}

/// Per-substep sleep bookkeeping for one root. Falling asleep freezes the
/// subtree; any detected motion wakes it.
pub fn update_sleep(
    composites: &mut Arena<Composite>,
    root: EntityId,
    linear_threshold: f32,
    angular_threshold: f32,
    frame_threshold: u32,
) {
    let Some(node) = composites.get_mut(root) else {
        return;
    };
    let body = &node.global.body;
    let linear = body.velocity().length_squared();
    let similarity = body.rotation.dot(body.previous_rotation).abs();
    let resting = linear < linear_threshold && similarity > angular_threshold;

    if resting {
        node.sleep_frames = node.sleep_frames.saturating_add(1);
        if node.sleep_frames >= frame_threshold && !node.sleeping {
            node.global.body.rest();
            set_sleeping(composites, root, true);
        }
    } else {
        node.sleep_frames = 0;
        if node.sleeping {
            set_sleeping(composites, root, false);
        }
    }
}

pub fn set_sleeping(composites: &mut Arena<Composite>, root: EntityId, sleeping: bool) {
    for id in subtree_ids(composites, root) {
        if let Some(node) = composites.get_mut(id) {
            node.sleeping = sleeping;
            if !sleeping {
                node.sleep_frames = 0;
            }
        }
    }
}
