//! Velocity-level constraints solved alongside contacts.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::composite::Composite;
use crate::utils::allocator::{Arena, EntityId};

/// Anything the impulse solver can iterate: contacts and joints share this
/// seam.
pub trait Constraint {
    /// Shape ids this constraint acts between.
    fn body_ids(&self) -> (EntityId, EntityId);

    /// Skipped by impulses and positional correction, but still reported.
    fn is_ignored(&self) -> bool {
        false
    }

    /// Contribution to the positional pass, pointing the way body1 should
    /// move.
    fn penetration(&self) -> Vec3;

    /// Velocity-level solve; returns false when there is nothing to apply.
    fn solve(&mut self, composites: &Arena<Composite>) -> bool;

    /// Turns the solved impulse into force/torque accumulators on both
    /// roots.
    fn apply_forces(&mut self, composites: &mut Arena<Composite>);
}

/// One body's term of the generalized inverse mass along `dir` for an
/// impulse at `point`. Damped axes respond less; immovable bodies and
/// non-finite terms contribute nothing.
pub fn inverse_mass_term(root: &Composite, point: Vec3, dir: Vec3) -> f32 {
    if root.is_immovable() {
        return 0.0;
    }
    let body = &root.global.body;
    let r = point - body.position;
    let mut linear = body.inverse_mass * (1.0 - (body.linear_damping * dir).length());
    if !linear.is_finite() {
        linear = 0.0;
    }
    let mut angular = dir.dot((body.inverse_moment_of_inertia * r.cross(dir)).cross(r));
    if !angular.is_finite() {
        angular = 0.0;
    }
    linear + angular * (1.0 - body.angular_damping)
}

/// Applies `impulse` at `point` to a root's force accumulators.
pub fn accumulate_impulse(
    composites: &mut Arena<Composite>,
    root: EntityId,
    impulse: Vec3,
    point: Vec3,
) {
    let Some(node) = composites.get(root) else {
        return;
    };
    let Some((force, torque)) = node.get_force_effect(impulse, point) else {
        return;
    };
    if let Some(node) = composites.get_mut(root) {
        node.global.body.net_force += force;
        node.global.body.net_torque += torque;
    }
}

/// Keeps two composites between `lower_bound` and `upper_bound` apart.
/// Inside the dead band it does nothing; `lower == upper` makes a rod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceConstraint {
    pub body1: EntityId,
    pub body2: EntityId,
    pub lower_bound: f32,
    pub upper_bound: f32,
    pub to_be_removed: bool,

    #[serde(skip)]
    impulse: Vec3,
    #[serde(skip)]
    point1: Vec3,
    #[serde(skip)]
    point2: Vec3,
    #[serde(skip)]
    error: Vec3,
}

impl DistanceConstraint {
    pub fn new(body1: EntityId, body2: EntityId, lower_bound: f32, upper_bound: f32) -> Self {
        Self {
            body1,
            body2,
            lower_bound,
            upper_bound,
            to_be_removed: false,
            impulse: Vec3::ZERO,
            point1: Vec3::ZERO,
            point2: Vec3::ZERO,
            error: Vec3::ZERO,
        }
    }

    pub fn rod(body1: EntityId, body2: EntityId, length: f32) -> Self {
        Self::new(body1, body2, length, length)
    }
}

impl Constraint for DistanceConstraint {
    fn body_ids(&self) -> (EntityId, EntityId) {
        (self.body1, self.body2)
    }

    fn penetration(&self) -> Vec3 {
        self.error
    }

    fn solve(&mut self, composites: &Arena<Composite>) -> bool {
        self.impulse = Vec3::ZERO;
        self.error = Vec3::ZERO;

        let Some(shape1) = composites.get(self.body1) else {
            return false;
        };
        let Some(shape2) = composites.get(self.body2) else {
            return false;
        };
        self.point1 = shape1.global.body.position;
        self.point2 = shape2.global.body.position;

        let mut delta = self.point2 - self.point1;
        if delta.length_squared() == 0.0 {
            delta = Vec3::new(0.0, 0.0001, 0.0);
        }
        let distance = delta.length();
        if distance >= self.lower_bound && distance <= self.upper_bound {
            return false;
        }
        let normal = delta / distance;
        let error = if distance > self.upper_bound {
            distance - self.upper_bound
        } else {
            distance - self.lower_bound
        };
        self.error = normal * error;

        let Some(root1) = composites.get(shape1.max_parent) else {
            return false;
        };
        let Some(root2) = composites.get(shape2.max_parent) else {
            return false;
        };
        let relative = root2.velocity_at_point(self.point2) - root1.velocity_at_point(self.point1);
        let speed = relative.dot(normal);

        let denominator = inverse_mass_term(root1, self.point1, normal)
            + inverse_mass_term(root2, self.point2, normal);
        if denominator == 0.0 {
            return false;
        }

        self.impulse = normal * (speed / denominator);
        true
    }

    fn apply_forces(&mut self, composites: &mut Arena<Composite>) {
        let root1 = composites.get(self.body1).map(|s| s.max_parent);
        let root2 = composites.get(self.body2).map(|s| s.max_parent);
        if let Some(root) = root1 {
            accumulate_impulse(composites, root, self.impulse, self.point1);
        }
        if let Some(root) = root2 {
            accumulate_impulse(composites, root, -self.impulse, self.point2);
        }
    }
}

/// Persistent constraints stored by the world; closed set for snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConstraintKind {
    Distance(DistanceConstraint),
}

impl ConstraintKind {
    pub fn to_be_removed(&self) -> bool {
        match self {
            ConstraintKind::Distance(c) => c.to_be_removed,
        }
    }

    pub fn as_constraint_mut(&mut self) -> &mut dyn Constraint {
        match self {
            ConstraintKind::Distance(c) => c,
        }
    }

    pub fn body_ids(&self) -> (EntityId, EntityId) {
        match self {
            ConstraintKind::Distance(c) => c.body_ids(),
        }
    }
}
