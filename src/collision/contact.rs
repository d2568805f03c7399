//! Contact points produced by the narrow phase and consumed by the solver.

use glam::Vec3;

use crate::core::composite::Composite;
use crate::core::constraints::{accumulate_impulse, inverse_mass_term, Constraint};
use crate::core::types::Material;
use crate::utils::allocator::{Arena, EntityId};

/// One contact between two shapes. The normal points from `body2` toward
/// `body1`; `penetration` is the normal scaled by depth.
#[derive(Debug, Clone)]
pub struct CollisionContact {
    pub body1: EntityId,
    pub body2: EntityId,
    pub max_parent1: EntityId,
    pub max_parent2: EntityId,

    pub point: Vec3,
    pub normal: Vec3,
    pub penetration: Vec3,
    /// Pairwise-combined surface response, filled by the solver pre-pass.
    pub material: Material,
    /// Relative velocity at the point the last time this contact solved.
    pub velocity: Vec3,

    pub impulse: Vec3,
    pub ignore: bool,

    solved: bool,
    denominator: f32,
    denominator_friction: f32,
}

impl CollisionContact {
    pub fn new(
        body1: &Composite,
        body2: &Composite,
        point: Vec3,
        normal: Vec3,
        penetration: Vec3,
    ) -> Self {
        Self {
            body1: body1.id,
            body2: body2.id,
            max_parent1: body1.max_parent,
            max_parent2: body2.max_parent,
            point,
            normal,
            penetration,
            material: body1.material.combined(&body2.material),
            velocity: Vec3::ZERO,
            impulse: Vec3::ZERO,
            ignore: false,
            solved: false,
            denominator: 0.0,
            denominator_friction: 0.0,
        }
    }
}

impl Constraint for CollisionContact {
    fn body_ids(&self) -> (EntityId, EntityId) {
        (self.body1, self.body2)
    }

    fn is_ignored(&self) -> bool {
        self.ignore
    }

    fn penetration(&self) -> Vec3 {
        self.penetration
    }

    fn solve(&mut self, composites: &Arena<Composite>) -> bool {
        self.impulse = Vec3::ZERO;

        let Some(root1) = composites.get(self.max_parent1) else {
            return false;
        };
        let Some(root2) = composites.get(self.max_parent2) else {
            return false;
        };

        let velocity =
            root1.velocity_at_point(self.point) - root2.velocity_at_point(self.point);
        self.velocity = velocity;
        let impact_speed = velocity.dot(self.normal);
        if impact_speed > 0.0 {
            return false;
        }

        let tangential = velocity - self.normal * impact_speed;
        let tangent_dir = tangential.normalize_or_zero();

        // The denominators only depend on geometry; cache them across
        // iterations.
        if !self.solved {
            self.denominator = inverse_mass_term(root1, self.point, self.normal)
                + inverse_mass_term(root2, self.point, self.normal);
            self.denominator_friction = inverse_mass_term(root1, self.point, tangent_dir)
                + inverse_mass_term(root2, self.point, tangent_dir);
            self.solved = true;
        }
        if self.denominator == 0.0 {
            return false;
        }

        let restitution = self.material.restitution;
        let normal_impulse =
            (-(1.0 + restitution) * impact_speed / self.denominator).max(0.0);

        let friction_limit = self.material.friction * normal_impulse;
        let available = if self.denominator_friction > 0.0 {
            tangential.length() / self.denominator_friction
        } else {
            0.0
        };
        let friction_impulse = available.min(friction_limit).max(0.0);

        self.impulse = self.normal * normal_impulse - tangent_dir * friction_impulse;
        true
    }

    fn apply_forces(&mut self, composites: &mut Arena<Composite>) {
        accumulate_impulse(composites, self.max_parent1, self.impulse, self.point);
        accumulate_impulse(composites, self.max_parent2, -self.impulse, self.point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::composite::refresh_max_parent;
    use crate::core::types::flags;
    use approx::assert_relative_eq;

    fn approaching_pair() -> (Arena<Composite>, CollisionContact) {
        let mut arena = Arena::new();
        let a = arena.insert(Composite::sphere(0.5).with_position(Vec3::new(-0.45, 0.0, 0.0)));
        let b = arena.insert(Composite::sphere(0.5).with_position(Vec3::new(0.45, 0.0, 0.0)));
        arena.get_mut(a).unwrap().id = a;
        arena.get_mut(b).unwrap().id = b;
        refresh_max_parent(&mut arena, a);
        refresh_max_parent(&mut arena, b);
        arena
            .get_mut(a)
            .unwrap()
            .global
            .body
            .set_velocity(Vec3::new(1.0, 0.0, 0.0));

        // Normal from b toward a.
        let normal = Vec3::new(-1.0, 0.0, 0.0);
        let contact = CollisionContact::new(
            arena.get(a).unwrap(),
            arena.get(b).unwrap(),
            Vec3::ZERO,
            normal,
            normal * 0.1,
        );
        (arena, contact)
    }

    #[test]
    fn approaching_contact_produces_separating_impulse() {
        let (arena, mut contact) = approaching_pair();
        assert!(contact.solve(&arena));
        // Inelastic, equal unit masses: impulse = speed / (1/m1 + 1/m2).
        assert_relative_eq!(contact.impulse.x, -0.5, epsilon = 1e-5);
    }

    #[test]
    fn separating_contact_is_skipped() {
        let (mut arena, mut contact) = approaching_pair();
        let a = contact.body1;
        arena
            .get_mut(a)
            .unwrap()
            .global
            .body
            .set_velocity(Vec3::new(-1.0, 0.0, 0.0));
        assert!(!contact.solve(&arena));
        assert_eq!(contact.impulse, Vec3::ZERO);
    }

    #[test]
    fn immovable_partner_takes_no_share() {
        let (mut arena, mut contact) = approaching_pair();
        let b = contact.body2;
        arena.get_mut(b).unwrap().set_flag(flags::STATIC, true);
        assert!(contact.solve(&arena));
        // Only body1's inverse mass remains in the denominator.
        assert_relative_eq!(contact.impulse.x, -1.0, epsilon = 1e-5);
    }
}
