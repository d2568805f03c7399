//! Sequential-impulse solver over the substep's contacts and the world's
//! persistent constraints, followed by mass-weighted positional correction.

use std::collections::HashMap;

use glam::Vec3;

use crate::collision::contact::CollisionContact;
use crate::core::composite::{sync_all, Composite};
use crate::core::constraints::{Constraint, ConstraintKind};
use crate::events::ContactEvent;
use crate::utils::allocator::{Arena, EntityId};

pub struct ContactSolver {
    pub iterations: u32,
}

impl Default for ContactSolver {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SOLVER_ITERATIONS)
    }
}

impl ContactSolver {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Resolves one substep. Consumes the contact list and returns the
    /// summaries the world turns into collision events.
    pub fn resolve(
        &self,
        composites: &mut Arena<Composite>,
        contacts: &mut Vec<CollisionContact>,
        constraints: &mut Arena<ConstraintKind>,
    ) -> Vec<ContactEvent> {
        // Sensors report but never push back.
        for contact in contacts.iter_mut() {
            let sensor = composites
                .get(contact.body1)
                .map(|s| s.sensor)
                .unwrap_or(false)
                || composites
                    .get(contact.body2)
                    .map(|s| s.sensor)
                    .unwrap_or(false);
            if sensor {
                contact.ignore = true;
            }
        }

        let constraint_ids: Vec<EntityId> = constraints.ids().collect();
        for _ in 0..self.iterations {
            for contact in contacts.iter_mut() {
                if contact.ignore {
                    continue;
                }
                if contact.solve(composites) {
                    contact.apply_forces(composites);
                    flush_root(composites, contact.max_parent1);
                    flush_root(composites, contact.max_parent2);
                }
            }
            for &id in &constraint_ids {
                let Some(kind) = constraints.get_mut(id) else {
                    continue;
                };
                let item = kind.as_constraint_mut();
                if item.solve(composites) {
                    item.apply_forces(composites);
                    let (body1, body2) = item.body_ids();
                    flush_shape(composites, body1);
                    flush_shape(composites, body2);
                }
            }
        }

        rebuild_touching(composites, contacts);
        self.correct_positions(composites, contacts, constraints, &constraint_ids);

        let reports = contacts
            .iter()
            .map(|contact| ContactEvent {
                body1: contact.body1,
                body2: contact.body2,
                point: contact.point,
                normal: contact.normal,
                velocity: contact.velocity,
                penetration: contact.penetration,
                ignore: contact.ignore,
            })
            .collect();
        contacts.clear();
        reports
    }

    /// Splits accumulated penetration between the bodies of each contact,
    /// weighted by each body's share of its own penetration budget and by
    /// the opposite body's mass fraction.
    fn correct_positions(
        &self,
        composites: &mut Arena<Composite>,
        contacts: &[CollisionContact],
        constraints: &mut Arena<ConstraintKind>,
        constraint_ids: &[EntityId],
    ) {
        let mut items: Vec<(Vec3, EntityId, EntityId)> = Vec::new();
        for contact in contacts {
            if contact.ignore || contact.penetration.length_squared() == 0.0 {
                continue;
            }
            items.push((contact.penetration, contact.max_parent1, contact.max_parent2));
        }
        for &id in constraint_ids {
            let Some(kind) = constraints.get_mut(id) else {
                continue;
            };
            let item = kind.as_constraint_mut();
            let error = item.penetration();
            if error.length_squared() == 0.0 {
                continue;
            }
            let (body1, body2) = item.body_ids();
            let Some(mp1) = composites.get(body1).map(|s| s.max_parent) else {
                continue;
            };
            let Some(mp2) = composites.get(body2).map(|s| s.max_parent) else {
                continue;
            };
            items.push((error, mp1, mp2));
        }

        let mut sums: HashMap<EntityId, f32> = HashMap::new();
        for (pen, mp1, mp2) in &items {
            let weight = pen.length_squared();
            *sums.entry(*mp1).or_default() += weight;
            *sums.entry(*mp2).or_default() += weight;
        }

        for (pen, mp1, mp2) in items {
            let m1 = match composites.get(mp1) {
                Some(node) => node.effective_total_mass(),
                None => continue,
            };
            let m2 = match composites.get(mp2) {
                Some(node) => node.effective_total_mass(),
                None => continue,
            };
            let total = m1 + m2;
            // Infinite over infinite means the opposite side is immovable
            // and this one takes the full correction.
            let mut ratio1 = m1 / total;
            if !ratio1.is_finite() {
                ratio1 = 1.0;
            }
            let mut ratio2 = m2 / total;
            if !ratio2.is_finite() {
                ratio2 = 1.0;
            }

            let weight = pen.length_squared();
            if let Some(&sum) = sums.get(&mp1) {
                if sum > 0.0 {
                    translate_root(composites, mp1, pen * (weight / sum) * ratio2);
                }
            }
            if let Some(&sum) = sums.get(&mp2) {
                if sum > 0.0 {
                    translate_root(composites, mp2, -pen * (weight / sum) * ratio1);
                }
            }
        }
    }
}

/// Converts force/torque accumulators on a root into damped velocity
/// changes, then re-syncs the subtree.
fn flush_root(composites: &mut Arena<Composite>, root: EntityId) {
    let Some(node) = composites.get_mut(root) else {
        return;
    };
    if node.is_immovable() {
        node.global.body.net_force = Vec3::ZERO;
        node.global.body.net_torque = Vec3::ZERO;
        return;
    }
    let body = &mut node.global.body;
    let dv = body.net_force * body.inverse_mass * (Vec3::ONE - body.linear_damping);
    if dv.is_finite() {
        body.apply_velocity_change(dv);
    }
    let dw = (body.inverse_moment_of_inertia * body.net_torque) * (1.0 - body.angular_damping);
    if dw.is_finite() {
        body.angular_velocity += dw;
    }
    body.net_force = Vec3::ZERO;
    body.net_torque = Vec3::ZERO;
    sync_all(composites, root);
}

fn flush_shape(composites: &mut Arena<Composite>, shape: EntityId) {
    if let Some(root) = composites.get(shape).map(|s| s.max_parent) {
        flush_root(composites, root);
    }
}

fn translate_root(composites: &mut Arena<Composite>, root: EntityId, delta: Vec3) {
    let Some(node) = composites.get_mut(root) else {
        return;
    };
    if node.is_immovable() || !delta.is_finite() {
        return;
    }
    node.global.body.translate(delta);
    sync_all(composites, root);
}

/// Touching lists reflect exactly this substep's contacts, sensors included.
fn rebuild_touching(composites: &mut Arena<Composite>, contacts: &[CollisionContact]) {
    for node in composites.iter_mut() {
        node.touching.clear();
    }
    for contact in contacts {
        if let Some(node) = composites.get_mut(contact.body1) {
            node.touching.push(contact.body2);
        }
        if let Some(node) = composites.get_mut(contact.body2) {
            node.touching.push(contact.body1);
        }
    }
}
