//! Central simulation container orchestrating all subsystems.

use std::time::Instant;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    collision::{
        broadphase::{Broadphase, SpatialHash},
        detector::CollisionDetector,
    },
    config,
    core::{
        composite::{
            aggregate_mass, refresh_max_parent, subtree_ids, sync_all, update_sleep, Composite,
        },
        constraints::ConstraintKind,
        types::flags,
    },
    dynamics::ContactSolver,
    events::{Event, EventHandler, EventHub, EventKind},
    utils::{
        allocator::{Arena, EntityId},
        logging::{warn_if_frame_budget_exceeded, ScopedTimer},
    },
};

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("unknown composite id {0:?}")]
    UnknownComposite(EntityId),
    #[error("unknown constraint id {0:?}")]
    UnknownConstraint(EntityId),
    #[error("composite {0:?} is already attached to a parent")]
    AlreadyAttached(EntityId),
    #[error("composite {from:?} references missing composite {to:?}")]
    DanglingReference { from: EntityId, to: EntityId },
    #[error("constraint {from:?} references missing composite {to:?}")]
    DanglingConstraint { from: EntityId, to: EntityId },
}

/// Serializable image of a world. Arena slots survive the round trip, so
/// every stored `EntityId` stays valid in the restored world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub composites: Arena<Composite>,
    pub constraints: Arena<ConstraintKind>,
    pub gravity: Vec3,
    pub substeps: u32,
    pub iterations: u32,
    pub step_count: u64,
}

pub struct World {
    pub composites: Arena<Composite>,
    pub constraints: Arena<ConstraintKind>,
    pub gravity: Vec3,
    broadphase: Box<dyn Broadphase>,
    detector: CollisionDetector,
    solver: ContactSolver,
    events: EventHub,
    substeps: u32,
    delta_time: f32,
    step_count: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            composites: Arena::new(),
            constraints: Arena::new(),
            gravity: Vec3::from_slice(&config::DEFAULT_GRAVITY),
            broadphase: Box::new(SpatialHash::default()),
            detector: CollisionDetector::new(),
            solver: ContactSolver::default(),
            events: EventHub::new(),
            substeps: config::DEFAULT_SUBSTEPS,
            delta_time: 1.0 / config::DEFAULT_SUBSTEPS as f32,
            step_count: 0,
        }
    }

    pub fn with_broadphase(mut self, broadphase: Box<dyn Broadphase>) -> Self {
        self.broadphase = broadphase;
        self
    }

    pub fn substeps(&self) -> u32 {
        self.substeps
    }

    pub fn set_substeps(&mut self, substeps: u32) {
        self.substeps = substeps.max(1);
        self.delta_time = 1.0 / self.substeps as f32;
    }

    pub fn iterations(&self) -> u32 {
        self.solver.iterations
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        self.solver.iterations = iterations.max(1);
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    // --- lifecycle -------------------------------------------------------

    /// Inserts a root composite and registers it with the broad phase.
    pub fn add_composite(&mut self, composite: Composite) -> EntityId {
        let id = self.composites.insert(composite);
        let node = self.composites.get_mut(id).unwrap();
        node.id = id;
        node.max_parent = id;
        sync_all(&mut self.composites, id);
        aggregate_mass(&mut self.composites, id);
        sync_all(&mut self.composites, id);
        let node = self.composites.get(id).unwrap();
        if node.has_flag(flags::OCCUPIES_SPACE) {
            self.broadphase.update(id, &node.global.expanded_hitbox);
        }
        id
    }

    /// Links `child` under `parent`, keeping the child's world transform.
    /// The joined tree re-aggregates mass and inertia at its root.
    pub fn attach(&mut self, parent: EntityId, child: EntityId) -> Result<(), WorldError> {
        let parent_node = self
            .composites
            .get(parent)
            .ok_or(WorldError::UnknownComposite(parent))?;
        let child_node = self
            .composites
            .get(child)
            .ok_or(WorldError::UnknownComposite(child))?;
        if child_node.parent.is_some() {
            return Err(WorldError::AlreadyAttached(child));
        }

        let inv_rot = parent_node.global.body.rotation.inverse();
        let local_position =
            inv_rot * (child_node.global.body.position - parent_node.global.body.position);
        let local_rotation = (inv_rot * child_node.global.body.rotation).normalize();
        let root = parent_node.max_parent;

        {
            let node = self.composites.get_mut(child).unwrap();
            node.parent = Some(parent);
            node.local.body.position = local_position;
            node.local.body.previous_position = local_position;
            node.local.body.rotation = local_rotation;
            node.local.body.previous_rotation = local_rotation;
        }
        self.composites
            .get_mut(parent)
            .unwrap()
            .children
            .push(child);

        refresh_max_parent(&mut self.composites, root);
        aggregate_mass(&mut self.composites, root);
        sync_all(&mut self.composites, root);
        Ok(())
    }

    /// Removes a composite and its whole subtree. Every removed node fires
    /// `Delete` before its listeners and broadphase entries go away.
    pub fn remove_composite(&mut self, id: EntityId) -> Result<(), WorldError> {
        let node = self
            .composites
            .get(id)
            .ok_or(WorldError::UnknownComposite(id))?;
        let parent = node.parent;

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.composites.get_mut(parent_id) {
                parent_node.children.retain(|&child| child != id);
            }
        }

        for doomed in subtree_ids(&self.composites, id) {
            self.events
                .dispatch(&mut self.composites, doomed, &Event::Delete);
            self.events.remove_listeners(doomed);
            self.broadphase.remove(doomed);
            self.composites.remove(doomed);
        }

        if let Some(parent_id) = parent {
            if let Some(root) = self.composites.get(parent_id).map(|n| n.max_parent) {
                aggregate_mass(&mut self.composites, root);
                sync_all(&mut self.composites, root);
            }
        }
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: ConstraintKind) -> Result<EntityId, WorldError> {
        let (body1, body2) = constraint.body_ids();
        for body in [body1, body2] {
            if !self.composites.contains(body) {
                return Err(WorldError::UnknownComposite(body));
            }
        }
        Ok(self.constraints.insert(constraint))
    }

    pub fn remove_constraint(&mut self, id: EntityId) -> Result<(), WorldError> {
        self.constraints
            .remove(id)
            .map(|_| ())
            .ok_or(WorldError::UnknownConstraint(id))
    }

    pub fn get(&self, id: EntityId) -> Option<&Composite> {
        self.composites.get(id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Composite> {
        self.composites.get_mut(id)
    }

    /// Registers a listener for `kind` events on `id`.
    pub fn on(&mut self, id: EntityId, kind: EventKind, handler: EventHandler) {
        self.events.on(id, kind, handler);
    }

    /// Applies a force at a world point on a composite's root, waking the
    /// tree so the force is integrated.
    pub fn apply_force(&mut self, id: EntityId, force: Vec3, point: Vec3) -> Result<(), WorldError> {
        let root = self
            .composites
            .get(id)
            .map(|node| node.max_parent)
            .ok_or(WorldError::UnknownComposite(id))?;
        crate::core::composite::set_sleeping(&mut self.composites, root, false);
        if let Some(node) = self.composites.get_mut(root) {
            node.global.body.apply_force(force, point);
        }
        Ok(())
    }

    // --- stepping --------------------------------------------------------

    /// Advances the simulation by one step of `substeps` substeps.
    pub fn step(&mut self) {
        let started = Instant::now();
        let _timer = ScopedTimer::new("world step");

        self.dispatch_lifecycle(Event::PreStep);
        for _ in 0..self.substeps {
            self.substep();
        }
        self.dispatch_lifecycle(Event::PostStep);

        self.cull();
        self.step_count += 1;
        warn_if_frame_budget_exceeded(started.elapsed(), config::FRAME_BUDGET_MS);
    }

    fn substep(&mut self) {
        let roots: Vec<EntityId> = self
            .composites
            .iter_with_ids()
            .filter(|(_, node)| node.is_root())
            .map(|(id, _)| id)
            .collect();

        {
            let _timer = ScopedTimer::new("sync");
            for &root in &roots {
                sync_all(&mut self.composites, root);
                update_sleep(
                    &mut self.composites,
                    root,
                    config::LINEAR_SLEEP_THRESHOLD,
                    config::ANGULAR_SLEEP_THRESHOLD,
                    config::SLEEP_FRAME_THRESHOLD,
                );
            }
        }

        self.dispatch_lifecycle(Event::BeforeCollision);

        {
            let _timer = ScopedTimer::new("integrate");
            let gravity = self.gravity;
            let dt = self.delta_time;
            for &root in &roots {
                let Some(node) = self.composites.get_mut(root) else {
                    continue;
                };
                if node.sleeping || node.is_immovable() {
                    continue;
                }
                node.global.body.integrate(gravity, dt);
            }
            for &root in &roots {
                sync_all(&mut self.composites, root);
            }
        }

        {
            let _timer = ScopedTimer::new("broadphase");
            for (id, node) in self.composites.iter_with_ids() {
                if node.sleeping || !node.has_flag(flags::OCCUPIES_SPACE) {
                    continue;
                }
                self.broadphase.update(id, &node.global.expanded_hitbox);
            }
        }

        {
            let _timer = ScopedTimer::new("narrowphase");
            self.detector
                .handle_all(&self.composites, self.broadphase.as_ref());
        }
        let mut contacts = std::mem::take(&mut self.detector.contacts);
        let reports = {
            let _timer = ScopedTimer::new("solve");
            self.solver
                .resolve(&mut self.composites, &mut contacts, &mut self.constraints)
        };
        self.detector.contacts = contacts;

        for report in reports {
            let body1 = report.body1;
            let body2 = report.body2;
            let event = Event::Collision(report);
            self.events.dispatch(&mut self.composites, body1, &event);
            self.events.dispatch(&mut self.composites, body2, &event);
        }

        self.dispatch_lifecycle(Event::AfterCollision);
        self.dispatch_lifecycle(Event::PostSubstep);
    }

    fn dispatch_lifecycle(&mut self, event: Event) {
        let kind = event.kind();
        let ids: Vec<EntityId> = self
            .composites
            .ids()
            .filter(|&id| self.events.has_listeners(id, kind))
            .collect();
        for id in ids {
            self.events.dispatch(&mut self.composites, id, &event);
        }
    }

    /// Removes everything flagged for removal, plus constraints whose
    /// bodies are gone.
    fn cull(&mut self) {
        let doomed: Vec<EntityId> = self
            .composites
            .iter_with_ids()
            .filter(|(_, node)| node.to_be_removed)
            .map(|(id, _)| id)
            .collect();
        for id in doomed {
            // A flagged child may already be gone with its flagged ancestor.
            let _ = self.remove_composite(id);
        }

        let stale: Vec<EntityId> = self
            .constraints
            .iter_with_ids()
            .filter(|(_, constraint)| {
                let (body1, body2) = constraint.body_ids();
                constraint.to_be_removed()
                    || !self.composites.contains(body1)
                    || !self.composites.contains(body2)
            })
            .map(|(id, _)| id)
            .collect();
        for id in stale {
            self.constraints.remove(id);
        }
    }

    // --- snapshots -------------------------------------------------------

    pub fn to_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            composites: self.composites.clone(),
            constraints: self.constraints.clone(),
            gravity: self.gravity,
            substeps: self.substeps,
            iterations: self.solver.iterations,
            step_count: self.step_count,
        }
    }

    /// Restores a world from a snapshot. Id references are validated and
    /// derived state (broadphase entries, hitboxes, touching lists) is
    /// rebuilt rather than trusted.
    pub fn from_snapshot(snapshot: WorldSnapshot) -> Result<Self, WorldError> {
        let mut composites = snapshot.composites;

        let ids: Vec<EntityId> = composites.ids().collect();
        for &id in &ids {
            let node = composites.get(id).unwrap();
            let mut refs: Vec<EntityId> = node.children.clone();
            refs.push(node.max_parent);
            if let Some(parent) = node.parent {
                refs.push(parent);
            }
            for target in refs {
                if !composites.contains(target) {
                    return Err(WorldError::DanglingReference { from: id, to: target });
                }
            }
            let node = composites.get_mut(id).unwrap();
            node.id = id;
            node.touching.clear();
        }
        for (id, constraint) in snapshot.constraints.iter_with_ids() {
            let (body1, body2) = constraint.body_ids();
            for target in [body1, body2] {
                if !composites.contains(target) {
                    return Err(WorldError::DanglingConstraint { from: id, to: target });
                }
            }
        }

        let mut world = World::new();
        world.composites = composites;
        world.constraints = snapshot.constraints;
        world.gravity = snapshot.gravity;
        world.set_substeps(snapshot.substeps);
        world.set_iterations(snapshot.iterations);
        world.step_count = snapshot.step_count;

        let roots: Vec<EntityId> = world
            .composites
            .iter_with_ids()
            .filter(|(_, node)| node.is_root())
            .map(|(id, _)| id)
            .collect();
        for root in roots {
            sync_all(&mut world.composites, root);
        }
        for (id, node) in world.composites.iter_with_ids() {
            if node.has_flag(flags::OCCUPIES_SPACE) {
                world.broadphase.update(id, &node.global.expanded_hitbox);
            }
        }
        Ok(world)
    }
}
