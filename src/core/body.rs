//! Verlet body state. Velocity is not stored; it is the displacement
//! between `previous_position` and `position` over one substep tick.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::utils::math;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vec3,
    pub previous_position: Vec3,
    pub rotation: Quat,
    pub previous_rotation: Quat,
    /// Radians per tick about the stored axis.
    pub angular_velocity: Vec3,

    pub mass: f32,
    pub inverse_mass: f32,
    /// Local-frame inertia tensor of the aggregate rooted here.
    pub moment_of_inertia: Mat3,
    /// World-frame inverse inertia, refreshed on sync.
    pub inverse_moment_of_inertia: Mat3,

    /// Per-axis damping applied to linear velocity changes.
    pub linear_damping: Vec3,
    pub angular_damping: f32,

    /// Transient accumulators, cleared on integration.
    pub net_force: Vec3,
    pub net_torque: Vec3,
    /// Constant acceleration on top of world gravity.
    pub acceleration: Vec3,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            previous_position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            previous_rotation: Quat::IDENTITY,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
            inverse_mass: 1.0,
            moment_of_inertia: Mat3::IDENTITY,
            inverse_moment_of_inertia: Mat3::IDENTITY,
            linear_damping: Vec3::splat(crate::config::DEFAULT_LINEAR_DAMPING),
            angular_damping: crate::config::DEFAULT_ANGULAR_DAMPING,
            net_force: Vec3::ZERO,
            net_torque: Vec3::ZERO,
            acceleration: Vec3::ZERO,
        }
    }
}

impl BodyState {
    /// Displacement over the last tick.
    pub fn velocity(&self) -> Vec3 {
        self.position - self.previous_position
    }

    /// Rewrites history so the next tick moves by `velocity`.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.previous_position = self.position - velocity;
    }

    /// Adds a velocity change without touching the current position.
    pub fn apply_velocity_change(&mut self, delta: Vec3) {
        self.previous_position -= delta;
    }

    /// Moves the body without changing its implied velocity.
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.previous_position += delta;
    }

    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
        self.inverse_mass = if mass.is_finite() && mass > 0.0 {
            1.0 / mass
        } else {
            0.0
        };
    }

    pub fn set_inertia(&mut self, inertia: Mat3) {
        self.moment_of_inertia = inertia;
        self.inverse_moment_of_inertia = invert_inertia(inertia);
    }

    /// Refreshes the world-frame inverse inertia for the current rotation.
    pub fn update_world_inertia(&mut self) {
        let local_inverse = invert_inertia(self.moment_of_inertia);
        self.inverse_moment_of_inertia = math::rotate_inertia(local_inverse, self.rotation);
    }

    /// Velocity of a world point riding on this body.
    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        self.velocity() + self.angular_velocity.cross(point - self.position)
    }

    pub fn apply_force(&mut self, force: Vec3, point: Vec3) {
        self.net_force += force;
        self.net_torque += (point - self.position).cross(force);
    }

    /// One Verlet tick. `gravity` is world acceleration, `dt` the substep
    /// duration.
    pub fn integrate(&mut self, gravity: Vec3, dt: f32) {
        let velocity = self.velocity();
        let acceleration = gravity + self.acceleration + self.net_force * self.inverse_mass;

        self.previous_position = self.position;
        self.position += velocity + acceleration * (dt * dt);

        self.angular_velocity += self.inverse_moment_of_inertia * self.net_torque * dt;
        self.previous_rotation = self.rotation;
        let spin = math::angular_velocity_to_quat(self.angular_velocity, dt);
        self.rotation = (spin * self.rotation).normalize();

        self.net_force = Vec3::ZERO;
        self.net_torque = Vec3::ZERO;
    }

    /// Kills residual motion; used when a composite falls asleep.
    pub fn rest(&mut self) {
        self.previous_position = self.position;
        self.previous_rotation = self.rotation;
        self.angular_velocity = Vec3::ZERO;
        self.net_force = Vec3::ZERO;
        self.net_torque = Vec3::ZERO;
    }
}

fn invert_inertia(inertia: Mat3) -> Mat3 {
    let det = inertia.determinant();
    if !det.is_finite() || det.abs() < f32::EPSILON {
        return Mat3::ZERO;
    }
    let inverse = inertia.inverse();
    if inverse.is_finite() {
        inverse
    } else {
        Mat3::ZERO
    }
}
