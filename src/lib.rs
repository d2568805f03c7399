//! Verlet3D – rigid-body physics for Rust.
//!
//! A position-based Verlet engine built around composite shape trees,
//! offering time-of-impact collision detection, impulse solving with
//! positional correction, distance constraints, sleeping, events, and
//! whole-world snapshots.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod events;
pub mod utils;
pub mod world;

pub use glam::{Mat3, Quat, Vec3};

pub use collision::{
    broadphase::{Broadphase, SpatialHash, SweepAndPrune},
    contact::CollisionContact,
    detector::CollisionDetector,
};
pub use crate::core::{
    composite::Composite,
    constraints::{ConstraintKind, DistanceConstraint},
    registry::ShapeKind,
    shapes::{Polyhedron, ShapeGeometry, Terrain},
    types::{flags, Aabb, CollisionFilter, Material},
};
pub use dynamics::ContactSolver;
pub use events::{ContactEvent, Event, EventKind};
pub use utils::allocator::{Arena, EntityId};
pub use world::{World, WorldError, WorldSnapshot};
