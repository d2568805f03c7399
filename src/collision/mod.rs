//! Collision detection modules: broad phase, swept-AABB impact times,
//! narrow-phase predicates, and the pair dispatcher.

pub mod broadphase;
pub mod ccd;
pub mod contact;
pub mod detector;
pub mod narrowphase;

pub use broadphase::{Broadphase, SpatialHash, SweepAndPrune};
pub use ccd::{refine_toi, swept_interval, ToiInterval};
pub use contact::CollisionContact;
pub use detector::CollisionDetector;
