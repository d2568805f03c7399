//! Core types describing physics entities, components, and shared data.

pub mod body;
pub mod composite;
pub mod constraints;
pub mod registry;
pub mod shapes;
pub mod types;

pub use body::BodyState;
pub use composite::{Composite, Frame};
pub use constraints::{Constraint, ConstraintKind, DistanceConstraint};
pub use registry::ShapeKind;
pub use shapes::{Polyhedron, ShapeGeometry, Terrain, Triangle};
pub use types::{flags, Aabb, CollisionFilter, Material};
