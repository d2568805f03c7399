//! Stable shape-kind identifiers driving narrow-phase dispatch and
//! snapshot tags.

use serde::{Deserialize, Serialize};

/// Every geometry a composite can carry, as a closed set with stable ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Composite,
    Sphere,
    Cuboid,
    Polyhedron,
    Terrain,
    Point,
}

/// Number of registered kinds; dimension of the dispatch table.
pub const KIND_COUNT: usize = 6;

impl ShapeKind {
    /// Dense id used to index the handler table. Pairs are canonicalized by
    /// ascending id before lookup.
    pub fn type_id(&self) -> usize {
        match self {
            ShapeKind::Composite => 0,
            ShapeKind::Sphere => 1,
            ShapeKind::Cuboid => 2,
            ShapeKind::Polyhedron => 3,
            ShapeKind::Terrain => 4,
            ShapeKind::Point => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Composite => "composite",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Cuboid => "cuboid",
            ShapeKind::Polyhedron => "polyhedron",
            ShapeKind::Terrain => "terrain",
            ShapeKind::Point => "point",
        }
    }

    pub fn from_name(name: &str) -> Option<ShapeKind> {
        ALL_KINDS.iter().copied().find(|kind| kind.name() == name)
    }
}

pub const ALL_KINDS: [ShapeKind; KIND_COUNT] = [
    ShapeKind::Composite,
    ShapeKind::Sphere,
    ShapeKind::Cuboid,
    ShapeKind::Polyhedron,
    ShapeKind::Terrain,
    ShapeKind::Point,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ids_are_dense_and_names_round_trip() {
        for (expected, kind) in ALL_KINDS.iter().enumerate() {
            assert_eq!(kind.type_id(), expected);
            assert_eq!(ShapeKind::from_name(kind.name()), Some(*kind));
        }
        assert_eq!(ShapeKind::from_name("wedge"), None);
    }
}
