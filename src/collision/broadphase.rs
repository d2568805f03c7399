//! Broad-phase acceleration structures.
//!
//! The contract is no false negatives: `query` must report a superset of the
//! ids whose stored boxes intersect the query box.

use std::collections::HashMap;

use glam::Vec3;

use crate::config;
use crate::core::types::Aabb;
use crate::utils::allocator::EntityId;

pub trait Broadphase: Send {
    /// Inserts or moves an entry.
    fn update(&mut self, id: EntityId, aabb: &Aabb);

    fn remove(&mut self, id: EntityId);

    /// Visits every stored id whose box may intersect `aabb`.
    fn query(&self, aabb: &Aabb, visit: &mut dyn FnMut(EntityId));

    fn clear(&mut self);
}

type Cell = (i32, i32, i32);

/// Uniform grid over world space; the default broad phase.
pub struct SpatialHash {
    cell_size: f32,
    cells: HashMap<Cell, Vec<EntityId>>,
    extents: HashMap<EntityId, (Cell, Cell)>,
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new(config::DEFAULT_BROADPHASE_CELL_SIZE)
    }
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            extents: HashMap::new(),
        }
    }

    fn world_to_grid(&self, position: Vec3) -> Cell {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
            (position.z / self.cell_size).floor() as i32,
        )
    }

    fn bounds(&self, aabb: &Aabb) -> (Cell, Cell) {
        (self.world_to_grid(aabb.min), self.world_to_grid(aabb.max))
    }

    fn for_each_cell(min: Cell, max: Cell, mut f: impl FnMut(Cell)) {
        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                for z in min.2..=max.2 {
                    f((x, y, z));
                }
            }
        }
    }
}

impl Broadphase for SpatialHash {
    fn update(&mut self, id: EntityId, aabb: &Aabb) {
        let span = self.bounds(aabb);
        if let Some(&previous) = self.extents.get(&id) {
            if previous == span {
                return;
            }
            self.remove(id);
        }
        let (min, max) = span;
        Self::for_each_cell(min, max, |cell| {
            self.cells.entry(cell).or_default().push(id);
        });
        self.extents.insert(id, span);
    }

    fn remove(&mut self, id: EntityId) {
        let Some((min, max)) = self.extents.remove(&id) else {
            return;
        };
        Self::for_each_cell(min, max, |cell| {
            if let Some(bucket) = self.cells.get_mut(&cell) {
                bucket.retain(|&entry| entry != id);
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        });
    }

    fn query(&self, aabb: &Aabb, visit: &mut dyn FnMut(EntityId)) {
        let (min, max) = self.bounds(aabb);
        let mut seen: Vec<EntityId> = Vec::new();
        Self::for_each_cell(min, max, |cell| {
            if let Some(bucket) = self.cells.get(&cell) {
                seen.extend_from_slice(bucket);
            }
        });
        seen.sort_unstable();
        seen.dedup();
        for id in seen {
            visit(id);
        }
    }

    fn clear(&mut self) {
        self.cells.clear();
        self.extents.clear();
    }
}

/// Sorted-interval alternative; entries ordered by min-x so queries can
/// early-exit.
#[derive(Default)]
pub struct SweepAndPrune {
    entries: Vec<(EntityId, Aabb)>,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Broadphase for SweepAndPrune {
    fn update(&mut self, id: EntityId, aabb: &Aabb) {
        self.remove(id);
        let at = self
            .entries
            .partition_point(|(_, stored)| stored.min.x < aabb.min.x);
        self.entries.insert(at, (id, *aabb));
    }

    fn remove(&mut self, id: EntityId) {
        self.entries.retain(|(entry, _)| *entry != id);
    }

    fn query(&self, aabb: &Aabb, visit: &mut dyn FnMut(EntityId)) {
        for (id, stored) in &self.entries {
            if stored.min.x > aabb.max.x {
                break;
            }
            if stored.intersects(aabb) {
                visit(*id);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(min: [f32; 3], max: [f32; 3]) -> Aabb {
        Aabb::new(Vec3::from(min), Vec3::from(max))
    }

    fn collect(bp: &dyn Broadphase, aabb: &Aabb) -> Vec<EntityId> {
        let mut hits = Vec::new();
        bp.query(aabb, &mut |id| hits.push(id));
        hits.sort_unstable();
        hits
    }

    fn no_false_negatives(bp: &mut dyn Broadphase) {
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);
        let c = EntityId::new(2, 0);
        bp.update(a, &boxed([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        bp.update(b, &boxed([0.5, 0.5, 0.5], [4.0, 4.0, 4.0]));
        bp.update(c, &boxed([100.0, 0.0, 0.0], [101.0, 1.0, 1.0]));

        let hits = collect(bp, &boxed([0.0, 0.0, 0.0], [0.75, 0.75, 0.75]));
        assert!(hits.contains(&a));
        assert!(hits.contains(&b));
        assert!(!hits.contains(&c));

        // Spanning a large range must still find everything overlapping.
        let hits = collect(bp, &boxed([-10.0, -10.0, -10.0], [200.0, 10.0, 10.0]));
        assert_eq!(hits, vec![a, b, c]);

        bp.remove(b);
        let hits = collect(bp, &boxed([0.0, 0.0, 0.0], [4.0, 4.0, 4.0]));
        assert!(!hits.contains(&b));
    }

    #[test]
    fn spatial_hash_query_contract() {
        let mut hash = SpatialHash::new(2.0);
        no_false_negatives(&mut hash);
    }

    #[test]
    fn sweep_and_prune_query_contract() {
        let mut sap = SweepAndPrune::new();
        no_false_negatives(&mut sap);
    }

    #[test]
    fn moving_an_entry_leaves_no_stale_cells() {
        let mut hash = SpatialHash::new(1.0);
        let id = EntityId::new(7, 0);
        hash.update(id, &boxed([0.0, 0.0, 0.0], [0.5, 0.5, 0.5]));
        hash.update(id, &boxed([10.0, 0.0, 0.0], [10.5, 0.5, 0.5]));
        assert!(collect(&hash, &boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])).is_empty());
        assert_eq!(
            collect(&hash, &boxed([9.0, 0.0, 0.0], [11.0, 1.0, 1.0])),
            vec![id]
        );
    }
}
