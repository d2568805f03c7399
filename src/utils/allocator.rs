use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// World-scoped identifier with generation tracking to prevent stale references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityId {
    pub index: usize,
    pub generation: u32,
}

impl EntityId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_null(&self) -> bool {
        self.index == usize::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new(usize::MAX, 0)
    }
}

/// Generational arena that hands out stable IDs while preventing use-after-free.
///
/// Serializes slot-for-slot, so IDs held by other objects stay valid across a
/// snapshot round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena<T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> EntityId {
        if let Some(index) = self.free_list.pop_front() {
            let generation = self.generations[index];
            self.items[index] = Some(item);
            return EntityId::new(index, generation);
        }

        let index = self.items.len();
        self.items.push(Some(item));
        self.generations.push(0);
        EntityId::new(index, 0)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.is_valid(id) && self.items.get(id.index).map(Option::is_some).unwrap_or(false)
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        if self.is_valid(id) {
            self.items.get(id.index).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        if self.is_valid(id) {
            self.items.get_mut(id.index).and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    /// Mutable access to two distinct slots at once.
    pub fn get2_mut(&mut self, id_a: EntityId, id_b: EntityId) -> Option<(&mut T, &mut T)> {
        if id_a.index == id_b.index || !self.is_valid(id_a) || !self.is_valid(id_b) {
            return None;
        }

        let (first, second, flipped) = if id_a.index < id_b.index {
            (id_a, id_b, false)
        } else {
            (id_b, id_a, true)
        };

        if second.index >= self.items.len() {
            return None;
        }

        let (left, right) = self.items.split_at_mut(second.index);
        let first_slot = left.get_mut(first.index).and_then(|slot| slot.as_mut())?;
        let second_slot = right.get_mut(0).and_then(|slot| slot.as_mut())?;

        if flipped {
            Some((second_slot, first_slot))
        } else {
            Some((first_slot, second_slot))
        }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }
        let slot = self.items.get_mut(id.index)?;
        if slot.is_some() {
            self.generations[id.index] = self.generations[id.index].wrapping_add(1);
            self.free_list.push_back(id.index);
        }
        slot.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut().filter_map(|slot| slot.as_mut())
    }

    pub fn iter_with_ids(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|item| (EntityId::new(index, self.generations[index]), item))
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|_| EntityId::new(index, self.generations[index]))
        })
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_valid(&self, id: EntityId) -> bool {
        self.generations
            .get(id.index)
            .copied()
            .map(|gen| gen == id.generation)
            .unwrap_or(false)
    }
}
