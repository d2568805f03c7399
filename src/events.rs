//! World-scoped observers. Handlers are registered per composite and event
//! kind and run synchronously with mutable access to the body arena, so a
//! listener can push a composite around mid-step.

use std::collections::HashMap;

use glam::Vec3;

use crate::core::composite::Composite;
use crate::utils::allocator::{Arena, EntityId};

/// Snapshot of a contact handed to collision listeners.
#[derive(Debug, Clone)]
pub struct ContactEvent {
    pub body1: EntityId,
    pub body2: EntityId,
    pub point: Vec3,
    pub normal: Vec3,
    /// Relative velocity at the point when the contact last solved.
    pub velocity: Vec3,
    pub penetration: Vec3,
    /// Sensor contacts report but never apply impulses.
    pub ignore: bool,
}

#[derive(Debug, Clone)]
pub enum Event {
    PreStep,
    BeforeCollision,
    AfterCollision,
    PostSubstep,
    PostStep,
    Collision(ContactEvent),
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PreStep,
    BeforeCollision,
    AfterCollision,
    PostSubstep,
    PostStep,
    Collision,
    Delete,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PreStep => EventKind::PreStep,
            Event::BeforeCollision => EventKind::BeforeCollision,
            Event::AfterCollision => EventKind::AfterCollision,
            Event::PostSubstep => EventKind::PostSubstep,
            Event::PostStep => EventKind::PostStep,
            Event::Collision(_) => EventKind::Collision,
            Event::Delete => EventKind::Delete,
        }
    }
}

pub type EventHandler = Box<dyn FnMut(&mut Arena<Composite>, &Event)>;

/// Listener registry owned by the world; not serialized.
#[derive(Default)]
pub struct EventHub {
    listeners: HashMap<(EntityId, EventKind), Vec<EventHandler>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, id: EntityId, kind: EventKind, handler: EventHandler) {
        self.listeners.entry((id, kind)).or_default().push(handler);
    }

    /// Drops every listener attached to `id`; called on removal.
    pub fn remove_listeners(&mut self, id: EntityId) {
        self.listeners.retain(|(owner, _), _| *owner != id);
    }

    pub fn dispatch(
        &mut self,
        composites: &mut Arena<Composite>,
        id: EntityId,
        event: &Event,
    ) {
        let key = (id, event.kind());
        // Taken out for the duration so handlers can mutate bodies freely.
        let Some(mut handlers) = self.listeners.remove(&key) else {
            return;
        };
        for handler in handlers.iter_mut() {
            handler(composites, event);
        }
        match self.listeners.remove(&key) {
            Some(added) => {
                handlers.extend(added);
                self.listeners.insert(key, handlers);
            }
            None => {
                self.listeners.insert(key, handlers);
            }
        }
    }

    pub fn has_listeners(&self, id: EntityId, kind: EventKind) -> bool {
        self.listeners.contains_key(&(id, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn listeners_fire_and_can_mutate_bodies() {
        let mut arena = Arena::new();
        let id = arena.insert(Composite::sphere(1.0));
        let mut hub = EventHub::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        hub.on(
            id,
            EventKind::PostStep,
            Box::new(move |bodies, _| {
                counter.set(counter.get() + 1);
                if let Some(node) = bodies.get_mut(id) {
                    node.global.body.position.y += 1.0;
                }
            }),
        );

        hub.dispatch(&mut arena, id, &Event::PostStep);
        hub.dispatch(&mut arena, id, &Event::PreStep);
        assert_eq!(fired.get(), 1);
        assert_eq!(arena.get(id).unwrap().global.body.position.y, 1.0);

        hub.remove_listeners(id);
        hub.dispatch(&mut arena, id, &Event::PostStep);
        assert_eq!(fired.get(), 1);
    }
}
