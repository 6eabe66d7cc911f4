//! All-or-nothing access to the host world for one engine call.
//!
//! A [`Session`] hands out entity borrows and keeps a copy of every buffable
//! the first time it is borrowed mutably. A call that fails part way through
//! a cascade (a propagation target missing, a recalculation or event chain
//! too deep) restores those copies, so the world is exactly as it was before
//! the call.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::BuffError;
use crate::schema::{BuffWorld, Schema};
use crate::state::{Buffable, EntityId};

pub(crate) struct Session<'w, S: Schema> {
    world: &'w mut S::World,
    before: BTreeMap<EntityId, Buffable<S>>,
}

impl<'w, S: Schema> Session<'w, S> {
    pub(crate) fn new(world: &'w mut S::World) -> Self {
        Self {
            world,
            before: BTreeMap::new(),
        }
    }

    pub(crate) fn world(&self) -> &S::World {
        &*self.world
    }

    pub(crate) fn entity(&self, id: EntityId) -> Result<&Buffable<S>, BuffError> {
        self.world.buffable(id).ok_or(BuffError::EntityNotFound(id))
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Result<&mut Buffable<S>, BuffError> {
        if let Entry::Vacant(slot) = self.before.entry(id) {
            let current = self
                .world
                .buffable(id)
                .ok_or(BuffError::EntityNotFound(id))?;
            slot.insert(current.clone());
        }
        self.world
            .buffable_mut(id)
            .ok_or(BuffError::EntityNotFound(id))
    }

    /// Puts every entity touched so far back into its state at session start.
    ///
    /// Returns the number of entities restored.
    pub(crate) fn rollback(self) -> usize {
        let Self { world, before } = self;
        let restored = before.len();
        for (id, snapshot) in before {
            if let Some(entity) = world.buffable_mut(id) {
                *entity = snapshot;
            }
        }
        restored
    }
}
