//! Entities capable of hosting buffs.

use std::collections::{BTreeMap, BTreeSet};

use crate::event::BuffEvent;
use crate::schema::Schema;

use super::{AttributeStore, BuffId, EntityId, ExpiryQueue, TriggerIndex};

/// Record that a buff is active on an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveBuff<S: Schema> {
    pub buff_id: BuffId,
    /// Event behind the first stack.
    pub source_event: BuffEvent<S>,
    /// Always in `1..=max_stack`.
    pub stack: u32,
}

/// An entity owned by the host world.
///
/// The engine mutates buffables only through [`BuffEngine`](crate::BuffEngine)
/// calls and never keeps references to them between calls.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffable<S: Schema> {
    pub id: EntityId,
    pub kind: S::EntityKind,
    pub attributes: AttributeStore<S>,
    pub active_buffs: BTreeMap<BuffId, ActiveBuff<S>>,
    pub activation_triggers: TriggerIndex<S>,
    pub deactivation_triggers: TriggerIndex<S>,
    pub propagation_triggers: TriggerIndex<S>,
    pub expiry: ExpiryQueue,
    /// Buffs obtained through propagation, with the entity they came from.
    pub received: BTreeMap<BuffId, EntityId>,
    /// Entities each buff was propagated to from here.
    pub emitted: BTreeMap<BuffId, BTreeSet<EntityId>>,
}

impl<S: Schema> Buffable<S> {
    pub fn new(id: EntityId, kind: S::EntityKind) -> Self {
        Self {
            id,
            kind,
            attributes: AttributeStore::new(),
            active_buffs: BTreeMap::new(),
            activation_triggers: TriggerIndex::new(),
            deactivation_triggers: TriggerIndex::new(),
            propagation_triggers: TriggerIndex::new(),
            expiry: ExpiryQueue::new(),
            received: BTreeMap::new(),
            emitted: BTreeMap::new(),
        }
    }

    /// Sets base values for several attributes at construction.
    pub fn with_base(mut self, bases: impl IntoIterator<Item = (S::Attribute, f64)>) -> Self {
        for (attribute, value) in bases {
            self.attributes.set_base(attribute, value);
        }
        self
    }

    /// Current final value of `attribute`.
    ///
    /// Does not sweep expired buffs; use
    /// [`BuffEngine::read_attribute`](crate::BuffEngine::read_attribute) for
    /// an up-to-date read.
    pub fn attribute_value(&self, attribute: S::Attribute) -> f64 {
        self.attributes.value(attribute)
    }

    pub fn has_buff(&self, buff: BuffId) -> bool {
        self.active_buffs.contains_key(&buff)
    }

    /// Current stack count of `buff`, zero when inactive.
    pub fn stack_of(&self, buff: BuffId) -> u32 {
        self.active_buffs.get(&buff).map_or(0, |active| active.stack)
    }

    /// Entities this entity propagated `buff` to, in id order.
    pub fn recipients(&self, buff: BuffId) -> Vec<EntityId> {
        self.emitted
            .get(&buff)
            .map(|recipients| recipients.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The entity `buff` was propagated from, if it was.
    pub fn received_from(&self, buff: BuffId) -> Option<EntityId> {
        self.received.get(&buff).copied()
    }
}
