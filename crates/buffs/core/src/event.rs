//! Events and their causal chain.
//!
//! Every event names the entity it targets. Events synthesised by the engine
//! (a buff being added, a buff being propagated) record the event that caused
//! them as an ancestor frame, so the full causal chain is available without
//! back-pointers. Ancestors are copied at synthesis time into a bounded
//! [`ArrayVec`]; synthesising past [`EngineConfig::MAX_EVENT_CHAIN`] frames
//! fails with [`BuffError::EventChainTooDeep`].

use std::collections::BTreeMap;

use arrayvec::ArrayVec;

use crate::config::EngineConfig;
use crate::error::BuffError;
use crate::schema::Schema;
use crate::spec::Trigger;
use crate::state::{BuffId, BuffModification, EntityId};

const CHAIN: usize = EngineConfig::MAX_EVENT_CHAIN;

/// What happened.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind<S: Schema> {
    /// An event raised by the host.
    Game(S::Event),
    /// A buff was added to the target entity.
    BuffAdded { buff: BuffId },
    /// A buff reached the target entity through propagation from `source`.
    BuffPropagated { source: EntityId, buff: BuffId },
}

/// One link of a causal chain.
#[derive(Clone, Debug, PartialEq)]
pub struct EventFrame<S: Schema> {
    pub entity: EntityId,
    pub kind: EventKind<S>,
}

/// An event addressed to one entity, with its ancestors.
#[derive(Clone, Debug, PartialEq)]
pub struct BuffEvent<S: Schema> {
    frame: EventFrame<S>,
    /// Most recent cause first.
    ancestors: ArrayVec<EventFrame<S>, CHAIN>,
}

impl<S: Schema> BuffEvent<S> {
    /// A host event targeting `entity`.
    pub fn game(entity: EntityId, event: S::Event) -> Self {
        Self {
            frame: EventFrame {
                entity,
                kind: EventKind::Game(event),
            },
            ancestors: ArrayVec::new(),
        }
    }

    /// Synthesises a child event caused by `self`.
    pub fn caused(&self, entity: EntityId, kind: EventKind<S>) -> Result<Self, BuffError> {
        let mut ancestors = ArrayVec::new();
        ancestors
            .try_push(self.frame.clone())
            .map_err(|_| BuffError::EventChainTooDeep { depth: CHAIN })?;
        for frame in &self.ancestors {
            ancestors
                .try_push(frame.clone())
                .map_err(|_| BuffError::EventChainTooDeep { depth: CHAIN })?;
        }
        Ok(Self {
            frame: EventFrame { entity, kind },
            ancestors,
        })
    }

    pub(crate) fn buff_added(&self, entity: EntityId, buff: BuffId) -> Result<Self, BuffError> {
        self.caused(entity, EventKind::BuffAdded { buff })
    }

    pub(crate) fn buff_propagated(
        &self,
        target: EntityId,
        source: EntityId,
        buff: BuffId,
    ) -> Result<Self, BuffError> {
        self.caused(target, EventKind::BuffPropagated { source, buff })
    }

    pub fn entity(&self) -> EntityId {
        self.frame.entity
    }

    pub fn kind(&self) -> &EventKind<S> {
        &self.frame.kind
    }

    /// The host payload, if this is a host event.
    pub fn payload(&self) -> Option<&S::Event> {
        match &self.frame.kind {
            EventKind::Game(event) => Some(event),
            _ => None,
        }
    }

    /// The trigger key this event fires, if any.
    ///
    /// Propagation frames only ever appear as causes and fire nothing.
    pub fn trigger(&self) -> Option<Trigger<S>> {
        match &self.frame.kind {
            EventKind::Game(event) => Some(Trigger::Event(S::event_kind(event))),
            EventKind::BuffAdded { .. } => Some(Trigger::OnAdd),
            EventKind::BuffPropagated { .. } => None,
        }
    }

    /// This event followed by its ancestors, most recent first.
    pub fn chain(&self) -> impl Iterator<Item = &EventFrame<S>> {
        std::iter::once(&self.frame).chain(self.ancestors.iter())
    }

    /// Number of frames in the chain, this event included.
    pub fn depth(&self) -> usize {
        self.ancestors.len() + 1
    }

    /// The entity that propagated the buff behind this event, if any.
    ///
    /// Walks the chain to the nearest propagation frame.
    pub fn propagation_source(&self) -> Option<EntityId> {
        self.chain().find_map(|frame| match frame.kind {
            EventKind::BuffPropagated { source, .. } => Some(source),
            _ => None,
        })
    }
}

/// Modifications caused by dispatching one event.
#[derive(Clone, Debug, PartialEq)]
pub struct EventResult<S: Schema> {
    pub added: Vec<BuffModification<S>>,
    pub removed: Vec<BuffModification<S>>,
    /// Results of nested applications on propagation targets.
    pub propagated: BTreeMap<EntityId, Vec<EventResult<S>>>,
}

impl<S: Schema> Default for EventResult<S> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            propagated: BTreeMap::new(),
        }
    }
}

impl<S: Schema> EventResult<S> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.propagated.is_empty()
    }

    pub fn push_propagated(&mut self, target: EntityId, result: EventResult<S>) {
        self.propagated.entry(target).or_default().push(result);
    }

    pub fn merge(&mut self, other: EventResult<S>) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        for (target, results) in other.propagated {
            self.propagated.entry(target).or_default().extend(results);
        }
    }
}

/// Returns the propagation source recorded in `event`'s causal chain.
pub fn get_propagation_source<S: Schema>(event: &BuffEvent<S>) -> Option<EntityId> {
    event.propagation_source()
}
