//! Host-side vocabulary the engine is generic over.
//!
//! A game plugs into the engine by implementing [`Schema`] on a marker type.
//! The schema names the attribute id space, the entity and event kinds used
//! as lookup keys, the event payload, and the world that owns every
//! [`Buffable`]. The engine never hard-codes any of them.
//!
//! ```ignore
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! struct Game;
//!
//! impl Schema for Game {
//!     type Attribute = Attr;
//!     type EntityKind = Kind;
//!     type EventKind = GameEventKind;
//!     type Event = GameEvent;
//!     type World = Kingdom;
//!
//!     fn event_kind(event: &GameEvent) -> GameEventKind {
//!         event.kind()
//!     }
//! }
//! ```

use core::fmt::Debug;
use core::hash::Hash;

use crate::state::{Buffable, EntityId};

/// Type-level description of a host application.
pub trait Schema: Copy + Debug + Eq + Hash + 'static {
    /// Attribute identifiers (attack, defense, hp, ...).
    type Attribute: Copy + Debug + Eq + Ord + Hash;

    /// Entity kinds used as propagation resolver keys (castle, player, ...).
    type EntityKind: Copy + Debug + Eq + Hash;

    /// Event kinds used as trigger keys.
    type EventKind: Copy + Debug + Eq + Hash;

    /// Event payload delivered to condition predicates.
    type Event: Clone + Debug + PartialEq;

    /// Storage owning every buffable and the relations resolvers walk.
    type World: BuffWorld<Self>;

    /// Returns the stable trigger key of an event payload.
    fn event_kind(event: &Self::Event) -> Self::EventKind;
}

/// Access to the buffables owned by the host.
///
/// The engine borrows entities only for the duration of a single call and
/// never keeps references across calls.
pub trait BuffWorld<S: Schema> {
    fn buffable(&self, id: EntityId) -> Option<&Buffable<S>>;

    fn buffable_mut(&mut self, id: EntityId) -> Option<&mut Buffable<S>>;
}
