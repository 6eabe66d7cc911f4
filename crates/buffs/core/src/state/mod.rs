//! Per-entity buff state.
//!
//! Everything in here is owned by a single [`Buffable`]: its attribute
//! accumulators, the buffs currently active on it, the trigger indices that
//! decide which buffs an event reaches, and its expiry queue.
mod attributes;
mod buffable;
mod expiry;
mod ids;
mod triggers;

pub use attributes::{Attribute, AttributeStore, BuffModification};
pub use buffable::{ActiveBuff, Buffable};
pub use expiry::{ExpiryEntry, ExpiryQueue};
pub use ids::{BuffId, EntityId, ModificationId, Timestamp};
pub use triggers::TriggerIndex;
