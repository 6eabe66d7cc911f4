//! Reactive buff engine: event-driven, stackable and derivable attribute modifiers.
//!
//! `buffs-core` keeps the per-entity bookkeeping consistent while buffs are
//! added, triggered, propagated to related entities and removed in any order.
//! Hosts describe their vocabulary through [`Schema`], own their entities in a
//! [`BuffWorld`], and drive every mutation through [`BuffEngine`].
pub mod clock;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod schema;
pub mod spec;
pub mod state;

#[cfg(test)]
mod test_schema;

pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::{ConditionArg, ConditionContext, ConditionExpr, ConditionFn};
pub use config::EngineConfig;
pub use engine::{BuffEngine, create_derivation_modifier};
pub use error::{BuffError, ErrorSeverity};
pub use event::{BuffEvent, EventFrame, EventKind, EventResult, get_propagation_source};
pub use schema::{BuffWorld, Schema};
pub use spec::{
    BuffDuration, BuffSpec, Modifier, Operator, Registry, ResolvedCondition, ResolverFn, Trigger,
};
pub use state::{
    ActiveBuff, Attribute, AttributeStore, BuffId, BuffModification, Buffable, EntityId,
    ExpiryEntry, ExpiryQueue, ModificationId, Timestamp, TriggerIndex,
};
