//! Buff templates and the registry that holds them.
mod buff;
mod registry;

pub use buff::{BuffDuration, BuffSpec, Modifier, Operator, Trigger};
pub use registry::{Registry, ResolvedCondition, ResolverFn};
