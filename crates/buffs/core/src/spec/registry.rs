//! Catalogue of buff specs, condition predicates and propagation resolvers.
//!
//! The registry is an ordinary value owned by the engine. It is filled once at
//! startup and only read while events are dispatched.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::condition::{ConditionArg, ConditionContext, ConditionExpr, ConditionFn};
use crate::error::BuffError;
use crate::schema::{BuffWorld, Schema};
use crate::state::{BuffId, Buffable, EntityId};

use super::BuffSpec;

/// Resolver returning the entities of one kind related to a source entity.
pub type ResolverFn<S> = Box<
    dyn Fn(&<S as Schema>::World, &Buffable<S>) -> Vec<EntityId> + Send + Sync,
>;

/// A condition expression bound to its registered predicate.
pub struct ResolvedCondition<'r, S: Schema> {
    pub predicate: &'r ConditionFn<S>,
    pub args: Vec<ConditionArg>,
    pub expected: bool,
}

impl<S: Schema> ResolvedCondition<'_, S> {
    pub fn holds(&self, context: &ConditionContext<'_, S>) -> bool {
        (self.predicate)(context, &self.args) == self.expected
    }
}

pub struct Registry<S: Schema> {
    buffs: HashMap<BuffId, BuffSpec<S>>,
    conditions: HashMap<String, ConditionFn<S>>,
    propagations: HashMap<(S::EntityKind, S::EntityKind), Vec<ResolverFn<S>>>,
}

impl<S: Schema> Default for Registry<S> {
    fn default() -> Self {
        Self {
            buffs: HashMap::new(),
            conditions: HashMap::new(),
            propagations: HashMap::new(),
        }
    }
}

impl<S: Schema> fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conditions: Vec<&str> = self.conditions.keys().map(String::as_str).collect();
        conditions.sort_unstable();
        f.debug_struct("Registry")
            .field("buffs", &self.buffs.len())
            .field("conditions", &conditions)
            .field("propagations", &self.propagations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S: Schema> Registry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `spec`, replacing any spec with the same id.
    pub fn register_buff(&mut self, spec: BuffSpec<S>) -> &mut Self {
        debug!(buff = %spec.id, name = ?spec.name, "registered buff spec");
        self.buffs.insert(spec.id, spec);
        self
    }

    pub fn get_buff_spec(&self, id: BuffId) -> Result<&BuffSpec<S>, BuffError> {
        self.buffs.get(&id).ok_or(BuffError::SpecNotFound(id))
    }

    pub fn register_condition<F>(&mut self, name: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&ConditionContext<'_, S>, &[ConditionArg]) -> bool + Send + Sync + 'static,
    {
        self.conditions.insert(name.into(), Box::new(predicate));
        self
    }

    /// Parses `expr` and looks up its predicate.
    pub fn get_condition(&self, expr: &str) -> Result<ResolvedCondition<'_, S>, BuffError> {
        let ConditionExpr {
            name,
            args,
            expected,
        } = ConditionExpr::parse(expr)?;
        let predicate = self
            .conditions
            .get(&name)
            .ok_or_else(|| BuffError::ConditionNotFound(name))?;
        Ok(ResolvedCondition {
            predicate,
            args,
            expected,
        })
    }

    /// Registers a resolver for buffs propagating from `from` entities to `to` entities.
    pub fn register_propagation<F>(
        &mut self,
        from: S::EntityKind,
        to: S::EntityKind,
        resolver: F,
    ) -> &mut Self
    where
        F: Fn(&S::World, &Buffable<S>) -> Vec<EntityId> + Send + Sync + 'static,
    {
        self.propagations
            .entry((from, to))
            .or_default()
            .push(Box::new(resolver));
        self
    }

    /// Every entity of kind `to` that resolvers relate to `entity`.
    pub fn get_propagation_targets(
        &self,
        world: &S::World,
        entity: EntityId,
        to: S::EntityKind,
    ) -> Result<Vec<EntityId>, BuffError> {
        let source = world
            .buffable(entity)
            .ok_or(BuffError::EntityNotFound(entity))?;
        Ok(self
            .propagations
            .get(&(source.kind, to))
            .into_iter()
            .flatten()
            .flat_map(|resolver| resolver(world, source))
            .collect())
    }

    /// Forgets every spec, condition and resolver.
    pub fn clear(&mut self) {
        self.buffs.clear();
        self.conditions.clear();
        self.propagations.clear();
    }
}
