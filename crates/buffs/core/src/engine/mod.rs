//! Event dispatch, activation, propagation and derivation.
//!
//! [`BuffEngine`] owns the [`Registry`], the [`Clock`] and the
//! [`EngineConfig`]. It holds no entity state: every operation borrows the
//! host world for the duration of the call, runs to completion (including any
//! propagation fan-out and derivation recalculation it causes) and returns an
//! [`EventResult`] describing the modifications it made. An operation that
//! fails leaves every entity as it found it.

mod derivation;
mod expiry;
mod propagation;
mod session;
mod trigger;

pub use derivation::create_derivation_modifier;

use std::fmt;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::BuffError;
use crate::event::{BuffEvent, EventResult};
use crate::schema::{BuffWorld, Schema};
use crate::spec::{BuffSpec, Registry};
use crate::state::{BuffId, EntityId};

use session::Session;

/// Buff engine over a host [`Schema`].
pub struct BuffEngine<S: Schema> {
    registry: Registry<S>,
    clock: Box<dyn Clock>,
    config: EngineConfig,
}

impl<S: Schema> Default for BuffEngine<S> {
    fn default() -> Self {
        Self::new(Registry::new())
    }
}

impl<S: Schema> fmt::Debug for BuffEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuffEngine")
            .field("registry", &self.registry)
            .field("now", &self.clock.now())
            .field("config", &self.config)
            .finish()
    }
}

impl<S: Schema> BuffEngine<S> {
    /// Creates an engine reading wall-clock time.
    pub fn new(registry: Registry<S>) -> Self {
        Self {
            registry,
            clock: Box::new(SystemClock),
            config: EngineConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<S> {
        &mut self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Adds a registered buff to `entity`.
    ///
    /// Binds the buff's activation triggers (and propagation triggers, if it
    /// propagates), then dispatches a `BuffAdded` event caused by
    /// `source_event`. A buff without explicit activation triggers activates
    /// during that dispatch.
    pub fn add_buff(
        &self,
        world: &mut S::World,
        entity: EntityId,
        buff: BuffId,
        source_event: &BuffEvent<S>,
    ) -> Result<EventResult<S>, BuffError> {
        let spec = self.registry.get_buff_spec(buff)?;
        self.transact(world, |session| {
            self.apply_buff(session, entity, spec, source_event, None)
        })
    }

    /// Removes `buff` from `entity` and from every entity it propagated to.
    ///
    /// Recipients are the entities the buff actually reached, even if they no
    /// longer resolve as propagation targets. Fails with
    /// [`BuffError::NotSourceOwner`] when `entity` only holds the buff because
    /// another entity propagated it.
    pub fn remove_buff(
        &self,
        world: &mut S::World,
        entity: EntityId,
        buff: BuffId,
    ) -> Result<EventResult<S>, BuffError> {
        let spec = self.registry.get_buff_spec(buff)?;
        self.transact(world, |session| self.remove(session, entity, spec))
    }

    /// Final value of `attribute` on `entity`.
    ///
    /// Not side-effect free: expired buffs on `entity` are swept first, which
    /// may inactivate stacks and recalculate derivations.
    pub fn read_attribute(
        &self,
        world: &mut S::World,
        entity: EntityId,
        attribute: S::Attribute,
    ) -> Result<f64, BuffError> {
        self.transact(world, |session| {
            self.sweep(session, entity)?;
            Ok(session.entity(entity)?.attribute_value(attribute))
        })
    }

    /// Sets the unbuffed value of `attribute` and refreshes derivations reading it.
    pub fn set_base_value(
        &self,
        world: &mut S::World,
        entity: EntityId,
        attribute: S::Attribute,
        value: f64,
    ) -> Result<(), BuffError> {
        self.transact(world, |session| {
            session
                .entity_mut(entity)?
                .attributes
                .set_base(attribute, value);
            self.update_derivated_attributes(session, entity, attribute, 0)
        })
    }

    /// Runs `operation`, restoring every entity it touched if it fails.
    fn transact<T>(
        &self,
        world: &mut S::World,
        operation: impl FnOnce(&mut Session<'_, S>) -> Result<T, BuffError>,
    ) -> Result<T, BuffError> {
        let mut session = Session::new(world);
        let outcome = operation(&mut session);
        if let Err(err) = &outcome {
            let restored = session.rollback();
            tracing::debug!(error = %err, code = err.error_code(), restored, "operation rolled back");
        }
        outcome
    }

    /// Shared path for host and propagated additions.
    pub(crate) fn apply_buff(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
        source_event: &BuffEvent<S>,
        propagated_from: Option<EntityId>,
    ) -> Result<EventResult<S>, BuffError> {
        let buffable = session.entity_mut(entity)?;
        match propagated_from {
            Some(source) => {
                buffable.received.insert(spec.id, source);
            }
            None if spec.propagates() => {
                buffable
                    .propagation_triggers
                    .bind(&spec.propagation_triggers_or_default(), spec.id);
            }
            None => {}
        }
        buffable.activation_triggers.bind(&spec.triggers(), spec.id);

        tracing::debug!(
            entity = %entity,
            buff = %spec.id,
            propagated = propagated_from.is_some(),
            "buff added"
        );

        let event = source_event.buff_added(entity, spec.id)?;
        self.dispatch(session, &event)
    }

    fn remove(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
    ) -> Result<EventResult<S>, BuffError> {
        let source = session.entity(entity)?;
        if let Some(owner) = source.received_from(spec.id) {
            return Err(BuffError::NotSourceOwner {
                entity,
                buff: spec.id,
                owner,
            });
        }
        let recipients = source.recipients(spec.id);

        let mut result = self.detach(session, entity, spec)?;
        for target in recipients {
            if self.received_from_here(session, target, spec.id, entity) {
                let detached = self.detach(session, target, spec)?;
                result.push_propagated(target, detached);
            }
        }

        tracing::debug!(
            entity = %entity,
            buff = %spec.id,
            removed = result.removed.len(),
            targets = result.propagated.len(),
            "buff removed"
        );
        Ok(result)
    }

    /// Removes every trace of `spec` from one entity.
    fn detach(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
    ) -> Result<EventResult<S>, BuffError> {
        let buffable = session.entity_mut(entity)?;
        buffable.active_buffs.remove(&spec.id);
        buffable.activation_triggers.unbind_all(spec.id);
        buffable.deactivation_triggers.unbind_all(spec.id);
        buffable.propagation_triggers.unbind_all(spec.id);
        buffable.expiry.purge(spec.id);
        buffable.received.remove(&spec.id);
        buffable.emitted.remove(&spec.id);

        let removed: Vec<_> = buffable
            .attributes
            .modifications_of(spec)
            .into_iter()
            .filter_map(|(attribute, id)| buffable.attributes.remove(attribute, id))
            .collect();

        for modification in &removed {
            self.update_derivated_attributes(session, entity, modification.applied().attribute, 0)?;
        }

        Ok(EventResult {
            removed,
            ..EventResult::default()
        })
    }

    /// Whether `target` still holds `buff` as received from `source`.
    ///
    /// Recipients that have since left the world are skipped.
    fn received_from_here(
        &self,
        session: &Session<'_, S>,
        target: EntityId,
        buff: BuffId,
        source: EntityId,
    ) -> bool {
        session
            .world()
            .buffable(target)
            .and_then(|held| held.received_from(buff))
            == Some(source)
    }
}
