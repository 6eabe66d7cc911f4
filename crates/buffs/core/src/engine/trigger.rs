//! Event dispatch and the activation state machine.
//!
//! An event is matched against the target entity's three trigger indices in a
//! fixed order: activation, deactivation, then propagation. Within each phase
//! the newest binding is evaluated first, and each candidate's conditions are
//! evaluated only when its turn comes, so a buff activated earlier in the
//! same pass is already visible to the conditions of older bindings.

use crate::condition::ConditionContext;
use crate::error::BuffError;
use crate::event::{BuffEvent, EventResult};
use crate::schema::Schema;
use crate::spec::{BuffSpec, Trigger};
use crate::state::{ActiveBuff, BuffId, Buffable, EntityId, TriggerIndex};

use super::BuffEngine;
use super::session::Session;

/// Why a stack is being removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum InactivationCause {
    /// A deactivation trigger fired or the host asked for it.
    Trigger,
    /// The stack's duration ran out.
    Expiry,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Activation,
    Deactivation,
    Propagation,
}

impl Phase {
    fn index<S: Schema>(self, entity: &Buffable<S>) -> &TriggerIndex<S> {
        match self {
            Self::Activation => &entity.activation_triggers,
            Self::Deactivation => &entity.deactivation_triggers,
            Self::Propagation => &entity.propagation_triggers,
        }
    }
}

impl<S: Schema> BuffEngine<S> {
    /// Dispatches `event` to the entity it targets.
    pub fn call_event(
        &self,
        world: &mut S::World,
        event: &BuffEvent<S>,
    ) -> Result<EventResult<S>, BuffError> {
        self.transact(world, |session| self.dispatch(session, event))
    }

    pub(crate) fn dispatch(
        &self,
        session: &mut Session<'_, S>,
        event: &BuffEvent<S>,
    ) -> Result<EventResult<S>, BuffError> {
        let mut result = EventResult::default();
        let Some(trigger) = event.trigger() else {
            return Ok(result);
        };
        let entity = event.entity();

        for buff in self.candidates(session, entity, Phase::Activation, &trigger)? {
            if !self.still_bound(session, entity, Phase::Activation, &trigger, buff)? {
                continue;
            }
            let spec = self.registry.get_buff_spec(buff)?;
            if self.conditions_hold(session.world(), event, &spec.conditions)? {
                result.merge(self.activate(session, entity, spec, event)?);
            }
        }

        for buff in self.candidates(session, entity, Phase::Deactivation, &trigger)? {
            if !self.still_bound(session, entity, Phase::Deactivation, &trigger, buff)? {
                continue;
            }
            let spec = self.registry.get_buff_spec(buff)?;
            // Unconditional buffs are bound here only through explicit
            // deactivation triggers, which always fire.
            if spec.conditions.is_empty()
                || !self.conditions_hold(session.world(), event, &spec.conditions)?
            {
                result.merge(self.inactivate(session, entity, spec, InactivationCause::Trigger)?);
            }
        }

        for buff in self.candidates(session, entity, Phase::Propagation, &trigger)? {
            if !self.still_bound(session, entity, Phase::Propagation, &trigger, buff)? {
                continue;
            }
            let spec = self.registry.get_buff_spec(buff)?;
            if !self.conditions_hold(session.world(), event, &spec.propagation_conditions)? {
                continue;
            }
            if trigger == Trigger::OnAdd && spec.propagation_triggers.is_empty() {
                session
                    .entity_mut(entity)?
                    .propagation_triggers
                    .unbind(&[Trigger::OnAdd], buff);
            }
            for (target, propagated) in self.propagate(session, entity, spec, event)? {
                result.push_propagated(target, propagated);
            }
        }

        Ok(result)
    }

    /// Activates one stack of `buff` on `entity`.
    ///
    /// Does nothing besides unbinding its activation triggers when the buff
    /// is already at `max_stack`.
    pub fn activate_buff(
        &self,
        world: &mut S::World,
        entity: EntityId,
        buff: BuffId,
        event: &BuffEvent<S>,
    ) -> Result<EventResult<S>, BuffError> {
        let spec = self.registry.get_buff_spec(buff)?;
        self.transact(world, |session| self.activate(session, entity, spec, event))
    }

    /// Removes the top stack of `buff` from `entity`.
    ///
    /// On a propagation source this also removes one stack from every entity
    /// that received the buff from it.
    pub fn inactivate_buff(
        &self,
        world: &mut S::World,
        entity: EntityId,
        buff: BuffId,
    ) -> Result<EventResult<S>, BuffError> {
        let spec = self.registry.get_buff_spec(buff)?;
        self.transact(world, |session| {
            self.inactivate(session, entity, spec, InactivationCause::Trigger)
        })
    }

    pub(crate) fn activate(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
        event: &BuffEvent<S>,
    ) -> Result<EventResult<S>, BuffError> {
        self.check_derivation_cycle(session, entity, spec, event)?;

        let buffable = session.entity_mut(entity)?;
        buffable
            .activation_triggers
            .unbind(&spec.triggers(), spec.id);

        let stack = match buffable.active_buffs.get_mut(&spec.id) {
            Some(active) if active.stack >= spec.max_stack => {
                tracing::trace!(entity = %entity, buff = %spec.id, "buff already at max stack");
                return Ok(EventResult::default());
            }
            Some(active) => {
                active.stack += 1;
                active.stack
            }
            None => {
                buffable.active_buffs.insert(
                    spec.id,
                    ActiveBuff {
                        buff_id: spec.id,
                        source_event: event.clone(),
                        stack: 1,
                    },
                );
                buffable
                    .deactivation_triggers
                    .bind(&spec.remove_triggers(), spec.id);
                1
            }
        };
        let kind = buffable.kind;

        self.register_expiry(session, entity, spec)?;

        tracing::debug!(entity = %entity, buff = %spec.id, stack, "buff activated");

        let mut result = EventResult::default();
        if !spec.can_target(kind) {
            return Ok(result);
        }

        let modifications = self.create_buff_modifications(session, entity, spec, event, stack)?;
        for modification in modifications {
            let changed = modification.applied().attribute;
            session
                .entity_mut(entity)?
                .attributes
                .apply(modification.clone());
            self.update_derivated_attributes(session, entity, changed, 0)?;
            result.added.push(modification);
        }
        Ok(result)
    }

    pub(crate) fn inactivate(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
        cause: InactivationCause,
    ) -> Result<EventResult<S>, BuffError> {
        let mut result = EventResult::default();
        let buffable = session.entity_mut(entity)?;
        let Some(stack) = buffable.active_buffs.get(&spec.id).map(|active| active.stack) else {
            return Ok(result);
        };

        let top: Vec<_> = buffable
            .attributes
            .modifications_of(spec)
            .into_iter()
            .filter(|(attribute, id)| {
                buffable
                    .attributes
                    .modification(*attribute, *id)
                    .is_some_and(|modification| modification.stack == stack)
            })
            .collect();
        for (attribute, id) in top {
            let removed = buffable
                .attributes
                .remove(attribute, id)
                .ok_or(BuffError::InvariantViolated("modification vanished during removal"))?;
            result.removed.push(removed);
        }

        if stack <= 1 {
            buffable.active_buffs.remove(&spec.id);
            buffable
                .deactivation_triggers
                .unbind(&spec.remove_triggers(), spec.id);
            if spec.rearms() {
                buffable.activation_triggers.bind(&spec.triggers(), spec.id);
            }
            buffable.expiry.purge(spec.id);
        } else {
            if let Some(active) = buffable.active_buffs.get_mut(&spec.id) {
                active.stack -= 1;
            }
            if cause != InactivationCause::Expiry {
                buffable.expiry.drop_latest(spec.id);
            }
        }
        // Expiry is tracked per entity, so only trigger-driven removal on the
        // source reaches the entities it propagated to.
        let recipients =
            if cause == InactivationCause::Trigger && buffable.received_from(spec.id).is_none() {
                buffable.recipients(spec.id)
            } else {
                Vec::new()
            };

        tracing::debug!(
            entity = %entity,
            buff = %spec.id,
            stack = stack - 1,
            %cause,
            "buff inactivated"
        );

        for modification in &result.removed {
            self.update_derivated_attributes(session, entity, modification.applied().attribute, 0)?;
        }

        for target in recipients {
            if self.received_from_here(session, target, spec.id, entity) {
                let propagated = self.inactivate(session, target, spec, cause)?;
                result.push_propagated(target, propagated);
            }
        }
        Ok(result)
    }

    /// Whether every condition in `conditions` holds for `event`.
    pub(crate) fn conditions_hold(
        &self,
        world: &S::World,
        event: &BuffEvent<S>,
        conditions: &[String],
    ) -> Result<bool, BuffError> {
        if conditions.is_empty() {
            return Ok(true);
        }
        let context = ConditionContext::new(world, event)?;
        for expr in conditions {
            if !self.registry.get_condition(expr)?.holds(&context) {
                tracing::trace!(entity = %event.entity(), condition = %expr, "condition failed");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Snapshot of the buffs bound to `trigger`, newest binding first.
    fn candidates(
        &self,
        session: &Session<'_, S>,
        entity: EntityId,
        phase: Phase,
        trigger: &Trigger<S>,
    ) -> Result<Vec<BuffId>, BuffError> {
        let buffable = session.entity(entity)?;
        let candidates: Vec<BuffId> = phase
            .index(buffable)
            .bound(trigger)
            .iter()
            .rev()
            .copied()
            .collect();
        if !candidates.is_empty() {
            tracing::trace!(
                entity = %entity,
                ?phase,
                ?trigger,
                candidates = candidates.len(),
                "scanning trigger index"
            );
        }
        Ok(candidates)
    }

    fn still_bound(
        &self,
        session: &Session<'_, S>,
        entity: EntityId,
        phase: Phase,
        trigger: &Trigger<S>,
        buff: BuffId,
    ) -> Result<bool, BuffError> {
        Ok(phase.index(session.entity(entity)?).contains(trigger, buff))
    }
}
