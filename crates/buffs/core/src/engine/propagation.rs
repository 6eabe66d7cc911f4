//! Fan-out of buffs from a source entity to related entities.

use crate::error::BuffError;
use crate::event::{BuffEvent, EventResult};
use crate::schema::Schema;
use crate::spec::BuffSpec;
use crate::state::EntityId;

use super::BuffEngine;
use super::session::Session;

impl<S: Schema> BuffEngine<S> {
    /// Entities `spec` applies to when it fires on `entity`.
    ///
    /// For a propagating spec these are the resolver results for each
    /// declared target kind, deduplicated in resolution order. Otherwise it
    /// is `entity` alone.
    pub fn get_propagation_targets(
        &self,
        world: &S::World,
        entity: EntityId,
        spec: &BuffSpec<S>,
    ) -> Result<Vec<EntityId>, BuffError> {
        if !spec.propagates() {
            return Ok(vec![entity]);
        }
        let mut targets = Vec::new();
        for kind in &spec.propagates_to {
            for target in self.registry.get_propagation_targets(world, entity, *kind)? {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        Ok(targets)
    }

    /// Applies `spec` to every propagation target of `entity`.
    ///
    /// Targets receive the buff through a `BuffPropagated` event caused by
    /// `source_event` and never bind its propagation triggers themselves.
    pub(crate) fn propagate(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
        source_event: &BuffEvent<S>,
    ) -> Result<Vec<(EntityId, EventResult<S>)>, BuffError> {
        let targets = self.get_propagation_targets(session.world(), entity, spec)?;

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            if target == entity {
                continue;
            }
            let event = source_event.buff_propagated(target, entity, spec.id)?;
            tracing::debug!(source = %entity, entity = %target, buff = %spec.id, "buff propagated");
            session
                .entity_mut(entity)?
                .emitted
                .entry(spec.id)
                .or_default()
                .insert(target);
            let result = self.apply_buff(session, target, spec, &event, Some(entity))?;
            results.push((target, result));
        }
        Ok(results)
    }

    /// Applies to `destination` the buffs `source` would have propagated to it.
    ///
    /// Meant for entities that join after propagation already happened. Every
    /// active, auto-triggered buff on `source` that targets the destination's
    /// kind and whose conditions hold for the propagation event is applied
    /// once per stack `source` holds beyond what `destination` already has.
    pub fn pull_propagated_buffs(
        &self,
        world: &mut S::World,
        source: EntityId,
        destination: EntityId,
        event: &BuffEvent<S>,
    ) -> Result<Vec<EventResult<S>>, BuffError> {
        self.transact(world, |session| self.pull(session, source, destination, event))
    }

    fn pull(
        &self,
        session: &mut Session<'_, S>,
        source: EntityId,
        destination: EntityId,
        event: &BuffEvent<S>,
    ) -> Result<Vec<EventResult<S>>, BuffError> {
        let kind = session.entity(destination)?.kind;
        let active: Vec<_> = session
            .entity(source)?
            .active_buffs
            .values()
            .map(|active| (active.buff_id, active.stack))
            .collect();

        let mut results = Vec::new();
        for (buff, stack) in active {
            let spec = self.registry.get_buff_spec(buff)?;
            if !spec.auto_triggers() || !spec.propagates_to.contains(&kind) {
                continue;
            }
            let propagation = event.buff_propagated(destination, source, buff)?;
            if !self.conditions_hold(session.world(), &propagation, &spec.conditions)? {
                continue;
            }

            let held = session.entity(destination)?.stack_of(buff);
            if held >= stack {
                continue;
            }
            tracing::debug!(
                source = %source,
                entity = %destination,
                buff = %buff,
                stacks = stack - held,
                "pulling propagated buff"
            );
            session
                .entity_mut(source)?
                .emitted
                .entry(buff)
                .or_default()
                .insert(destination);
            for _ in held..stack {
                let applied =
                    self.apply_buff(session, destination, spec, &propagation, Some(source))?;
                results.push(applied);
            }
        }
        Ok(results)
    }
}
