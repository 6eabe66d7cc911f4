//! Derived modifiers and their recalculation.
//!
//! A derivation copies part of one attribute into another as a flat add. The
//! copied amount is a snapshot taken when the modification is created, so it
//! goes stale whenever the source attribute changes afterwards. Every
//! attribute change therefore ends in [`BuffEngine::update_derivated_attributes`],
//! which refreshes the snapshots reading the changed attribute, depth first:
//!
//! - on the same entity, through the source attribute's derivation links;
//! - on the entities it propagated to, for modifications whose `derived_from`
//!   is the changed entity.

use crate::error::BuffError;
use crate::event::BuffEvent;
use crate::schema::{BuffWorld, Schema};
use crate::spec::{BuffSpec, Modifier, Operator};
use crate::state::{BuffId, BuffModification, Buffable, EntityId};

use super::BuffEngine;
use super::session::Session;

/// Flat-add snapshot of `modifier` read from a source value.
///
/// An additive modifier copies its own value; a multiplicative one copies
/// `source_value * value`.
pub fn create_derivation_modifier<S: Schema>(
    source_value: f64,
    modifier: &Modifier<S>,
    to_attribute: S::Attribute,
) -> Modifier<S> {
    let bonus = match modifier.operator {
        Operator::Add => modifier.value,
        Operator::Multiply => source_value * modifier.value,
    };
    Modifier::add(bonus, to_attribute)
}

/// The entity whose attribute a derivation of `spec` on `entity` reads, when
/// it is not `entity` itself.
fn cross_source<S: Schema>(
    entity: &Buffable<S>,
    spec: &BuffSpec<S>,
    event: &BuffEvent<S>,
) -> Option<EntityId> {
    spec.propagates_to_attribute
        .and(
            entity
                .received_from(spec.id)
                .or_else(|| event.propagation_source()),
        )
        .filter(|source| *source != entity.id)
}

impl<S: Schema> BuffEngine<S> {
    /// Rejects a same-entity derivation whose target already feeds its source.
    pub(crate) fn check_derivation_cycle(
        &self,
        session: &Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
        event: &BuffEvent<S>,
    ) -> Result<(), BuffError> {
        let Some(to) = spec.propagates_to_attribute.or(spec.to_attribute) else {
            return Ok(());
        };
        let buffable = session.entity(entity)?;
        if !spec.can_target(buffable.kind) || cross_source(buffable, spec, event).is_some() {
            return Ok(());
        }
        for modifier in &spec.modifiers {
            if buffable.attributes.derivation_reaches(to, modifier.attribute) {
                tracing::debug!(
                    entity = %entity,
                    buff = %spec.id,
                    attribute = ?to,
                    "derivation cycle rejected"
                );
                return Err(BuffError::DerivationCycle {
                    entity,
                    attribute: format!("{to:?}"),
                });
            }
        }
        Ok(())
    }

    /// Builds one modification per modifier of `spec` for stack `stack`.
    pub(crate) fn create_buff_modifications(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
        event: &BuffEvent<S>,
        stack: u32,
    ) -> Result<Vec<BuffModification<S>>, BuffError> {
        let buffable = session.entity(entity)?;
        let derived_from = cross_source(buffable, spec, event);
        let reader = match derived_from {
            Some(source) => session.entity(source)?,
            None => buffable,
        };
        let derivated: Vec<Option<Modifier<S>>> = spec
            .modifiers
            .iter()
            .map(|modifier| {
                spec.propagates_to_attribute
                    .or(spec.to_attribute)
                    .map(|to| {
                        create_derivation_modifier(
                            reader.attribute_value(modifier.attribute),
                            modifier,
                            to,
                        )
                    })
            })
            .collect();

        let attributes = &mut session.entity_mut(entity)?.attributes;
        Ok(spec
            .modifiers
            .iter()
            .zip(derivated)
            .map(|(modifier, derivated)| BuffModification {
                id: attributes.next_modification_id(),
                buff_id: spec.id,
                source_event: event.clone(),
                modifier: *modifier,
                derivated,
                stack,
                derived_from,
            })
            .collect())
    }

    /// Refreshes every derivation reading `changed` on `entity`.
    ///
    /// `depth` counts the recalculations already nested above this call.
    pub(crate) fn update_derivated_attributes(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        changed: S::Attribute,
        depth: usize,
    ) -> Result<(), BuffError> {
        let dependents = session.entity(entity)?.attributes.dependents_of(changed);
        for (target, id) in dependents {
            let attributes = &session.entity(entity)?.attributes;
            let modification = attributes
                .modification(target, id)
                .ok_or(BuffError::InvariantViolated(
                    "derivation link points at a missing modification",
                ))?;
            let fresh = create_derivation_modifier(
                attributes.value(modification.modifier.attribute),
                &modification.modifier,
                target,
            );
            if modification.derivated == Some(fresh) {
                continue;
            }

            self.guard_depth(depth)?;
            session
                .entity_mut(entity)?
                .attributes
                .rederive(target, id, fresh);
            tracing::trace!(
                entity = %entity,
                from = ?changed,
                attribute = ?target,
                value = fresh.value,
                depth,
                "derivation recalculated"
            );
            self.update_derivated_attributes(session, entity, target, depth + 1)?;
        }
        self.update_propagated_derivations(session, entity, changed, depth)
    }

    /// Refreshes derivations on the entities `source` propagated to that read
    /// `changed` on `source`.
    fn update_propagated_derivations(
        &self,
        session: &mut Session<'_, S>,
        source: EntityId,
        changed: S::Attribute,
        depth: usize,
    ) -> Result<(), BuffError> {
        let source_entity = session.entity(source)?;
        let source_value = source_entity.attribute_value(changed);
        let emitted: Vec<(BuffId, Vec<EntityId>)> = source_entity
            .emitted
            .keys()
            .map(|buff| (*buff, source_entity.recipients(*buff)))
            .collect();

        for (buff, recipients) in emitted {
            let spec = self.registry.get_buff_spec(buff)?;
            if spec.propagates_to_attribute.is_none()
                || !spec.modifiers.iter().any(|m| m.attribute == changed)
            {
                continue;
            }
            for target in recipients {
                // Recipients may have left the world since.
                let Some(held) = session.world().buffable(target) else {
                    continue;
                };
                let attributes = &held.attributes;
                let stale: Vec<_> = attributes
                    .modifications_of(spec)
                    .into_iter()
                    .filter_map(|(attribute, id)| {
                        let modification = attributes.modification(attribute, id)?;
                        let reads_changed = modification.derived_from == Some(source)
                            && modification.modifier.attribute == changed;
                        if !reads_changed {
                            return None;
                        }
                        let fresh = create_derivation_modifier(
                            source_value,
                            &modification.modifier,
                            attribute,
                        );
                        (modification.derivated != Some(fresh)).then_some((attribute, id, fresh))
                    })
                    .collect();

                for (attribute, id, fresh) in stale {
                    self.guard_depth(depth)?;
                    session
                        .entity_mut(target)?
                        .attributes
                        .rederive(attribute, id, fresh);
                    tracing::trace!(
                        source = %source,
                        entity = %target,
                        buff = %buff,
                        attribute = ?attribute,
                        value = fresh.value,
                        depth,
                        "propagated derivation recalculated"
                    );
                    self.update_derivated_attributes(session, target, attribute, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn guard_depth(&self, depth: usize) -> Result<(), BuffError> {
        let limit = self.config.max_recalculation_depth;
        if depth >= limit {
            tracing::debug!(depth, limit, "derivation recalculation too deep");
            return Err(BuffError::RecalculationDepthExceeded { depth: limit });
        }
        Ok(())
    }
}
