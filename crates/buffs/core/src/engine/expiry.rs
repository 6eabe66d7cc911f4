//! Lazy expiry of timed stacks.

use crate::error::BuffError;
use crate::event::EventResult;
use crate::schema::Schema;
use crate::spec::{BuffDuration, BuffSpec};
use crate::state::EntityId;

use super::BuffEngine;
use super::session::Session;
use super::trigger::InactivationCause;

impl<S: Schema> BuffEngine<S> {
    /// Schedules the expiry of one freshly activated stack.
    pub(crate) fn register_expiry(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
        spec: &BuffSpec<S>,
    ) -> Result<(), BuffError> {
        let BuffDuration::Seconds(secs) = spec.duration else {
            return Ok(());
        };
        let expires_at = self.clock.now().plus_secs(secs);
        session
            .entity_mut(entity)?
            .expiry
            .insert(expires_at, spec.id);
        tracing::trace!(entity = %entity, buff = %spec.id, %expires_at, "expiry scheduled");
        Ok(())
    }

    /// Inactivates one stack per expired entry on `entity`.
    ///
    /// Each entity carries entries for its own stacks, so expiry never fans
    /// out to propagation targets.
    pub fn sweep_expired(
        &self,
        world: &mut S::World,
        entity: EntityId,
    ) -> Result<EventResult<S>, BuffError> {
        self.transact(world, |session| self.sweep(session, entity))
    }

    pub(crate) fn sweep(
        &self,
        session: &mut Session<'_, S>,
        entity: EntityId,
    ) -> Result<EventResult<S>, BuffError> {
        let now = self.clock.now();
        let expired = session.entity_mut(entity)?.expiry.pop_expired(now);

        let mut result = EventResult::default();
        for entry in expired {
            tracing::debug!(
                entity = %entity,
                buff = %entry.buff_id,
                expires_at = %entry.expires_at,
                "buff expired"
            );
            let spec = self.registry.get_buff_spec(entry.buff_id)?;
            result.merge(self.inactivate(session, entity, spec, InactivationCause::Expiry)?);
        }
        Ok(result)
    }
}
