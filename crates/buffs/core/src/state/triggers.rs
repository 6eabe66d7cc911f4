//! Trigger indices.
//!
//! Each buffable keeps three of these (activation, deactivation, propagation).
//! An index maps a [`Trigger`] to the buffs waiting on it in registration
//! order. Binding is idempotent, so a buff id appears at most once per key.

use std::collections::HashMap;

use crate::schema::Schema;
use crate::spec::Trigger;

use super::BuffId;

#[derive(Clone, Debug, PartialEq)]
pub struct TriggerIndex<S: Schema> {
    bindings: HashMap<Trigger<S>, Vec<BuffId>>,
}

impl<S: Schema> Default for TriggerIndex<S> {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }
}

impl<S: Schema> TriggerIndex<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `buff` to every trigger in `triggers`.
    pub fn bind(&mut self, triggers: &[Trigger<S>], buff: BuffId) {
        for trigger in triggers {
            let bound = self.bindings.entry(*trigger).or_default();
            if !bound.contains(&buff) {
                bound.push(buff);
            }
        }
    }

    /// Unbinds `buff` from every trigger in `triggers`.
    pub fn unbind(&mut self, triggers: &[Trigger<S>], buff: BuffId) {
        for trigger in triggers {
            if let Some(bound) = self.bindings.get_mut(trigger) {
                bound.retain(|existing| *existing != buff);
                if bound.is_empty() {
                    self.bindings.remove(trigger);
                }
            }
        }
    }

    /// Unbinds `buff` from every key.
    pub fn unbind_all(&mut self, buff: BuffId) {
        self.bindings.retain(|_, bound| {
            bound.retain(|existing| *existing != buff);
            !bound.is_empty()
        });
    }

    /// Buffs bound to `trigger`, oldest binding first.
    pub fn bound(&self, trigger: &Trigger<S>) -> &[BuffId] {
        self.bindings.get(trigger).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, trigger: &Trigger<S>, buff: BuffId) -> bool {
        self.bound(trigger).contains(&buff)
    }

    /// Whether `buff` is bound to any key.
    pub fn binds(&self, buff: BuffId) -> bool {
        self.bindings.values().any(|bound| bound.contains(&buff))
    }

    /// Number of `(trigger, buff)` bindings.
    pub fn len(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
