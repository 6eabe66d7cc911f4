//! Per-entity attribute accumulators.
//!
//! Each attribute keeps two accumulators and derives its final value on
//! demand:
//!
//! ```text
//! final = mod_add × (1 + mod_mult)
//! ```
//!
//! Every applied [`BuffModification`] is recorded in the history of the
//! attribute it changed, keyed by [`ModificationId`], so removal is the exact
//! inverse of application and never rescans. An attribute that feeds a
//! same-entity derivation also records which modifications were derived from
//! it, grouped by the attribute they changed.

use std::collections::BTreeMap;

use crate::event::BuffEvent;
use crate::schema::Schema;
use crate::spec::{BuffSpec, Modifier, Operator};

use super::{BuffId, EntityId, ModificationId};

/// One concrete application of a modifier to one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct BuffModification<S: Schema> {
    pub id: ModificationId,
    pub buff_id: BuffId,
    pub source_event: BuffEvent<S>,
    /// The modifier as declared on the spec.
    pub modifier: Modifier<S>,
    /// Flat-add snapshot produced by a derivation, applied instead of `modifier`.
    pub derivated: Option<Modifier<S>>,
    /// Stack index (1-based) this modification belongs to.
    pub stack: u32,
    /// Entity whose attribute a cross-entity derivation reads.
    pub derived_from: Option<EntityId>,
}

impl<S: Schema> BuffModification<S> {
    /// The modifier actually applied to the attribute store.
    pub fn applied(&self) -> &Modifier<S> {
        self.derivated.as_ref().unwrap_or(&self.modifier)
    }
}

/// Accumulator and history for one attribute of one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute<S: Schema> {
    base: f64,
    mod_add: f64,
    mod_mult: f64,
    history: BTreeMap<ModificationId, BuffModification<S>>,
    derivations: BTreeMap<S::Attribute, Vec<ModificationId>>,
}

impl<S: Schema> Default for Attribute<S> {
    fn default() -> Self {
        Self {
            base: 0.0,
            mod_add: 0.0,
            mod_mult: 0.0,
            history: BTreeMap::new(),
            derivations: BTreeMap::new(),
        }
    }
}

impl<S: Schema> Attribute<S> {
    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn mod_add(&self) -> f64 {
        self.mod_add
    }

    pub fn mod_mult(&self) -> f64 {
        self.mod_mult
    }

    pub fn final_value(&self) -> f64 {
        self.mod_add * (1.0 + self.mod_mult)
    }

    pub fn history(&self) -> &BTreeMap<ModificationId, BuffModification<S>> {
        &self.history
    }

    /// Modifications derived from this attribute, keyed by the attribute they changed.
    pub fn derivations(&self) -> &BTreeMap<S::Attribute, Vec<ModificationId>> {
        &self.derivations
    }

    pub fn apply_modifier(&mut self, modifier: &Modifier<S>) -> f64 {
        match modifier.operator {
            Operator::Add => self.mod_add += modifier.value,
            Operator::Multiply => self.mod_mult += modifier.value,
        }
        self.final_value()
    }

    pub fn remove_modifier(&mut self, modifier: &Modifier<S>) -> f64 {
        self.apply_modifier(&modifier.inverse())
    }

    fn set_base(&mut self, value: f64) {
        self.mod_add += value - self.base;
        self.base = value;
    }

    fn unlink_derivation(&mut self, target: S::Attribute, id: ModificationId) {
        if let Some(ids) = self.derivations.get_mut(&target) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.derivations.remove(&target);
            }
        }
    }
}

/// All attributes of one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeStore<S: Schema> {
    attributes: BTreeMap<S::Attribute, Attribute<S>>,
    next_modification: u64,
}

impl<S: Schema> Default for AttributeStore<S> {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            next_modification: 1,
        }
    }
}

impl<S: Schema> AttributeStore<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Final value of `attribute`; untouched attributes are zero.
    pub fn value(&self, attribute: S::Attribute) -> f64 {
        self.attributes
            .get(&attribute)
            .map_or(0.0, Attribute::final_value)
    }

    pub fn get(&self, attribute: S::Attribute) -> Option<&Attribute<S>> {
        self.attributes.get(&attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S::Attribute, &Attribute<S>)> {
        self.attributes.iter()
    }

    fn entry(&mut self, attribute: S::Attribute) -> &mut Attribute<S> {
        self.attributes.entry(attribute).or_default()
    }

    /// Sets the unbuffed value of `attribute`, keeping applied modifications.
    pub fn set_base(&mut self, attribute: S::Attribute, value: f64) {
        self.entry(attribute).set_base(value);
    }

    pub fn next_modification_id(&mut self) -> ModificationId {
        let id = ModificationId(self.next_modification);
        self.next_modification += 1;
        id
    }

    /// Applies a modification and records it in history.
    ///
    /// Same-entity derivations are linked from their source attribute so that
    /// recalculation finds dependents directly. Cross-entity ones
    /// (`derived_from` set) read a remote attribute and are not linked here.
    pub fn apply(&mut self, modification: BuffModification<S>) {
        let applied = *modification.applied();
        self.entry(applied.attribute).apply_modifier(&applied);

        if modification.derivated.is_some() && modification.derived_from.is_none() {
            self.entry(modification.modifier.attribute)
                .derivations
                .entry(applied.attribute)
                .or_default()
                .push(modification.id);
        }

        self.entry(applied.attribute)
            .history
            .insert(modification.id, modification);
    }

    /// Reverts and forgets the modification `id` recorded on `attribute`.
    pub fn remove(
        &mut self,
        attribute: S::Attribute,
        id: ModificationId,
    ) -> Option<BuffModification<S>> {
        let slot = self.attributes.get_mut(&attribute)?;
        let modification = slot.history.remove(&id)?;
        slot.remove_modifier(modification.applied());

        if modification.derivated.is_some() && modification.derived_from.is_none() {
            if let Some(source) = self.attributes.get_mut(&modification.modifier.attribute) {
                source.unlink_derivation(attribute, id);
            }
        }
        Some(modification)
    }

    pub fn modification(
        &self,
        attribute: S::Attribute,
        id: ModificationId,
    ) -> Option<&BuffModification<S>> {
        self.attributes.get(&attribute)?.history.get(&id)
    }

    /// Swaps the derived snapshot of modification `id` for `fresh`.
    ///
    /// Returns `false` if no such modification is recorded.
    pub fn rederive(
        &mut self,
        attribute: S::Attribute,
        id: ModificationId,
        fresh: Modifier<S>,
    ) -> bool {
        let Some(slot) = self.attributes.get_mut(&attribute) else {
            return false;
        };
        let Some(stale) = slot.history.get(&id).and_then(|m| m.derivated) else {
            return false;
        };
        slot.remove_modifier(&stale);
        slot.apply_modifier(&fresh);
        if let Some(modification) = slot.history.get_mut(&id) {
            modification.derivated = Some(fresh);
        }
        true
    }

    /// `(target attribute, modification)` pairs derived from `source`.
    pub fn dependents_of(&self, source: S::Attribute) -> Vec<(S::Attribute, ModificationId)> {
        self.attributes
            .get(&source)
            .map(|attribute| {
                attribute
                    .derivations
                    .iter()
                    .flat_map(|(target, ids)| ids.iter().map(move |id| (*target, *id)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `to` already feeds `from` through same-entity derivations, so a
    /// new derivation `from → to` would close a cycle.
    pub fn derivation_reaches(&self, to: S::Attribute, from: S::Attribute) -> bool {
        let mut pending = vec![to];
        let mut seen = Vec::new();
        while let Some(attribute) = pending.pop() {
            if attribute == from {
                return true;
            }
            if seen.contains(&attribute) {
                continue;
            }
            seen.push(attribute);
            if let Some(slot) = self.attributes.get(&attribute) {
                pending.extend(slot.derivations.keys().copied());
            }
        }
        false
    }

    /// Every modification `spec` could have recorded on this entity.
    ///
    /// Only the attributes the buff can touch are scanned: the derived target
    /// if the buff derives, each modifier's attribute otherwise.
    pub fn modifications_of(&self, spec: &BuffSpec<S>) -> Vec<(S::Attribute, ModificationId)> {
        let mut attributes: Vec<S::Attribute> = spec
            .modifiers
            .iter()
            .map(|modifier| spec.affected_attribute(modifier))
            .collect();
        attributes.sort();
        attributes.dedup();

        attributes
            .into_iter()
            .filter_map(|attribute| self.attributes.get(&attribute).map(|slot| (attribute, slot)))
            .flat_map(|(attribute, slot)| {
                slot.history
                    .values()
                    .filter(|modification| modification.buff_id == spec.id)
                    .map(move |modification| (attribute, modification.id))
            })
            .collect()
    }
}
