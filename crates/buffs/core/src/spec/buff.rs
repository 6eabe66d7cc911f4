//! Buff specifications and the modifiers they carry.
//!
//! A [`BuffSpec`] is an immutable template: it is declared once, registered in
//! the [`Registry`](super::Registry), and read by the engine every time the buff
//! is added, triggered, propagated or removed.

use crate::schema::Schema;
use crate::state::BuffId;

/// How a modifier combines with an attribute accumulator.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operator {
    /// Added to `mod_add`.
    #[strum(serialize = "+")]
    Add,
    /// Added to `mod_mult` (0.5 = +50%).
    #[strum(serialize = "%")]
    Multiply,
}

/// A single `(operator, value, attribute)` change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Modifier<S: Schema> {
    pub operator: Operator,
    pub value: f64,
    pub attribute: S::Attribute,
}

impl<S: Schema> Modifier<S> {
    pub fn new(operator: Operator, value: f64, attribute: S::Attribute) -> Self {
        Self {
            operator,
            value,
            attribute,
        }
    }

    pub fn add(value: f64, attribute: S::Attribute) -> Self {
        Self::new(Operator::Add, value, attribute)
    }

    pub fn multiply(value: f64, attribute: S::Attribute) -> Self {
        Self::new(Operator::Multiply, value, attribute)
    }

    /// The same modifier with its value negated.
    pub fn inverse(&self) -> Self {
        Self {
            value: -self.value,
            ..*self
        }
    }
}

/// Lifetime of one stack of a buff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuffDuration {
    #[default]
    Infinite,
    Seconds(u64),
}

/// Event binding key inside a trigger index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger<S: Schema> {
    /// Fires whenever any buff is added to the entity.
    OnAdd,
    /// Fires on a host event of the given kind.
    Event(S::EventKind),
}

/// Immutable template describing a buff.
#[derive(Clone, Debug, PartialEq)]
pub struct BuffSpec<S: Schema> {
    pub id: BuffId,
    pub name: Option<String>,
    pub modifiers: Vec<Modifier<S>>,
    /// Condition expressions, all of which must hold (`["not"] name [arg]*`).
    pub conditions: Vec<String>,
    pub activation_triggers: Vec<S::EventKind>,
    pub deactivation_triggers: Vec<S::EventKind>,
    pub propagation_triggers: Vec<S::EventKind>,
    /// Same-entity derivation target.
    pub to_attribute: Option<S::Attribute>,
    /// Cross-entity derivation target, fed by the propagation source.
    pub propagates_to_attribute: Option<S::Attribute>,
    pub propagates_to: Vec<S::EntityKind>,
    pub propagation_conditions: Vec<String>,
    pub max_stack: u32,
    pub duration: BuffDuration,
}

impl<S: Schema> BuffSpec<S> {
    pub fn new(id: BuffId) -> Self {
        Self {
            id,
            name: None,
            modifiers: Vec::new(),
            conditions: Vec::new(),
            activation_triggers: Vec::new(),
            deactivation_triggers: Vec::new(),
            propagation_triggers: Vec::new(),
            to_attribute: None,
            propagates_to_attribute: None,
            propagates_to: Vec::new(),
            propagation_conditions: Vec::new(),
            max_stack: 1,
            duration: BuffDuration::Infinite,
        }
    }

    pub fn propagates(&self) -> bool {
        !self.propagates_to.is_empty()
    }

    /// True when the buff has no explicit activation triggers and fires on add.
    pub fn auto_triggers(&self) -> bool {
        self.activation_triggers.is_empty()
    }

    /// Whether modifications of this buff apply to an entity of `kind`.
    ///
    /// A propagating buff only touches its declared target kinds; its source
    /// tracks activation and stacks without being modified.
    pub fn can_target(&self, kind: S::EntityKind) -> bool {
        !self.propagates() || self.propagates_to.contains(&kind)
    }

    /// The attribute a modifier of this buff ends up changing.
    pub fn affected_attribute(&self, modifier: &Modifier<S>) -> S::Attribute {
        self.propagates_to_attribute
            .or(self.to_attribute)
            .unwrap_or(modifier.attribute)
    }

    pub fn derives(&self) -> bool {
        self.to_attribute.is_some() || self.propagates_to_attribute.is_some()
    }

    pub fn triggers(&self) -> Vec<Trigger<S>> {
        if self.activation_triggers.is_empty() {
            return vec![Trigger::OnAdd];
        }
        self.activation_triggers
            .iter()
            .copied()
            .map(Trigger::Event)
            .collect()
    }

    /// Deactivation bindings; a conditional buff without explicit ones is
    /// re-checked on its activation triggers.
    pub fn remove_triggers(&self) -> Vec<Trigger<S>> {
        if !self.conditions.is_empty() && self.deactivation_triggers.is_empty() {
            return self.triggers();
        }
        self.deactivation_triggers
            .iter()
            .copied()
            .map(Trigger::Event)
            .collect()
    }

    pub fn propagation_triggers_or_default(&self) -> Vec<Trigger<S>> {
        if self.propagation_triggers.is_empty() {
            return vec![Trigger::OnAdd];
        }
        self.propagation_triggers
            .iter()
            .copied()
            .map(Trigger::Event)
            .collect()
    }

    /// Whether activation triggers are bound again once the last stack is gone.
    ///
    /// An unconditional on-add buff would otherwise fire again on the next
    /// unrelated add.
    pub fn rearms(&self) -> bool {
        !self.activation_triggers.is_empty() || !self.conditions.is_empty()
    }

    // ===== builder =====

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn modify(mut self, operator: Operator, value: f64, attribute: S::Attribute) -> Self {
        self.modifiers.push(Modifier::new(operator, value, attribute));
        self
    }

    pub fn whenever(mut self, event: S::EventKind) -> Self {
        self.activation_triggers.push(event);
        self
    }

    pub fn until(mut self, event: S::EventKind) -> Self {
        self.deactivation_triggers.push(event);
        self
    }

    pub fn just_if(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn to_attribute(mut self, attribute: S::Attribute) -> Self {
        self.to_attribute = Some(attribute);
        self
    }

    pub fn propagates_to_attribute(mut self, attribute: S::Attribute) -> Self {
        self.propagates_to_attribute = Some(attribute);
        self
    }

    pub fn propagates_to(mut self, kinds: impl IntoIterator<Item = S::EntityKind>) -> Self {
        self.propagates_to.extend(kinds);
        self
    }

    pub fn propagates_when(mut self, event: S::EventKind) -> Self {
        self.propagation_triggers.push(event);
        self
    }

    pub fn only_propagates_if(mut self, condition: impl Into<String>) -> Self {
        self.propagation_conditions.push(condition.into());
        self
    }

    pub fn stacks(mut self, max_stack: u32) -> Self {
        self.max_stack = max_stack.max(1);
        self
    }

    pub fn lasts(mut self, seconds: u64) -> Self {
        self.duration = BuffDuration::Seconds(seconds);
        self
    }
}
