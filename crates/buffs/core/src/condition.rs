//! Condition expressions gating activation and propagation.
//!
//! A condition is a flat whitespace-separated string:
//!
//! ```text
//! ["not"] predicate_name [arg]*
//! ```
//!
//! Numeric-looking arguments are handed to the predicate as
//! [`ConditionArg::Number`], everything else as [`ConditionArg::Text`]. A
//! buff's condition list is a conjunction; `not` negates one predicate only.

use std::fmt;

use crate::error::BuffError;
use crate::event::BuffEvent;
use crate::schema::{BuffWorld, Schema};
use crate::state::Buffable;

/// Predicate registered under a condition name.
pub type ConditionFn<S> =
    Box<dyn Fn(&ConditionContext<'_, S>, &[ConditionArg]) -> bool + Send + Sync>;

/// A parsed condition argument.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionArg {
    Number(f64),
    Text(String),
}

impl ConditionArg {
    fn parse(token: &str) -> Self {
        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            _ => Self::Text(token.to_owned()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for ConditionArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// A condition string split into its parts.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionExpr {
    pub name: String,
    pub args: Vec<ConditionArg>,
    /// `false` when the expression is prefixed with `not`.
    pub expected: bool,
}

impl ConditionExpr {
    pub const NEGATION: &'static str = "not";

    pub fn parse(expr: &str) -> Result<Self, BuffError> {
        let mut tokens = expr.split_whitespace();
        let mut name = tokens.next();
        let mut expected = true;

        if name == Some(Self::NEGATION) {
            expected = false;
            name = tokens.next();
        }

        let name = name.ok_or_else(|| BuffError::ConditionNotFound(expr.to_owned()))?;

        Ok(Self {
            name: name.to_owned(),
            args: tokens.map(ConditionArg::parse).collect(),
            expected,
        })
    }
}

/// Everything a predicate may inspect while being evaluated.
///
/// The world is borrowed immutably: predicates read attribute values through
/// [`Buffable::attribute_value`], which does not sweep expired buffs.
pub struct ConditionContext<'a, S: Schema> {
    pub world: &'a S::World,
    pub event: &'a BuffEvent<S>,
    pub entity: &'a Buffable<S>,
}

impl<'a, S: Schema> ConditionContext<'a, S> {
    pub fn new(world: &'a S::World, event: &'a BuffEvent<S>) -> Result<Self, BuffError> {
        let entity = world
            .buffable(event.entity())
            .ok_or(BuffError::EntityNotFound(event.entity()))?;
        Ok(Self {
            world,
            event,
            entity,
        })
    }
}
