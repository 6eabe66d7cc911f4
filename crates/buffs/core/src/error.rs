//! Error infrastructure for buffs-core.
//!
//! Every fallible engine operation returns [`BuffError`]. Variants carry the
//! ids involved so callers can log or surface them without extra lookups.
//!
//! A failing call leaves every entity it touched as it was before the call,
//! including failures deep inside a cascade such as
//! [`BuffError::RecalculationDepthExceeded`] or [`BuffError::EventChainTooDeep`].

use crate::state::{BuffId, EntityId};

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: the call may succeed later without changes
/// - **Validation**: invalid input, should not retry without changes
/// - **Internal**: unexpected state inconsistency
/// - **Fatal**: engine state can no longer be trusted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    Recoverable,
    Validation,
    Internal,
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates an internal bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Errors surfaced by the buff engine and registry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuffError {
    #[error("no buff spec registered under {0}")]
    SpecNotFound(BuffId),

    #[error("no condition registered for `{0}`")]
    ConditionNotFound(String),

    #[error("{entity} received {buff} from {owner}, only the source may remove it")]
    NotSourceOwner {
        entity: EntityId,
        buff: BuffId,
        owner: EntityId,
    },

    #[error("entity {0} is not present in the world")]
    EntityNotFound(EntityId),

    #[error("derivation into {attribute} on {entity} would form a cycle")]
    DerivationCycle { entity: EntityId, attribute: String },

    #[error("derivation recalculation exceeded depth {depth}")]
    RecalculationDepthExceeded { depth: usize },

    #[error("event chain exceeded {depth} frames")]
    EventChainTooDeep { depth: usize },

    #[error("engine invariant violated: {0}")]
    #[cfg_attr(feature = "serde", serde(skip))]
    InvariantViolated(&'static str),
}

impl BuffError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SpecNotFound(_)
            | Self::ConditionNotFound(_)
            | Self::EntityNotFound(_)
            | Self::DerivationCycle { .. } => ErrorSeverity::Validation,
            Self::NotSourceOwner { .. } => ErrorSeverity::Recoverable,
            Self::RecalculationDepthExceeded { .. } | Self::EventChainTooDeep { .. } => {
                ErrorSeverity::Internal
            }
            Self::InvariantViolated(_) => ErrorSeverity::Fatal,
        }
    }

    /// Stable identifier for this variant, for metrics and tests.
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::SpecNotFound(_) => "BUFF_SPEC_NOT_FOUND",
            Self::ConditionNotFound(_) => "BUFF_CONDITION_NOT_FOUND",
            Self::NotSourceOwner { .. } => "BUFF_NOT_SOURCE_OWNER",
            Self::EntityNotFound(_) => "BUFF_ENTITY_NOT_FOUND",
            Self::DerivationCycle { .. } => "BUFF_DERIVATION_CYCLE",
            Self::RecalculationDepthExceeded { .. } => "BUFF_RECALCULATION_DEPTH_EXCEEDED",
            Self::EventChainTooDeep { .. } => "BUFF_EVENT_CHAIN_TOO_DEEP",
            Self::InvariantViolated(_) => "BUFF_INVARIANT_VIOLATED",
        }
    }
}
