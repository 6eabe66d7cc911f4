/// Engine limits and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Maximum nesting of derivation recalculations triggered by a single
    /// attribute change before the engine gives up.
    pub max_recalculation_depth: usize,
}

impl EngineConfig {
    // ===== compile-time constants used as type parameters =====
    /// Maximum number of ancestor frames an event may carry.
    pub const MAX_EVENT_CHAIN: usize = 16;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_MAX_RECALCULATION_DEPTH: usize = 64;

    pub fn new() -> Self {
        Self {
            max_recalculation_depth: Self::DEFAULT_MAX_RECALCULATION_DEPTH,
        }
    }

    pub fn with_max_recalculation_depth(max_recalculation_depth: usize) -> Self {
        Self {
            max_recalculation_depth,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
