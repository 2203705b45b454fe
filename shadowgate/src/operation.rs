//! Handler results.

use serde_json::Value;

/// What an operation handler produced.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    /// The JSON object sent to the client under `output`.
    pub output: Value,
    /// Whether the handler changed ledger state.
    pub side_effects_applied: bool,
}

impl OperationResult {
    /// A result that changed state.
    #[must_use]
    pub const fn applied(output: Value) -> Self {
        Self {
            output,
            side_effects_applied: true,
        }
    }

    /// A read-only result.
    #[must_use]
    pub const fn read_only(output: Value) -> Self {
        Self {
            output,
            side_effects_applied: false,
        }
    }
}
