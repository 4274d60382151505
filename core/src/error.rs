//! Strategy error types
//!
//! Errors raised while a strategy is being driven: missing script overrides,
//! malformed boundary values, and failures raised by the strategy logic
//! itself.

use thiserror::Error;

/// Errors surfaced by strategy contract calls
#[derive(Error, Debug)]
pub enum StrategyError {
    /// The strategy has no override for a contract method
    #[error("pure virtual call: `{method}` is not implemented by `{class}`")]
    Unimplemented {
        /// Script-side class name
        class: String,
        /// Contract method that was invoked
        method: String,
    },

    /// An override exists but does not have the contract signature
    #[error("override `{export}` has the wrong signature")]
    Signature {
        /// Export that was resolved
        export: String,
        /// Runtime description of the mismatch
        #[source]
        source: anyhow::Error,
    },

    /// A side code that is neither BUY nor SELL crossed the boundary
    #[error("invalid side code {0}")]
    InvalidSide(i32),

    /// A value crossing the boundary could not be marshaled
    #[error("marshaling error: {0}")]
    Marshal(String),

    /// The strategy logic raised an error while running `method`
    #[error("strategy raised an error in `{method}`")]
    Runtime {
        /// Contract method that was running
        method: String,
        /// Error raised by the strategy or its runtime
        #[source]
        source: anyhow::Error,
    },
}

impl StrategyError {
    /// Wraps an error raised while running `method`
    pub fn runtime(method: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        StrategyError::Runtime {
            method: method.into(),
            source: source.into(),
        }
    }

    /// Returns true for errors caused by a missing or mistyped override
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            StrategyError::Unimplemented { .. } | StrategyError::Signature { .. }
        )
    }
}

/// Type alias for strategy results
pub type StrategyResult<T> = Result<T, StrategyError>;
