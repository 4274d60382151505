//! Host error types

use script_bridge::ScriptError;
use strategy_host_core::StrategyError;
use thiserror::Error;

use crate::host::HostPhase;

/// Errors that abort a host run
#[derive(Error, Debug)]
pub enum HostError {
    /// A lifecycle step was called out of order
    #[error("invalid host transition from {from} to {to}")]
    InvalidTransition {
        /// Phase the host was in
        from: HostPhase,
        /// Phase the step would have entered
        to: HostPhase,
    },

    /// State a step depends on is absent
    #[error("host has no {0}")]
    Missing(&'static str),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error")]
    Config(#[from] config::ConfigError),

    /// Loading the script, registering bindings or constructing the strategy failed
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The strategy raised an error while being evaluated
    #[error("strategy evaluation failed")]
    Strategy(#[from] StrategyError),
}

/// Type alias for host results
pub type HostResult<T> = Result<T, HostError>;
