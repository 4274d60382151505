//! Script runtime error types
//!
//! Errors raised while initialising the embedded runtime, registering the
//! native bindings, and loading or constructing script modules. Errors
//! raised by contract calls on a constructed strategy are
//! [`strategy_host_core::StrategyError`]s.

use std::path::PathBuf;

use strategy_host_core::StrategyError;
use thiserror::Error;

/// Script runtime errors
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("script engine error")]
    Engine(#[source] anyhow::Error),

    #[error("invalid runtime configuration: {0}")]
    Configuration(String),

    #[error("failed to register native bindings")]
    Binding(#[source] anyhow::Error),

    #[error("cannot read script `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in module `{module}`")]
    Syntax {
        module: String,
        #[source]
        source: wat::Error,
    },

    #[error("module `{module}` failed to compile")]
    Compile {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module `{module}` has unresolved imports")]
    Link {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module `{module}` could not be instantiated")]
    Instantiate {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module `{module}` raised an error during top-level execution")]
    Runtime {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module name `{0}` is reserved for native bindings")]
    ReservedName(String),

    #[error("module `{module}` does not define class `{class}`")]
    ClassNotFound { module: String, class: String },

    #[error("constructor of `{class}` failed")]
    Construct {
        class: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

impl ScriptError {
    /// Returns true for errors raised while reading, compiling or executing a
    /// module's top level
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            ScriptError::Io { .. }
                | ScriptError::Syntax { .. }
                | ScriptError::Compile { .. }
                | ScriptError::Link { .. }
                | ScriptError::Instantiate { .. }
                | ScriptError::Runtime { .. }
                | ScriptError::ReservedName(_)
        )
    }
}

/// Type alias for script runtime results
pub type ScriptResult<T> = Result<T, ScriptError>;
