//! Script bridge crate hosting strategies written as WebAssembly scripts.
//!
//! A script is loaded as a named module, a class is extracted from its
//! exports, and the constructed object is driven through the strategy
//! contract by a [`ScriptStrategy`] that forwards each call into the script.

pub mod bindings;
pub mod bridge;
pub mod config;
pub mod error;
pub mod loader;
pub mod marshal;
pub mod runtime;

pub use bridge::{ContractMethod, InstanceScope, MethodTable, ScriptScope, ScriptStrategy};
pub use config::RuntimeConfig;
pub use error::{ScriptError, ScriptResult};
pub use loader::{import, load_module, ModuleHandle, ScriptObject, StrategyClass};
pub use runtime::{engine, HostState, Namespace, RuntimeStats, ScriptRuntime};
