//! # Runtime Configuration
//!
//! Resource limits applied to each script runtime.

use serde::{Deserialize, Serialize};

use crate::error::{ScriptError, ScriptResult};

/// One WebAssembly page
const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Limits for the per-run script store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fuel available to scripts for the whole run; `None` means unmetered
    pub fuel_limit: Option<u64>,
    /// Maximum linear memory a single script may grow to, in bytes
    pub max_memory_bytes: usize,
    /// Maximum number of module instances alive in one runtime
    pub max_instances: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fuel_limit: Some(10_000_000),
            max_memory_bytes: 16 * 1024 * 1024, // 16MB
            max_instances: 64,
        }
    }
}

impl RuntimeConfig {
    /// Checks the limits are usable
    pub fn validate(&self) -> ScriptResult<()> {
        if self.fuel_limit == Some(0) {
            return Err(ScriptError::Configuration(
                "fuel_limit must be positive or unset".into(),
            ));
        }

        if self.max_memory_bytes < WASM_PAGE_SIZE {
            return Err(ScriptError::Configuration(format!(
                "max_memory_bytes must be at least one page ({WASM_PAGE_SIZE} bytes)"
            )));
        }

        if self.max_instances == 0 {
            return Err(ScriptError::Configuration(
                "max_instances must be positive".into(),
            ));
        }

        Ok(())
    }
}
