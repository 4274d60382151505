//! # Strategy Host
//!
//! Native order-execution host for trading strategies written as WebAssembly
//! scripts. The host owns an order server, loads a user script into an
//! embedded runtime, instantiates the script's `Strategy` class and drives
//! its `eval`. Orders the script submits are acknowledged synchronously and
//! handed back to the script's `on_order`.
//!
//! ## Architecture
//!
//! - `strategy-host-core`: order model, order server and the strategy contract
//! - `script-bridge`: embedded runtime, native bindings, module loader and the
//!   adapter that implements the contract by calling into a script
//! - this crate: configuration, the host lifecycle and the CLI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strategy_host::prelude::*;
//!
//! fn main() -> Result<(), HostError> {
//!     let config = HostConfig::load(None)?;
//!     let report = Host::new(config).run()?;
//!
//!     for ack in &report.orders {
//!         println!("{}", ack.order);
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]

pub mod config;
pub mod error;
pub mod host;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::{HostConfig, LoggingConfig};
    pub use crate::error::{HostError, HostResult};
    pub use crate::host::{Host, HostPhase, RunReport};
    pub use script_bridge::RuntimeConfig;
    pub use strategy_host_core::{Order, OrderServer, Side};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub const BUILD_INFO: &str = concat!("Strategy Host v", env!("CARGO_PKG_VERSION"));
