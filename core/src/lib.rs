//! # Strategy Host Core
//!
//! Order model, order server and the strategy contract shared by native
//! strategies and the script bridge.
//!
//! ```rust
//! use strategy_host_core::{OrderServer, Side, OrderRequest};
//! use strategy_host_core::strategies::ReplayStrategy;
//! use strategy_host_core::Strategy;
//!
//! let server = OrderServer::new();
//! let mut strategy = ReplayStrategy::new(
//!     "demo",
//!     &server,
//!     vec![OrderRequest::new("GOOG", Side::Buy, 100, 759.11)],
//! );
//! strategy.eval().unwrap();
//! assert_eq!(strategy.fills()[0].order_id(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod error;
pub mod order_server;
pub mod strategies;
pub mod strategy;
pub mod types;

pub use error::{StrategyError, StrategyResult};
pub use order_server::OrderServer;
pub use strategy::{SendOrder, Strategy};
pub use types::{Acknowledgement, Order, OrderId, OrderRequest, Side, Symbol};
