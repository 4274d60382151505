//! Built-in native strategy implementations
//!
//! Native strategies implement [`crate::Strategy`] directly in Rust and run
//! against the same order server as script-resident ones.

pub mod replay;

pub use replay::ReplayStrategy;
