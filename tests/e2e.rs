//! End-to-end test suite entry point
//!
//! Run with: cargo test --test e2e

#[path = "host/host_flow_tests.rs"]
mod host_flow_tests;

#[path = "host/cli_tests.rs"]
mod cli_tests;
