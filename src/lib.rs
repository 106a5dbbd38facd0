//! valuebet: pre-match value-bet scanner.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod odds;
pub mod strategy;
pub mod engine;
pub mod storage;
pub mod notify;
pub mod dashboard;
