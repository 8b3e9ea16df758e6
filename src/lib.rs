//! UPDOWN: epoch lifecycle and betting ledger engine for up/down
//! prediction markets.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod chain;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod storage;
pub mod strategy;
pub mod types;
