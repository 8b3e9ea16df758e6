//! Core engine: epoch tracking, wager execution, settlement and claims.
//!
//! - `retry`: bounded retry around remote reads
//! - `tracker`: epoch transitions and the estimated bet window
//! - `stats`: pool ratios, payouts and milestones per round
//! - `evaluator`: win / loss / draw and signed reward
//! - `ledger`: one wager record per epoch
//! - `executor`: places wagers
//! - `claimer`: resolves settled wagers and batches claims
//! - `accountant`: budget state and stop conditions
//! - `cycle`: the control loop tying it together

pub mod accountant;
pub mod claimer;
pub mod cycle;
pub mod evaluator;
pub mod executor;
pub mod ledger;
pub mod retry;
pub mod stats;
pub mod tracker;

pub use cycle::{Engine, EngineSnapshot, SharedSnapshot, TickReport};
pub use ledger::Ledger;
pub use retry::RetryPolicy;
