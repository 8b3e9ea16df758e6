//! Strategy interface and reference implementations.
//!
//! A strategy is chosen once from configuration and held by the engine as a
//! trait object. The engine calls `propose` inside the bet window with a
//! read-only view of the ledger, the live round and the budget.

pub mod fixed;
pub mod martingale;
pub mod same_before;

use anyhow::{bail, Result};
use rust_decimal::Decimal;

use crate::config::StrategyConfig;
use crate::engine::accountant::BudgetState;
use crate::types::{LedgerEntry, Position, Round, RoundStats};
use fixed::Fixed;
use martingale::Martingale;
use same_before::SameBefore;

/// Everything a strategy may look at. All borrowed, nothing mutable.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    /// Epoch being bet on.
    pub epoch: u64,
    /// Ledger snapshot, newest first.
    pub history: &'a [LedgerEntry],
    /// Live round, if it could be read.
    pub round: Option<&'a Round>,
    pub stats: Option<&'a RoundStats>,
    /// Latest settled round (`epoch - 2`).
    pub reference: Option<&'a Round>,
    pub budget: &'a BudgetState,
}

/// A wager the strategy wants placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub position: Position,
    pub stake: Decimal,
}

pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Decide position and stake, or `None` to sit this epoch out.
    fn propose(&mut self, ctx: &StrategyContext<'_>) -> Option<Proposal>;
}

/// Build the configured strategy.
pub fn from_config(cfg: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    let sizing = Martingale::new(cfg.base_bet, cfg.factor);
    let strategy: Box<dyn Strategy> = match cfg.name.to_lowercase().as_str() {
        "same-before" | "samebefore" => Box::new(SameBefore::new(sizing, cfg.safe_bet)),
        "bullish" => Box::new(Fixed::new(Position::Bull, sizing)),
        "bearish" => Box::new(Fixed::new(Position::Bear, sizing)),
        other => bail!("Unknown strategy: {other}"),
    };
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cfg(name: &str) -> StrategyConfig {
        StrategyConfig {
            name: name.into(),
            base_bet: dec!(0.01),
            factor: dec!(2),
            safe_bet: Decimal::ZERO,
        }
    }

    #[test]
    fn test_from_config() {
        assert_eq!(from_config(&cfg("Same-Before")).unwrap().name(), "same-before");
        assert_eq!(from_config(&cfg("bullish")).unwrap().name(), "bullish");
        assert_eq!(from_config(&cfg("bearish")).unwrap().name(), "bearish");
        assert!(from_config(&cfg("random")).is_err());
    }
}
