//! Martingale stake sizing.
//!
//! Base stake after a win or with no resolved history; otherwise the
//! stake of the last decided wager times `factor`.

use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{LedgerEntry, Reward};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Martingale {
    base: Decimal,
    factor: Decimal,
}

impl Martingale {
    pub fn new(base: Decimal, factor: Decimal) -> Self {
        Self { base, factor }
    }

    pub fn base(&self) -> Decimal {
        self.base
    }

    pub fn factor(&self) -> Decimal {
        self.factor
    }

    /// Next stake given a newest-first history.
    ///
    /// Refunded draws (reward exactly zero) are not decisions and are skipped.
    /// A non-positive factor disables doubling.
    pub fn next_stake(&self, history: &[LedgerEntry]) -> Decimal {
        let last = history.iter().find_map(|e| match e.reward {
            Reward::Resolved(r) if !r.is_zero() => Some((e.amount, r)),
            _ => None,
        });

        let stake = match last {
            None => self.base,
            Some((_, reward)) if reward > Decimal::ZERO => self.base,
            Some(_) if self.factor <= Decimal::ZERO => self.base,
            Some((amount, _)) => amount * self.factor,
        };
        debug!(stake = %stake, "Martingale stake");
        stake
    }
}

/// Wallet budget needed to survive `rounds` consecutive losses:
/// `base * (1 + factor + factor^2 + ... + factor^(rounds-1))`.
///
/// Saturates at `Decimal::MAX` once the series leaves the decimal range.
pub fn required_budget(base: Decimal, factor: Decimal, rounds: u32) -> Decimal {
    let mut stake = base;
    let mut total = Decimal::ZERO;
    for _ in 0..rounds {
        let Some(next) = total.checked_add(stake) else {
            return Decimal::MAX;
        };
        total = next;
        stake = stake.checked_mul(factor).unwrap_or(Decimal::MAX);
    }
    total
}
