//! Same-before: bet the direction the latest settled round went.
//!
//! The reference round is `epoch - 2`, the newest one with a close price.
//! A drawn reference round is followed with a bear wager. Sizing is
//! martingale, or recovery sizing when the factor is zero: stake enough that
//! a win at the current payout covers the recent losses plus one base stake.

use rust_decimal::Decimal;
use tracing::debug;

use super::martingale::Martingale;
use super::{Proposal, Strategy, StrategyContext};
use crate::types::Position;

pub struct SameBefore {
    sizing: Martingale,
    safe_bet: Decimal,
}

impl SameBefore {
    pub fn new(sizing: Martingale, safe_bet: Decimal) -> Self {
        Self { sizing, safe_bet }
    }

    fn recovery_stake(&self, ctx: &StrategyContext<'_>, position: Position) -> Decimal {
        let base = self.sizing.base();
        let Some(payout) = ctx.stats.and_then(|s| s.payout_for(position)) else {
            return base;
        };

        let mut multiplier = payout - self.safe_bet;
        if multiplier < Decimal::ONE {
            multiplier += self.safe_bet;
        }
        let edge = multiplier - Decimal::ONE;
        if edge <= Decimal::ZERO {
            return base;
        }

        let budget = ctx.budget;
        let loss = if budget.estimated_gain >= Decimal::ZERO {
            budget.recent_loss
        } else {
            budget.recent_loss.max(budget.estimated_gain.abs())
        };

        let stake = ((loss + base) / edge).round_dp(8);
        debug!(payout = %payout, loss = %loss, stake = %stake, "Recovery stake");
        stake.max(base)
    }
}

impl Strategy for SameBefore {
    fn name(&self) -> &str {
        "same-before"
    }

    fn propose(&mut self, ctx: &StrategyContext<'_>) -> Option<Proposal> {
        let reference = ctx.reference?;
        let position = reference.winning_side().unwrap_or(Position::Bear);

        let stake = if self.sizing.factor().is_zero() {
            self.recovery_stake(ctx, position)
        } else {
            self.sizing.next_stake(ctx.history)
        };

        Some(Proposal { position, stake })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::accountant::BudgetState;
    use crate::engine::stats::RoundStatsCalculator;
    use crate::types::Round;
    use rust_decimal_macros::dec;

    fn propose(
        strategy: &mut SameBefore,
        reference: Option<&Round>,
        budget: &BudgetState,
    ) -> Option<Proposal> {
        let live = Round::sample(12);
        let stats = RoundStatsCalculator::new(10).compute(&live);
        let ctx = StrategyContext {
            epoch: 12,
            history: &[],
            round: Some(&live),
            stats: Some(&stats),
            reference,
            budget,
        };
        strategy.propose(&ctx)
    }

    #[test]
    fn test_follows_reference_direction() {
        let mut s = SameBefore::new(Martingale::new(dec!(0.01), dec!(2)), Decimal::ZERO);
        let budget = BudgetState::default();

        let up = Round::sample(10);
        assert_eq!(propose(&mut s, Some(&up), &budget).unwrap().position, Position::Bull);

        let mut down = Round::sample(10);
        down.close_price = dec!(250);
        assert_eq!(propose(&mut s, Some(&down), &budget).unwrap().position, Position::Bear);

        let mut flat = Round::sample(10);
        flat.close_price = flat.lock_price;
        assert_eq!(propose(&mut s, Some(&flat), &budget).unwrap().position, Position::Bear);
    }

    #[test]
    fn test_no_reference_sits_out() {
        let mut s = SameBefore::new(Martingale::new(dec!(0.01), dec!(2)), Decimal::ZERO);
        assert!(propose(&mut s, None, &BudgetState::default()).is_none());
    }

    #[test]
    fn test_recovery_sizing() {
        // Live bull payout is 10 / 2 = 5, so each unit staked nets 4.
        let mut s = SameBefore::new(Martingale::new(dec!(1), Decimal::ZERO), Decimal::ZERO);
        let budget = BudgetState {
            recent_loss: dec!(7),
            estimated_gain: dec!(-3),
            ..Default::default()
        };
        let up = Round::sample(10);
        let proposal = propose(&mut s, Some(&up), &budget).unwrap();
        assert_eq!(proposal.stake, dec!(2));
    }

    #[test]
    fn test_recovery_uses_deeper_drawdown() {
        let mut s = SameBefore::new(Martingale::new(dec!(1), Decimal::ZERO), Decimal::ZERO);
        let budget = BudgetState {
            recent_loss: dec!(3),
            estimated_gain: dec!(-11),
            ..Default::default()
        };
        let up = Round::sample(10);
        assert_eq!(propose(&mut s, Some(&up), &budget).unwrap().stake, dec!(3));
    }

    #[test]
    fn test_recovery_never_below_base() {
        let mut s = SameBefore::new(Martingale::new(dec!(1), Decimal::ZERO), dec!(0.5));
        let up = Round::sample(10);
        let proposal = propose(&mut s, Some(&up), &BudgetState::default()).unwrap();
        assert_eq!(proposal.stake, dec!(1));
    }
}
