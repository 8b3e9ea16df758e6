//! Settlement evaluation: outcome and signed reward for one wager.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{LedgerEntry, Outcome, Round, RoundStats};

/// How an exact tie (`lock_price == close_price`) pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawRule {
    /// Stake is forfeit for every position.
    #[default]
    Loss,
    /// Stake is returned; reward is zero and the epoch is claimable.
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub reward: Decimal,
}

#[derive(Debug, Clone)]
pub struct ResultEvaluator {
    draw_rule: DrawRule,
}

impl ResultEvaluator {
    pub fn new(draw_rule: DrawRule) -> Self {
        Self { draw_rule }
    }

    pub fn draw_rule(&self) -> DrawRule {
        self.draw_rule
    }

    /// Evaluate `entry` against a settled `round`.
    ///
    /// A win pays `stake * payout - stake` using the pool-wide payout of the
    /// winning side; a loss is `-stake`. A winning side with no defined
    /// payout means the pool data is inconsistent.
    pub fn evaluate(
        &self,
        round: &Round,
        stats: &RoundStats,
        entry: &LedgerEntry,
    ) -> Result<Evaluation, EngineError> {
        let stake = entry.amount;

        let Some(winner) = round.winning_side() else {
            let reward = match self.draw_rule {
                DrawRule::Loss => -stake,
                DrawRule::Refund => Decimal::ZERO,
            };
            return Ok(Evaluation {
                outcome: Outcome::Draw,
                reward,
            });
        };

        if entry.position != winner {
            return Ok(Evaluation {
                outcome: Outcome::Loss,
                reward: -stake,
            });
        }

        let payout = stats.payout_for(winner).ok_or_else(|| {
            EngineError::integrity(round.epoch, format!("winning side {winner} has an empty pool"))
        })?;

        Ok(Evaluation {
            outcome: Outcome::Win,
            reward: stake * payout - stake,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stats::RoundStatsCalculator;
    use crate::types::{Position, TxHandle};
    use rust_decimal_macros::dec;

    fn entry(position: Position, stake: Decimal) -> LedgerEntry {
        LedgerEntry::placed(100, position, stake, TxHandle::new("0x1"))
    }

    fn eval(rule: DrawRule, round: &Round, entry: &LedgerEntry) -> Evaluation {
        let stats = RoundStatsCalculator::new(10).compute(round);
        ResultEvaluator::new(rule).evaluate(round, &stats, entry).unwrap()
    }

    #[test]
    fn test_up_wins() {
        let result = eval(DrawRule::Loss, &Round::sample(100), &entry(Position::Bull, dec!(1)));
        assert_eq!(result.outcome, Outcome::Win);
        assert_eq!(result.reward, dec!(4));
    }

    #[test]
    fn test_down_loses() {
        let result = eval(DrawRule::Loss, &Round::sample(100), &entry(Position::Bear, dec!(1)));
        assert_eq!(result.outcome, Outcome::Loss);
        assert_eq!(result.reward, dec!(-1));
    }

    #[test]
    fn test_bear_win_uses_bear_payout() {
        let mut round = Round::sample(100);
        round.close_price = dec!(299.5);
        let result = eval(DrawRule::Loss, &round, &entry(Position::Bear, dec!(2)));
        assert_eq!(result.outcome, Outcome::Win);
        // payout 10 / 8 = 1.25
        assert_eq!(result.reward, dec!(0.5));
    }

    #[test]
    fn test_draw_loses_every_position() {
        let mut round = Round::sample(100);
        round.close_price = round.lock_price;
        for position in [Position::Bull, Position::Bear] {
            let result = eval(DrawRule::Loss, &round, &entry(position, dec!(3)));
            assert_eq!(result.outcome, Outcome::Draw);
            assert_eq!(result.reward, dec!(-3));
        }
    }

    #[test]
    fn test_draw_refund_rule() {
        let mut round = Round::sample(100);
        round.close_price = round.lock_price;
        let result = eval(DrawRule::Refund, &round, &entry(Position::Bull, dec!(3)));
        assert_eq!(result.outcome, Outcome::Draw);
        assert_eq!(result.reward, Decimal::ZERO);
    }

    #[test]
    fn test_win_reward_positive_when_payout_above_one() {
        let round = Round::sample(100);
        for stake in [dec!(0.01), dec!(0.5), dec!(7)] {
            let result = eval(DrawRule::Loss, &round, &entry(Position::Bull, stake));
            assert!(result.reward > Decimal::ZERO);
            assert_eq!(result.reward, stake * dec!(5) - stake);
        }
    }

    #[test]
    fn test_winner_with_empty_pool_is_integrity_failure() {
        let mut round = Round::sample(100);
        round.bull_amount = Decimal::ZERO;
        round.total_amount = round.bear_amount;
        let stats = RoundStatsCalculator::new(10).compute(&round);
        let err = ResultEvaluator::new(DrawRule::Loss)
            .evaluate(&round, &stats, &entry(Position::Bull, dec!(1)))
            .unwrap_err();
        assert!(matches!(err, EngineError::DataIntegrity { epoch: Some(100), .. }));
    }
}
