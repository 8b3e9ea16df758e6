//! Round statistics: pool ratios, payout multipliers and timing milestones.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::engine::tracker::lead_duration;
use crate::types::{Milestones, Round, RoundStats};

#[derive(Debug, Clone)]
pub struct RoundStatsCalculator {
    lead: Duration,
}

impl RoundStatsCalculator {
    pub fn new(lead_seconds: u64) -> Self {
        Self {
            lead: lead_duration(lead_seconds),
        }
    }

    /// Derive stats from a round record.
    ///
    /// Ratios are percentages of the pool. Payouts are `total / side` and
    /// stay `None` for an empty side; with an empty pool every ratio is
    /// `None`.
    pub fn compute(&self, round: &Round) -> RoundStats {
        let total = round.bull_amount + round.bear_amount;
        let milestones = self.milestones(round);

        if total.is_zero() {
            return RoundStats {
                epoch: round.epoch,
                total,
                bull_ratio: None,
                bear_ratio: None,
                bull_payout: None,
                bear_payout: None,
                milestones,
            };
        }

        RoundStats {
            epoch: round.epoch,
            total,
            bull_ratio: Some(round.bull_amount / total * dec!(100)),
            bear_ratio: Some(round.bear_amount / total * dec!(100)),
            bull_payout: payout(total, round.bull_amount),
            bear_payout: payout(total, round.bear_amount),
            milestones,
        }
    }

    fn milestones(&self, round: &Round) -> Milestones {
        Milestones {
            start: round.start_at,
            bet_cutoff: round.lock_at - self.lead,
            lock: round.lock_at,
            close: round.close_at,
        }
    }
}

fn payout(total: Decimal, side: Decimal) -> Option<Decimal> {
    if side.is_zero() {
        None
    } else {
        total.checked_div(side)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
