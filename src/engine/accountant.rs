//! Accountant: running budget from the ledger, and stop conditions.
//!
//! Recomputed from a ledger snapshot on every tick, so it can never drift
//! from the ledger itself.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::config::StopConfig;
use crate::engine::ledger::Ledger;
use crate::types::{LedgerEntry, Reward};

// ---------------------------------------------------------------------------
// Budget state
// ---------------------------------------------------------------------------

/// Aggregate view of the wagers placed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BudgetState {
    /// Sum of all stakes.
    pub total_spent: Decimal,
    /// Sum of resolved rewards (net of stakes).
    pub estimated_gain: Decimal,
    /// Stakes lost in the trailing run of consecutive losses.
    pub recent_loss: Decimal,
    /// Length of that run.
    pub recent_loss_times: u32,
    pub wins: u32,
    pub losses: u32,
    /// Wagers not yet resolved.
    pub pending: u32,
}

impl BudgetState {
    pub fn from_ledger(ledger: &Ledger) -> Self {
        Self::from_entries(ledger.iter_desc())
    }

    /// Entries must be newest first.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut state = BudgetState::default();
        let mut streak_open = true;

        for entry in entries {
            state.total_spent += entry.amount;

            match entry.reward {
                Reward::Unresolved => state.pending += 1,
                Reward::Resolved(reward) => {
                    state.estimated_gain += reward;
                    if reward > Decimal::ZERO {
                        state.wins += 1;
                        streak_open = false;
                    } else if reward < Decimal::ZERO {
                        state.losses += 1;
                        if streak_open {
                            state.recent_loss += entry.amount;
                            state.recent_loss_times += 1;
                        }
                    }
                }
            }
        }

        state
    }
}

// ---------------------------------------------------------------------------
// Stop conditions
// ---------------------------------------------------------------------------

/// Why the engine stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    MaxLoss { gain: Decimal, limit: Decimal },
    SpendLimit { spent: Decimal, limit: Decimal },
    GainTarget { gain: Decimal, target: Decimal },
    ConsecutiveLosses { count: u32, limit: u32 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxLoss { gain, limit } => {
                write!(f, "loss limit reached: gain {gain} <= -{limit}")
            }
            StopReason::SpendLimit { spent, limit } => {
                write!(f, "spend limit reached: {spent} >= {limit}")
            }
            StopReason::GainTarget { gain, target } => {
                write!(f, "gain target reached: {gain} >= {target}")
            }
            StopReason::ConsecutiveLosses { count, limit } => {
                write!(f, "{count} consecutive losses (limit {limit})")
            }
        }
    }
}

/// Thresholds checked once per tick. Zero disables a condition.
#[derive(Debug, Clone, Default)]
pub struct StopConditions {
    pub max_loss: Decimal,
    pub spend_limit: Decimal,
    pub gain_target: Decimal,
    pub max_consecutive_losses: u32,
}

impl StopConditions {
    pub fn from_config(cfg: &StopConfig) -> Self {
        Self {
            max_loss: cfg.max_loss,
            spend_limit: cfg.spend_limit,
            gain_target: cfg.gain_target,
            max_consecutive_losses: cfg.max_consecutive_losses,
        }
    }

    /// First triggered condition, if any.
    pub fn check(&self, state: &BudgetState) -> Option<StopReason> {
        let reason = if self.max_loss > Decimal::ZERO && state.estimated_gain <= -self.max_loss {
            Some(StopReason::MaxLoss {
                gain: state.estimated_gain,
                limit: self.max_loss,
            })
        } else if self.spend_limit > Decimal::ZERO && state.total_spent >= self.spend_limit {
            Some(StopReason::SpendLimit {
                spent: state.total_spent,
                limit: self.spend_limit,
            })
        } else if self.gain_target > Decimal::ZERO && state.estimated_gain >= self.gain_target {
            Some(StopReason::GainTarget {
                gain: state.estimated_gain,
                target: self.gain_target,
            })
        } else if self.max_consecutive_losses > 0
            && state.recent_loss_times > self.max_consecutive_losses
        {
            Some(StopReason::ConsecutiveLosses {
                count: state.recent_loss_times,
                limit: self.max_consecutive_losses,
            })
        } else {
            None
        };

        if let Some(ref r) = reason {
            warn!(reason = %r, "Stop condition triggered");
        }
        reason
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, TxHandle};
    use rust_decimal_macros::dec;

    fn resolved(epoch: u64, amount: Decimal, reward: Option<Decimal>) -> LedgerEntry {
        let mut entry = LedgerEntry::placed(epoch, Position::Bull, amount, TxHandle::new("0x1"));
        if let Some(r) = reward {
            entry.reward = Reward::Resolved(r);
        }
        entry
    }

    fn ledger(entries: Vec<LedgerEntry>) -> Ledger {
        let mut ledger = Ledger::new();
        for e in entries {
            ledger.append(e).unwrap();
        }
        ledger
    }

    #[test]
    fn test_empty_ledger() {
        assert_eq!(BudgetState::from_ledger(&Ledger::new()), BudgetState::default());
    }

    #[test]
    fn test_budget_totals() {
        let ledger = ledger(vec![
            resolved(1, dec!(1), Some(dec!(4))),
            resolved(2, dec!(1), Some(dec!(-1))),
            resolved(3, dec!(2), Some(dec!(-2))),
            resolved(4, dec!(4), None),
        ]);
        let state = BudgetState::from_ledger(&ledger);
        assert_eq!(state.total_spent, dec!(8));
        assert_eq!(state.estimated_gain, dec!(1));
        assert_eq!(state.wins, 1);
        assert_eq!(state.losses, 2);
        assert_eq!(state.pending, 1);
        // Trailing losses 3 and 2; pending 4 does not break the run.
        assert_eq!(state.recent_loss, dec!(3));
        assert_eq!(state.recent_loss_times, 2);
    }

    #[test]
    fn test_win_resets_streak() {
        let ledger = ledger(vec![
            resolved(1, dec!(1), Some(dec!(-1))),
            resolved(2, dec!(1), Some(dec!(0.8))),
        ]);
        let state = BudgetState::from_ledger(&ledger);
        assert_eq!(state.recent_loss_times, 0);
        assert_eq!(state.recent_loss, Decimal::ZERO);
    }

    #[test]
    fn test_zero_conditions_never_stop() {
        let state = BudgetState {
            total_spent: dec!(1000),
            estimated_gain: dec!(-500),
            recent_loss_times: 50,
            ..Default::default()
        };
        assert!(StopConditions::default().check(&state).is_none());
    }

    #[test]
    fn test_max_loss() {
        let stop = StopConditions {
            max_loss: dec!(5),
            ..Default::default()
        };
        let mut state = BudgetState {
            estimated_gain: dec!(-4.99),
            ..Default::default()
        };
        assert!(stop.check(&state).is_none());
        state.estimated_gain = dec!(-5);
        assert!(matches!(stop.check(&state), Some(StopReason::MaxLoss { .. })));
    }

    #[test]
    fn test_spend_and_gain() {
        let stop = StopConditions {
            spend_limit: dec!(10),
            gain_target: dec!(2),
            ..Default::default()
        };
        let state = BudgetState {
            total_spent: dec!(10),
            ..Default::default()
        };
        assert!(matches!(stop.check(&state), Some(StopReason::SpendLimit { .. })));

        let state = BudgetState {
            estimated_gain: dec!(2.5),
            ..Default::default()
        };
        assert!(matches!(stop.check(&state), Some(StopReason::GainTarget { .. })));
    }

    #[test]
    fn test_consecutive_losses_must_exceed_limit() {
        let stop = StopConditions {
            max_consecutive_losses: 3,
            ..Default::default()
        };
        let mut state = BudgetState {
            recent_loss_times: 3,
            ..Default::default()
        };
        assert!(stop.check(&state).is_none());
        state.recent_loss_times = 4;
        let reason = stop.check(&state).unwrap();
        assert_eq!(reason.to_string(), "4 consecutive losses (limit 3)");
    }
}
