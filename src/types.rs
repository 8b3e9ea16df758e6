//! Shared types for the UPDOWN engine.
//!
//! These types form the data model used across all modules: on-chain
//! round projections, ledger records, and the derived timing and pool
//! statistics consumed by strategies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Wager direction. `Bull` is "price goes up", `Bear` is "price goes down".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Bull,
    Bear,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Bull => write!(f, "bull"),
            Position::Bear => write!(f, "bear"),
        }
    }
}

/// Settlement outcome of a single wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    /// `lock_price == close_price`. How it pays depends on the draw rule.
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
            Outcome::Draw => write!(f, "DRAW"),
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque confirmation identifier for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHandle(String);

impl TxHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Synthetic handle for a simulated wager. Deterministic per epoch and side.
    pub fn simulated_bet(epoch: u64, position: Position) -> Self {
        Self(format!("sim-bet-{epoch}-{position}"))
    }

    /// Synthetic handle for a simulated claim batch.
    pub fn simulated_claim(epochs: &[u64]) -> Self {
        let ids: Vec<String> = epochs.iter().map(|e| e.to_string()).collect();
        Self(format!("sim-claim-{}", ids.join("-")))
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// Read-only projection of an on-chain round at query time.
///
/// Price and pool fields keep changing until the oracle settles the round,
/// so a `Round` is never cached across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub epoch: u64,
    pub start_at: DateTime<Utc>,
    pub lock_at: DateTime<Utc>,
    pub close_at: DateTime<Utc>,
    pub lock_price: Decimal,
    pub close_price: Decimal,
    pub total_amount: Decimal,
    pub bull_amount: Decimal,
    pub bear_amount: Decimal,
    pub reward_base_amount: Decimal,
    pub reward_amount: Decimal,
    pub oracle_called: bool,
}

impl Round {
    /// Check internal consistency of a freshly decoded round.
    pub fn validate(&self, expected_epoch: u64) -> Result<(), EngineError> {
        if self.epoch != expected_epoch {
            return Err(EngineError::integrity(
                expected_epoch,
                format!("round reports epoch {}", self.epoch),
            ));
        }
        if self.bull_amount + self.bear_amount != self.total_amount {
            return Err(EngineError::integrity(
                expected_epoch,
                format!(
                    "pool mismatch: bull {} + bear {} != total {}",
                    self.bull_amount, self.bear_amount, self.total_amount
                ),
            ));
        }
        if self.start_at > self.lock_at || self.lock_at > self.close_at {
            return Err(EngineError::integrity(
                expected_epoch,
                "timestamps out of order",
            ));
        }
        Ok(())
    }

    /// Winning side once settled. `None` on an exact tie.
    pub fn winning_side(&self) -> Option<Position> {
        if self.close_price > self.lock_price {
            Some(Position::Bull)
        } else if self.close_price < self.lock_price {
            Some(Position::Bear)
        } else {
            None
        }
    }

    /// Settled sample round: lock 300, close 310, pool 10 (bull 2 / bear 8).
    #[cfg(test)]
    pub fn sample(epoch: u64) -> Self {
        use chrono::TimeZone;
        use rust_decimal_macros::dec;

        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Round {
            epoch,
            start_at: start,
            lock_at: start + chrono::Duration::minutes(5),
            close_at: start + chrono::Duration::minutes(10),
            lock_price: dec!(300.00),
            close_price: dec!(310.00),
            total_amount: dec!(10),
            bull_amount: dec!(2),
            bear_amount: dec!(8),
            reward_base_amount: dec!(2),
            reward_amount: dec!(9.7),
            oracle_called: true,
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} lock={} close={} pool={} (bull {} / bear {}){}",
            self.epoch,
            self.lock_price,
            self.close_price,
            self.total_amount,
            self.bull_amount,
            self.bear_amount,
            if self.oracle_called { " settled" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Derived statistics
// ---------------------------------------------------------------------------

/// Pool ratios and payout multipliers for one round.
///
/// Every ratio is `None` when it is undefined: all of them when the pool is
/// empty, a side's payout when that side has no stake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStats {
    pub epoch: u64,
    pub total: Decimal,
    /// Bull share of the pool in percent.
    pub bull_ratio: Option<Decimal>,
    /// Bear share of the pool in percent.
    pub bear_ratio: Option<Decimal>,
    pub bull_payout: Option<Decimal>,
    pub bear_payout: Option<Decimal>,
    pub milestones: Milestones,
}

impl RoundStats {
    pub fn payout_for(&self, position: Position) -> Option<Decimal> {
        match position {
            Position::Bull => self.bull_payout,
            Position::Bear => self.bear_payout,
        }
    }
}

/// Timing milestones taken from the round's own timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestones {
    pub start: DateTime<Utc>,
    pub bet_cutoff: DateTime<Utc>,
    pub lock: DateTime<Utc>,
    pub close: DateTime<Utc>,
}

/// Locally estimated timing for the current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochWindow {
    pub bet_open: DateTime<Utc>,
    pub lock: DateTime<Utc>,
    pub close: DateTime<Utc>,
}

impl EpochWindow {
    /// Whether `now` falls in `[bet_open, lock)`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now >= self.bet_open && now < self.lock
    }
}

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

/// Resolution state of a wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Reward {
    Unresolved,
    Resolved(Decimal),
}

impl Reward {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Reward::Resolved(_))
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Reward::Unresolved => None,
            Reward::Resolved(v) => Some(*v),
        }
    }
}

/// One wager record. Created once per epoch, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub epoch: u64,
    pub position: Position,
    pub amount: Decimal,
    pub tx: TxHandle,
    pub reward: Reward,
    pub claim: Option<TxHandle>,
}

impl LedgerEntry {
    /// A freshly placed wager: unresolved, unclaimed.
    pub fn placed(epoch: u64, position: Position, amount: Decimal, tx: TxHandle) -> Self {
        Self {
            epoch,
            position,
            amount,
            tx,
            reward: Reward::Unresolved,
            claim: None,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claim.is_some()
    }

    /// Resolved with a non-negative reward: a win, or a refunded draw.
    pub fn is_payable(&self) -> bool {
        matches!(self.reward, Reward::Resolved(v) if v >= Decimal::ZERO)
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reward = match self.reward {
            Reward::Unresolved => "pending".to_string(),
            Reward::Resolved(v) => format!("{v:+}"),
        };
        write!(
            f,
            "#{} {} {} [{}] reward={}{}",
            self.epoch,
            self.position,
            self.amount,
            self.tx,
            reward,
            if self.is_claimed() { " claimed" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
