//! Scripted gateway for integration testing.
//!
//! A deterministic in-memory `ChainGateway`. Rounds, the live epoch,
//! claimability and failures are fully controllable from test code, and
//! every submission is recorded for inspection.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use updown::chain::ChainGateway;
use updown::error::ChainError;
use updown::types::{Position, Round, TxHandle};

#[derive(Default)]
struct Script {
    epoch: u64,
    rounds: HashMap<u64, Round>,
    claimable: HashSet<u64>,
    paused: bool,
    balance: Decimal,
    min_bet: Decimal,
    /// Transient failures still to be returned by `current_epoch`.
    failing_epoch_reads: u32,
    reject_bets: bool,
    bets: Vec<(u64, Position, Decimal)>,
    claims: Vec<Vec<u64>>,
}

#[derive(Clone)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    pub fn new(epoch: u64) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                epoch,
                balance: dec!(10),
                min_bet: dec!(0.001),
                ..Default::default()
            })),
        }
    }

    pub fn set_epoch(&self, epoch: u64) {
        self.script.lock().unwrap().epoch = epoch;
    }

    pub fn put_round(&self, round: Round) {
        self.script.lock().unwrap().rounds.insert(round.epoch, round);
    }

    pub fn set_claimable(&self, epoch: u64) {
        self.script.lock().unwrap().claimable.insert(epoch);
    }

    pub fn set_paused(&self, paused: bool) {
        self.script.lock().unwrap().paused = paused;
    }

    /// Make the next `n` epoch reads fail with a transport error.
    pub fn fail_epoch_reads(&self, n: u32) {
        self.script.lock().unwrap().failing_epoch_reads = n;
    }

    pub fn reject_bets(&self, reject: bool) {
        self.script.lock().unwrap().reject_bets = reject;
    }

    pub fn bets(&self) -> Vec<(u64, Position, Decimal)> {
        self.script.lock().unwrap().bets.clone()
    }

    pub fn claims(&self) -> Vec<Vec<u64>> {
        self.script.lock().unwrap().claims.clone()
    }
}

#[async_trait]
impl ChainGateway for ScriptedGateway {
    async fn current_epoch(&self) -> Result<u64, ChainError> {
        let mut s = self.script.lock().unwrap();
        if s.failing_epoch_reads > 0 {
            s.failing_epoch_reads -= 1;
            return Err(ChainError::Transport("connection reset".into()));
        }
        Ok(s.epoch)
    }

    async fn round(&self, epoch: u64) -> Result<Round, ChainError> {
        self.script
            .lock()
            .unwrap()
            .rounds
            .get(&epoch)
            .cloned()
            .ok_or_else(|| ChainError::Rpc {
                code: -32000,
                message: format!("no round {epoch}"),
            })
    }

    async fn min_bet(&self) -> Result<Decimal, ChainError> {
        Ok(self.script.lock().unwrap().min_bet)
    }

    async fn is_paused(&self) -> Result<bool, ChainError> {
        Ok(self.script.lock().unwrap().paused)
    }

    async fn balance(&self, _address: &str) -> Result<Decimal, ChainError> {
        Ok(self.script.lock().unwrap().balance)
    }

    async fn is_claimable(&self, epoch: u64, _address: &str) -> Result<bool, ChainError> {
        Ok(self.script.lock().unwrap().claimable.contains(&epoch))
    }

    async fn submit_bet(
        &self,
        epoch: u64,
        position: Position,
        stake: Decimal,
    ) -> Result<TxHandle, ChainError> {
        let mut s = self.script.lock().unwrap();
        s.bets.push((epoch, position, stake));
        if s.reject_bets {
            return Err(ChainError::Reverted(format!("0xbet{epoch}")));
        }
        Ok(TxHandle::new(format!("0xbet{epoch}")))
    }

    async fn submit_claim(&self, epochs: &[u64]) -> Result<TxHandle, ChainError> {
        let mut s = self.script.lock().unwrap();
        s.claims.push(epochs.to_vec());
        let ids: Vec<String> = epochs.iter().map(|e| e.to_string()).collect();
        for epoch in epochs {
            s.claimable.remove(epoch);
        }
        Ok(TxHandle::new(format!("0xclaim{}", ids.join("_"))))
    }
}

// ---------------------------------------------------------------------------
// Round builders
// ---------------------------------------------------------------------------

/// Open round locking at `lock`, pool 10 (bull 2 / bear 8).
pub fn open_round(epoch: u64, lock: DateTime<Utc>) -> Round {
    Round {
        epoch,
        start_at: lock - Duration::minutes(5),
        lock_at: lock,
        close_at: lock + Duration::minutes(5),
        lock_price: Decimal::ZERO,
        close_price: Decimal::ZERO,
        total_amount: dec!(10),
        bull_amount: dec!(2),
        bear_amount: dec!(8),
        reward_base_amount: Decimal::ZERO,
        reward_amount: Decimal::ZERO,
        oracle_called: false,
    }
}

/// Round settled by the oracle moving from `lock_price` to `close_price`.
pub fn settled_round(
    epoch: u64,
    lock: DateTime<Utc>,
    lock_price: Decimal,
    close_price: Decimal,
) -> Round {
    Round {
        lock_price,
        close_price,
        reward_base_amount: dec!(2),
        reward_amount: dec!(9.7),
        oracle_called: true,
        ..open_round(epoch, lock)
    }
}
