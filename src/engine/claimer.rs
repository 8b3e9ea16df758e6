//! Claim executor.
//!
//! Scans settled epochs, resolves their rewards as a side effect and batches
//! a single claim transaction for every payable, unclaimed wager. A round is
//! only scanned once it and its successor have closed, so the scan starts at
//! `current - 2`.

use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::chain::ChainGateway;
use crate::engine::evaluator::ResultEvaluator;
use crate::engine::ledger::Ledger;
use crate::engine::retry::RetryPolicy;
use crate::engine::stats::RoundStatsCalculator;
use crate::error::EngineError;
use crate::types::TxHandle;

/// Lower bound of the claim scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanBound {
    /// Down to the oldest epoch in the ledger.
    LedgerMinimum,
    /// Legacy: only the `n` epochs below `current - 2`.
    FixedWindow(u64),
}

impl ScanBound {
    pub fn from_lookback(lookback: Option<u64>) -> Self {
        lookback.map_or(ScanBound::LedgerMinimum, ScanBound::FixedWindow)
    }
}

/// Result of one scan-then-claim pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClaimOutcome {
    pub claimed: usize,
    pub handle: Option<TxHandle>,
}

pub struct ClaimExecutor {
    gateway: Arc<dyn ChainGateway>,
    retry: RetryPolicy,
    stats: RoundStatsCalculator,
    evaluator: ResultEvaluator,
    account: String,
    bound: ScanBound,
    simulation: bool,
}

impl ClaimExecutor {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        retry: RetryPolicy,
        stats: RoundStatsCalculator,
        evaluator: ResultEvaluator,
        account: impl Into<String>,
        bound: ScanBound,
        simulation: bool,
    ) -> Self {
        Self {
            gateway,
            retry,
            stats,
            evaluator,
            account: account.into(),
            bound,
            simulation,
        }
    }

    /// Epochs that can be claimed now, newest first.
    ///
    /// Unresolved entries in range get their reward computed once the round
    /// is settled. A round failing validation is logged and skipped; running
    /// out of retries aborts the scan.
    pub async fn collect_claimable(
        &self,
        ledger: &mut Ledger,
        current_epoch: u64,
    ) -> Result<Vec<u64>, EngineError> {
        let Some(high) = current_epoch.checked_sub(2) else {
            return Ok(Vec::new());
        };
        let low = match self.bound {
            ScanBound::LedgerMinimum => match ledger.oldest_epoch() {
                Some(oldest) => oldest,
                None => return Ok(Vec::new()),
            },
            ScanBound::FixedWindow(n) => high.saturating_sub(n),
        };
        if low > high {
            return Ok(Vec::new());
        }

        let candidates: Vec<u64> = ledger
            .range_desc(low, high)
            .filter(|e| !e.is_claimed())
            .map(|e| e.epoch)
            .collect();

        let mut claimable = Vec::new();
        for epoch in candidates {
            match self.classify(ledger, epoch).await {
                Ok(true) => claimable.push(epoch),
                Ok(false) => {}
                Err(e) if e.is_fatal_to_operation() => {
                    error!(epoch, error = %e, "Skipping epoch in claim scan");
                }
                Err(e) => return Err(e),
            }
        }

        debug!(low, high, claimable = ?claimable, "Claim scan complete");
        Ok(claimable)
    }

    async fn classify(&self, ledger: &mut Ledger, epoch: u64) -> Result<bool, EngineError> {
        let entry = ledger
            .find(epoch)
            .cloned()
            .ok_or(EngineError::UnknownEpoch(epoch))?;
        let gateway = self.gateway.as_ref();

        let payable = match entry.reward.value() {
            Some(_) => entry.is_payable(),
            None => {
                let round = self.retry.execute("round", || gateway.round(epoch)).await?;
                round.validate(epoch)?;
                if !round.oracle_called {
                    debug!(epoch, "Round not settled yet");
                    return Ok(false);
                }

                let stats = self.stats.compute(&round);
                let evaluation = self.evaluator.evaluate(&round, &stats, &entry)?;
                ledger.update_reward(epoch, evaluation.reward)?;
                info!(
                    epoch,
                    position = %entry.position,
                    outcome = %evaluation.outcome,
                    reward = %evaluation.reward,
                    "Wager resolved"
                );
                evaluation.reward >= Decimal::ZERO
            }
        };

        if !payable {
            return Ok(false);
        }
        if self.simulation {
            return Ok(true);
        }

        let account = self.account.as_str();
        self.retry
            .execute("claimable", || gateway.is_claimable(epoch, account))
            .await
    }

    /// Submit one claim for `epochs` and record the handle on each entry.
    ///
    /// Every epoch must be in the ledger and unclaimed; otherwise nothing is
    /// submitted.
    pub async fn claim(&self, ledger: &mut Ledger, epochs: &[u64]) -> Result<TxHandle, EngineError> {
        let mut seen = BTreeSet::new();
        let batch: Vec<u64> = epochs.iter().copied().filter(|e| seen.insert(*e)).collect();
        if batch.is_empty() {
            return Err(EngineError::EmptyClaim);
        }

        for &epoch in &batch {
            let entry = ledger.find(epoch).ok_or(EngineError::UnknownEpoch(epoch))?;
            if entry.is_claimed() {
                error!(epoch, "Refusing to claim an epoch twice");
                return Err(EngineError::AlreadyClaimed(epoch));
            }
        }

        let tx = if self.simulation {
            info!(epochs = ?batch, "[SIMULATION] Would claim rewards");
            TxHandle::simulated_claim(&batch)
        } else {
            self.gateway.submit_claim(&batch).await.map_err(|e| {
                warn!(epochs = ?batch, error = %e, "Claim submission failed");
                EngineError::from(e)
            })?
        };

        for &epoch in &batch {
            ledger.update_claim(epoch, tx.clone())?;
        }

        info!(epochs = ?batch, tx = %tx, "Rewards claimed");
        Ok(tx)
    }

    /// Scan, then claim whatever was found.
    pub async fn handle_claim(
        &self,
        ledger: &mut Ledger,
        current_epoch: u64,
    ) -> Result<ClaimOutcome, EngineError> {
        let epochs = self.collect_claimable(ledger, current_epoch).await?;
        if epochs.is_empty() {
            return Ok(ClaimOutcome::default());
        }
        let handle = self.claim(ledger, &epochs).await?;
        Ok(ClaimOutcome {
            claimed: epochs.len(),
            handle: Some(handle),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
