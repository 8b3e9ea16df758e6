//! Wager executor.
//!
//! Places at most one wager per epoch and records it in the ledger. The
//! live-epoch read is retried; the submission itself is a single attempt.
//! In simulation mode a synthetic handle stands in for the transaction and
//! the gateway is never asked to submit.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chain::ChainGateway;
use crate::engine::ledger::Ledger;
use crate::engine::retry::RetryPolicy;
use crate::error::EngineError;
use crate::types::{LedgerEntry, Position, TxHandle};

pub struct BetExecutor {
    gateway: Arc<dyn ChainGateway>,
    retry: RetryPolicy,
    simulation: bool,
}

impl BetExecutor {
    pub fn new(gateway: Arc<dyn ChainGateway>, retry: RetryPolicy, simulation: bool) -> Self {
        Self {
            gateway,
            retry,
            simulation,
        }
    }

    pub fn is_simulation(&self) -> bool {
        self.simulation
    }

    /// Wager `stake` on `position` for `epoch`.
    ///
    /// Fails with `DuplicateEpoch` before touching the chain if the ledger
    /// already holds the epoch, and with `StaleEpoch` if the chain has moved
    /// on.
    pub async fn place_bet(
        &self,
        ledger: &mut Ledger,
        epoch: u64,
        position: Position,
        stake: Decimal,
    ) -> Result<TxHandle, EngineError> {
        if ledger.contains(epoch) {
            error!(epoch, "Wager already recorded for epoch");
            return Err(EngineError::DuplicateEpoch(epoch));
        }
        if stake <= Decimal::ZERO {
            return Err(EngineError::InvalidStake(stake));
        }

        let gateway = self.gateway.as_ref();
        let current = self
            .retry
            .execute("current_epoch", || gateway.current_epoch())
            .await?;
        if current != epoch {
            warn!(epoch, current, "Epoch moved on before submission");
            return Err(EngineError::StaleEpoch {
                requested: epoch,
                current,
            });
        }

        let tx = if self.simulation {
            info!(
                epoch,
                position = %position,
                stake = %stake,
                "[SIMULATION] Would place wager"
            );
            TxHandle::simulated_bet(epoch, position)
        } else {
            gateway
                .submit_bet(epoch, position, stake)
                .await
                .map_err(|e| {
                    warn!(epoch, position = %position, error = %e, "Wager submission failed");
                    EngineError::from(e)
                })?
        };

        ledger.append(LedgerEntry::placed(epoch, position, stake, tx.clone()))?;

        info!(
            epoch,
            position = %position,
            stake = %stake,
            tx = %tx,
            "Wager placed"
        );
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
