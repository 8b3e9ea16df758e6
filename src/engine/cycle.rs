//! Control loop.
//!
//! One `Engine` owns the ledger and drives every component from a single
//! task. Each tick observes the epoch, reconciles settled wagers once per
//! epoch, publishes a snapshot, checks stop conditions and, inside the bet
//! window, asks the strategy for a wager.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::chain::ChainGateway;
use crate::config::{AppConfig, EpochFilter};
use crate::engine::accountant::{BudgetState, StopConditions, StopReason};
use crate::engine::claimer::{ClaimExecutor, ClaimOutcome, ScanBound};
use crate::engine::evaluator::ResultEvaluator;
use crate::engine::executor::BetExecutor;
use crate::engine::ledger::Ledger;
use crate::engine::retry::RetryPolicy;
use crate::engine::stats::RoundStatsCalculator;
use crate::engine::tracker::EpochTracker;
use crate::error::{ChainError, EngineError};
use crate::strategy::{Strategy, StrategyContext};
use crate::types::{EpochWindow, LedgerEntry, Round, RoundStats, TxHandle};

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Immutable view of the engine, published after every tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineSnapshot {
    pub updated_at: Option<DateTime<Utc>>,
    pub simulation: bool,
    pub current_epoch: Option<u64>,
    pub window: Option<EpochWindow>,
    pub stats: Option<RoundStats>,
    pub paused: Option<bool>,
    pub balance: Option<Decimal>,
    pub min_bet: Option<Decimal>,
    pub budget: BudgetState,
    pub stop_reason: Option<StopReason>,
    /// Newest first.
    pub ledger: Vec<LedgerEntry>,
}

pub type SharedSnapshot = Arc<RwLock<EngineSnapshot>>;

/// Chain state read during one tick.
struct Observed {
    epoch: u64,
    window: Option<EpochWindow>,
    stats: RoundStats,
    paused: bool,
    balance: Option<Decimal>,
    min_bet: Option<Decimal>,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub epoch: u64,
    pub transition: bool,
    pub claim: Option<ClaimOutcome>,
    pub bet: Option<TxHandle>,
    pub stop: Option<StopReason>,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub account: String,
    pub lead_seconds: u64,
    pub simulation: bool,
    pub estimated_timing: bool,
    pub epochs: EpochFilter,
    pub claim_enabled: bool,
    pub poll_interval: Duration,
}

impl EngineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            account: cfg.chain.account_address.clone(),
            lead_seconds: cfg.bet.seconds_left,
            simulation: cfg.bet.simulation,
            estimated_timing: cfg.bet.estimated_timing,
            epochs: cfg.bet.epochs,
            claim_enabled: cfg.claim.enabled,
            poll_interval: Duration::from_millis(cfg.bet.poll_interval_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    gateway: Arc<dyn ChainGateway>,
    retry: RetryPolicy,
    tracker: EpochTracker,
    stats: RoundStatsCalculator,
    bets: BetExecutor,
    claims: ClaimExecutor,
    ledger: Ledger,
    strategy: Box<dyn Strategy>,
    stop: StopConditions,
    settings: EngineSettings,
    /// Epoch whose settled wagers were last reconciled.
    reconciled: Option<u64>,
    /// Epoch whose wager was decided or submitted, successful or not.
    attempted: Option<u64>,
    snapshot: SharedSnapshot,
}

impl Engine {
    pub fn new(gateway: Arc<dyn ChainGateway>, strategy: Box<dyn Strategy>, cfg: &AppConfig) -> Self {
        let settings = EngineSettings::from_config(cfg);
        let retry = RetryPolicy::from_config(&cfg.retry);
        let stats = RoundStatsCalculator::new(settings.lead_seconds);

        let evaluator = ResultEvaluator::new(cfg.evaluation.draw_rule);

        info!(
            strategy = strategy.name(),
            simulation = settings.simulation,
            lead_seconds = settings.lead_seconds,
            epochs = ?settings.epochs,
            draw_rule = ?evaluator.draw_rule(),
            max_attempts = retry.max_attempts(),
            retry_delay = ?retry.delay(),
            "Engine initialised"
        );

        let bets = BetExecutor::new(gateway.clone(), retry.clone(), settings.simulation);
        let claims = ClaimExecutor::new(
            gateway.clone(),
            retry.clone(),
            stats.clone(),
            evaluator,
            settings.account.clone(),
            ScanBound::from_lookback(cfg.claim.lookback_epochs),
            settings.simulation,
        );

        let snapshot = Arc::new(RwLock::new(EngineSnapshot {
            simulation: settings.simulation,
            ..Default::default()
        }));

        Self {
            tracker: EpochTracker::new(settings.lead_seconds),
            gateway,
            retry,
            stats,
            bets,
            claims,
            ledger: Ledger::new(),
            strategy,
            stop: StopConditions::from_config(&cfg.stop),
            settings,
            reconciled: None,
            attempted: None,
            snapshot,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Handle for readers outside the control task (dashboard).
    pub fn snapshot_handle(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval
    }

    /// Run one iteration of the control loop at instant `now`.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        let gateway = self.gateway.clone();
        let gateway = gateway.as_ref();

        let previous = self.tracker.current_epoch();
        let epoch = self
            .tracker
            .observe_current_epoch(gateway, &self.retry, now)
            .await?;
        let mut report = TickReport {
            epoch,
            transition: previous != Some(epoch),
            ..Default::default()
        };

        if self.reconciled != Some(epoch) {
            match self.reconcile(epoch).await {
                Ok(claim) => {
                    report.claim = claim;
                    self.reconciled = Some(epoch);
                }
                // Only scan reads go through retry, so nothing was submitted.
                Err(e @ EngineError::RemoteUnavailable { .. }) => {
                    warn!(epoch, error = %e, "Claim scan incomplete, rescanning next tick");
                }
                Err(e) => {
                    self.reconciled = Some(epoch);
                    if e.is_fatal_to_operation() {
                        error!(epoch, error = %e, "Claim pass failed");
                    } else {
                        warn!(epoch, error = %e, "Claim pass failed, next attempt after epoch change");
                    }
                }
            }
        }

        let round = self.retry.execute("round", || gateway.round(epoch)).await?;
        round.validate(epoch)?;
        let stats = self.stats.compute(&round);
        let paused = self.retry.execute("paused", || gateway.is_paused()).await?;
        let account = self.settings.account.as_str();
        let balance = self
            .read_optional("balance", || gateway.balance(account))
            .await?;
        let min_bet = self.read_optional("min_bet", || gateway.min_bet()).await?;

        let budget = BudgetState::from_ledger(&self.ledger);
        let observed = Observed {
            epoch,
            window: self.bet_window(&stats),
            stats,
            paused,
            balance,
            min_bet,
        };
        let stop = self.stop.check(&budget);
        self.publish(now, &observed, stop.clone()).await;

        if let Some(reason) = stop {
            report.stop = Some(reason);
            return Ok(report);
        }

        if !self.should_bet(&observed, now) {
            return Ok(report);
        }

        report.bet = self.attempt_bet(&round, &observed, &budget).await?;
        if report.bet.is_some() {
            // Refresh so readers see the new entry without waiting a tick.
            self.publish(now, &observed, None).await;
        }
        Ok(report)
    }

    /// Tick on the poll interval until a stop condition triggers or
    /// `shutdown` resolves. Shutdown is only observed between ticks.
    pub async fn run<F>(&mut self, shutdown: F) -> Option<StopReason>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return None;
                }
                _ = interval.tick() => {}
            }

            match self.tick(Utc::now()).await {
                Ok(report) => {
                    if let Some(reason) = report.stop {
                        info!(reason = %reason, "Engine stopping");
                        return Some(reason);
                    }
                }
                Err(e) if e.is_fatal_to_operation() => {
                    error!(error = %e, "Tick aborted");
                }
                Err(e) => {
                    warn!(error = %e, "Tick aborted, retrying next iteration");
                }
            }
        }
    }

    /// Resolve settled wagers and, when enabled, claim what is payable.
    async fn reconcile(&mut self, epoch: u64) -> Result<Option<ClaimOutcome>, EngineError> {
        if self.settings.claim_enabled {
            let outcome = self.claims.handle_claim(&mut self.ledger, epoch).await?;
            if outcome.claimed > 0 {
                info!(epoch, claimed = outcome.claimed, "Claim pass complete");
            }
            Ok(Some(outcome))
        } else {
            self.claims.collect_claimable(&mut self.ledger, epoch).await?;
            Ok(None)
        }
    }

    fn bet_window(&self, stats: &RoundStats) -> Option<EpochWindow> {
        if self.settings.estimated_timing {
            self.tracker.window()
        } else {
            Some(EpochWindow {
                bet_open: stats.milestones.bet_cutoff,
                lock: stats.milestones.lock,
                close: stats.milestones.close,
            })
        }
    }

    fn should_bet(&self, observed: &Observed, now: DateTime<Utc>) -> bool {
        let epoch = observed.epoch;
        if !observed.window.is_some_and(|w| w.is_open(now)) {
            return false;
        }
        if self.ledger.contains(epoch) || self.attempted == Some(epoch) {
            return false;
        }
        if observed.paused {
            debug!(epoch, "Contract paused, not betting");
            return false;
        }
        if !self.settings.epochs.accepts(epoch) {
            debug!(epoch, filter = ?self.settings.epochs, "Epoch filtered out");
            return false;
        }
        true
    }

    async fn attempt_bet(
        &mut self,
        round: &Round,
        observed: &Observed,
        budget: &BudgetState,
    ) -> Result<Option<TxHandle>, EngineError> {
        let epoch = observed.epoch;
        let reference = match epoch.checked_sub(2) {
            Some(prior) => {
                let gateway = self.gateway.as_ref();
                let r = self.retry.execute("round", || gateway.round(prior)).await?;
                r.validate(prior)?;
                Some(r)
            }
            None => None,
        };

        // One attempt per epoch from here; a failed submission may still have landed.
        self.attempted = Some(epoch);

        let history = self.ledger.snapshot();
        let ctx = StrategyContext {
            epoch,
            history: &history,
            round: Some(round),
            stats: Some(&observed.stats),
            reference: reference.as_ref(),
            budget,
        };

        let Some(proposal) = self.strategy.propose(&ctx) else {
            info!(epoch, strategy = self.strategy.name(), "Strategy skipped epoch");
            return Ok(None);
        };

        if let Some(min) = observed.min_bet {
            if proposal.stake < min {
                warn!(epoch, stake = %proposal.stake, min_bet = %min, "Stake below contract minimum");
                return Ok(None);
            }
        }
        if let Some(balance) = observed.balance {
            if proposal.stake > balance && !self.bets.is_simulation() {
                warn!(epoch, stake = %proposal.stake, balance = %balance, "Insufficient balance");
                return Ok(None);
            }
        }

        match self
            .bets
            .place_bet(&mut self.ledger, epoch, proposal.position, proposal.stake)
            .await
        {
            Ok(tx) => Ok(Some(tx)),
            // The live-epoch read ran out of retries before anything was sent.
            Err(e @ EngineError::RemoteUnavailable { .. }) => {
                self.attempted = None;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// A read whose transient exhaustion means "unknown" rather than failure.
    async fn read_optional<T, F, Fut>(&self, operation: &str, f: F) -> Result<Option<T>, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        match self.retry.execute(operation, f).await {
            Ok(value) => Ok(Some(value)),
            Err(EngineError::RemoteUnavailable { .. }) => {
                warn!(operation, "Value unknown this tick");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn publish(&self, now: DateTime<Utc>, observed: &Observed, stop_reason: Option<StopReason>) {
        let snapshot = EngineSnapshot {
            updated_at: Some(now),
            simulation: self.settings.simulation,
            current_epoch: Some(observed.epoch),
            window: observed.window,
            stats: Some(observed.stats.clone()),
            paused: Some(observed.paused),
            balance: observed.balance,
            min_bet: observed.min_bet,
            budget: BudgetState::from_ledger(&self.ledger),
            stop_reason,
            ledger: self.ledger.snapshot(),
        };
        *self.snapshot.write().await = snapshot;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
