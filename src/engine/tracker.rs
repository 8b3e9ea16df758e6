//! Epoch tracker.
//!
//! Watches the live epoch number and keeps a locally estimated bet window
//! for it. The window is computed once per transition: the current round's
//! on-chain timestamps are not final until lock, so the estimate assumes the
//! epoch started when we first saw it.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::chain::ChainGateway;
use crate::engine::retry::RetryPolicy;
use crate::error::EngineError;
use crate::types::EpochWindow;

/// Fixed protocol round length.
pub const ROUND_DURATION_SECS: u64 = 300;

/// Lead time before lock, capped at one round.
pub fn lead_duration(lead_seconds: u64) -> Duration {
    let secs = lead_seconds.min(ROUND_DURATION_SECS);
    Duration::seconds(secs as i64)
}

fn round_duration() -> Duration {
    Duration::seconds(ROUND_DURATION_SECS as i64)
}

#[derive(Debug)]
pub struct EpochTracker {
    lead: Duration,
    current: Option<u64>,
    window: Option<EpochWindow>,
}

impl EpochTracker {
    pub fn new(lead_seconds: u64) -> Self {
        Self {
            lead: lead_duration(lead_seconds),
            current: None,
            window: None,
        }
    }

    pub fn current_epoch(&self) -> Option<u64> {
        self.current
    }

    pub fn window(&self) -> Option<EpochWindow> {
        self.window
    }

    /// Query the live epoch and refresh the cached window on a transition.
    pub async fn observe_current_epoch(
        &mut self,
        gateway: &dyn ChainGateway,
        retry: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64, EngineError> {
        let epoch = retry
            .execute("current_epoch", || gateway.current_epoch())
            .await?;
        self.record(epoch, now)?;
        Ok(epoch)
    }

    /// Record an observed epoch. Returns `true` when it is a transition.
    ///
    /// An epoch lower than the one already seen is rejected; a lagging node
    /// must not rewind the tracker.
    pub fn record(&mut self, epoch: u64, now: DateTime<Utc>) -> Result<bool, EngineError> {
        match self.current {
            Some(current) if current == epoch => return Ok(false),
            Some(current) if epoch < current => {
                warn!(epoch, current, "Chain reported an older epoch");
                return Err(EngineError::integrity(
                    epoch,
                    format!("epoch went backwards from {current}"),
                ));
            }
            _ => {}
        }

        let lock = now + round_duration();
        let window = EpochWindow {
            bet_open: lock - self.lead,
            lock,
            close: lock + round_duration(),
        };

        info!(
            epoch,
            previous = ?self.current,
            bet_open = %window.bet_open,
            lock = %window.lock,
            "Epoch transition"
        );

        self.current = Some(epoch);
        self.window = Some(window);
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
