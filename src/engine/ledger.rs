//! Wager ledger.
//!
//! Ordered collection of `LedgerEntry` keyed by epoch. It is the single
//! source of truth for "already bet this epoch" and "already claimed this
//! epoch". Entries are mutated in place by key and never removed; readers
//! outside the engine only ever get cloned snapshots.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, error};

use crate::error::EngineError;
use crate::types::{LedgerEntry, Reward, TxHandle};

#[derive(Debug, Default, Clone)]
pub struct Ledger {
    entries: BTreeMap<u64, LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new wager. Fails if the epoch already has one.
    pub fn append(&mut self, entry: LedgerEntry) -> Result<(), EngineError> {
        if self.entries.contains_key(&entry.epoch) {
            error!(epoch = entry.epoch, "Refusing duplicate ledger entry");
            return Err(EngineError::DuplicateEpoch(entry.epoch));
        }
        debug!(epoch = entry.epoch, position = %entry.position, amount = %entry.amount, "Ledger append");
        self.entries.insert(entry.epoch, entry);
        Ok(())
    }

    pub fn find(&self, epoch: u64) -> Option<&LedgerEntry> {
        self.entries.get(&epoch)
    }

    pub fn contains(&self, epoch: u64) -> bool {
        self.entries.contains_key(&epoch)
    }

    pub fn update_reward(&mut self, epoch: u64, reward: Decimal) -> Result<(), EngineError> {
        let entry = self
            .entries
            .get_mut(&epoch)
            .ok_or(EngineError::UnknownEpoch(epoch))?;
        entry.reward = Reward::Resolved(reward);
        Ok(())
    }

    /// Attach a claim handle. An entry is claimed at most once.
    pub fn update_claim(&mut self, epoch: u64, claim: TxHandle) -> Result<(), EngineError> {
        let entry = self
            .entries
            .get_mut(&epoch)
            .ok_or(EngineError::UnknownEpoch(epoch))?;
        if entry.claim.is_some() {
            return Err(EngineError::AlreadyClaimed(epoch));
        }
        entry.claim = Some(claim);
        Ok(())
    }

    /// Point-in-time copy, newest epoch first.
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.entries.values().rev().cloned().collect()
    }

    /// Entries in descending epoch order, borrowed.
    pub fn iter_desc(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values().rev()
    }

    /// Entries with `low <= epoch <= high`, newest first.
    pub fn range_desc(&self, low: u64, high: u64) -> impl Iterator<Item = &LedgerEntry> {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        self.entries.range(low..=high).rev().map(|(_, e)| e)
    }

    pub fn oldest_epoch(&self) -> Option<u64> {
        self.entries.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
