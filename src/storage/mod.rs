//! Ledger export.
//!
//! The ledger lives in memory; its only durable artifact is a CSV export with
//! columns `epoch,position,amount,transactionHandle,reward,claimHandle`,
//! newest epoch first. Unresolved rewards and missing claims are empty cells.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use tracing::info;

use crate::types::LedgerEntry;

/// Default export file path.
pub const DEFAULT_EXPORT_FILE: &str = "running.csv";

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    epoch: u64,
    position: String,
    amount: String,
    #[serde(rename = "transactionHandle")]
    transaction_handle: &'a str,
    reward: Option<String>,
    #[serde(rename = "claimHandle")]
    claim_handle: Option<&'a str>,
}

impl<'a> From<&'a LedgerEntry> for LedgerRow<'a> {
    fn from(entry: &'a LedgerEntry) -> Self {
        Self {
            epoch: entry.epoch,
            position: entry.position.to_string(),
            amount: entry.amount.normalize().to_string(),
            transaction_handle: entry.tx.as_str(),
            reward: entry.reward.value().map(|r| r.normalize().to_string()),
            claim_handle: entry.claim.as_ref().map(|c| c.as_str()),
        }
    }
}

/// Write entries as CSV. Entries are sorted newest first regardless of
/// input order.
pub fn write_csv<W: Write>(writer: W, entries: &[LedgerEntry]) -> Result<()> {
    let mut sorted: Vec<&LedgerEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.epoch.cmp(&a.epoch));

    let mut csv = csv::Writer::from_writer(writer);
    if sorted.is_empty() {
        csv.write_record([
            "epoch",
            "position",
            "amount",
            "transactionHandle",
            "reward",
            "claimHandle",
        ])
        .context("Failed to write CSV header")?;
    }
    for entry in sorted {
        csv.serialize(LedgerRow::from(entry))
            .with_context(|| format!("Failed to write ledger row for epoch {}", entry.epoch))?;
    }
    csv.flush().context("Failed to flush CSV")?;
    Ok(())
}

/// CSV export as a string (dashboard download).
pub fn ledger_csv(entries: &[LedgerEntry]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, entries)?;
    String::from_utf8(buf).context("CSV export is not valid UTF-8")
}

/// Write the CSV export to `path`, replacing any existing file.
pub fn export_ledger(entries: &[LedgerEntry], path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_EXPORT_FILE);
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create export file {path}"))?;
    write_csv(file, entries)?;
    info!(path, entries = entries.len(), "Ledger exported");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
