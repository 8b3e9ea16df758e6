//! Error taxonomy.
//!
//! `ChainError` is what a gateway reports; `EngineError` is what the engine
//! surfaces to its control loop. Only `ChainError::is_transient` failures are
//! ever retried.

use rust_decimal::Decimal;
use thiserror::Error;

/// Failure reported by the chain boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Network or HTTP-level transport failure. Retryable.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered, but not with something we can decode.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Signing or submission could not be attempted.
    #[error("signer unavailable: {0}")]
    Signer(String),

    /// The transaction was mined but reverted.
    #[error("transaction {0} reverted")]
    Reverted(String),
}

/// JSON-RPC "limit exceeded" (rate limiting by public nodes).
const RPC_LIMIT_EXCEEDED: i64 = -32005;

impl ChainError {
    pub fn is_transient(&self) -> bool {
        match self {
            ChainError::Transport(_) => true,
            ChainError::Rpc { code, .. } => *code == RPC_LIMIT_EXCEEDED,
            _ => false,
        }
    }
}

/// Failure surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transient failures exhausted the retry budget.
    #[error("{operation} unavailable after {attempts} attempts: {last}")]
    RemoteUnavailable {
        operation: String,
        attempts: u32,
        last: ChainError,
    },

    /// A second ledger entry for the same epoch was attempted.
    #[error("ledger already holds an entry for epoch {0}")]
    DuplicateEpoch(u64),

    /// Remote data is inconsistent. Retrying will not fix it.
    #[error("data integrity failure{}: {detail}", at_epoch(.epoch))]
    DataIntegrity { epoch: Option<u64>, detail: String },

    #[error("no ledger entry for epoch {0}")]
    UnknownEpoch(u64),

    #[error("epoch {0} is already claimed")]
    AlreadyClaimed(u64),

    #[error("stake {0} must be positive")]
    InvalidStake(Decimal),

    #[error("claim batch is empty")]
    EmptyClaim,

    /// The wager targets an epoch that is no longer the live one.
    #[error("epoch {requested} is not current (chain is at {current})")]
    StaleEpoch { requested: u64, current: u64 },

    #[error(transparent)]
    Chain(ChainError),
}

fn at_epoch(epoch: &Option<u64>) -> String {
    epoch.map(|e| format!(" at epoch {e}")).unwrap_or_default()
}

impl EngineError {
    pub fn integrity(epoch: u64, detail: impl Into<String>) -> Self {
        EngineError::DataIntegrity {
            epoch: Some(epoch),
            detail: detail.into(),
        }
    }

    /// Invariant violations and integrity failures. Logged at error level.
    pub fn is_fatal_to_operation(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateEpoch(_)
                | EngineError::DataIntegrity { .. }
                | EngineError::AlreadyClaimed(_)
        )
    }
}

impl From<ChainError> for EngineError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Malformed(detail) => EngineError::DataIntegrity {
                epoch: None,
                detail,
            },
            other => EngineError::Chain(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
