//! Chain boundary.
//!
//! Defines the `ChainGateway` trait the engine depends on, plus a JSON-RPC
//! implementation for the up/down prediction contract:
//! - `abi`: `sol!` contract calls and configurable selectors
//! - `units`: wei and fixed-point price scaling
//! - `rpc`: `RpcGateway` over `eth_call` / `eth_getBalance`
//! - `signer`: opaque signing boundary (`TransactionSigner`)
//!
//! Every monetary value crosses this boundary as base-unit integers and is
//! scaled to `Decimal` here, never inside the engine.

pub mod abi;
pub mod rpc;
pub mod signer;
pub mod units;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::ChainError;
use crate::types::{Position, Round, TxHandle};

/// Read and write access to the prediction contract.
///
/// Reads are safe to retry. Submissions sign, send and wait for
/// confirmation; callers never retry them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// The live epoch number.
    async fn current_epoch(&self) -> Result<u64, ChainError>;

    /// Round record for `epoch`, decoded but not validated.
    async fn round(&self, epoch: u64) -> Result<Round, ChainError>;

    /// Contract minimum stake.
    async fn min_bet(&self) -> Result<Decimal, ChainError>;

    async fn is_paused(&self) -> Result<bool, ChainError>;

    /// Native balance of `address`.
    async fn balance(&self, address: &str) -> Result<Decimal, ChainError>;

    async fn is_claimable(&self, epoch: u64, address: &str) -> Result<bool, ChainError>;

    async fn submit_bet(
        &self,
        epoch: u64,
        position: Position,
        stake: Decimal,
    ) -> Result<TxHandle, ChainError>;

    /// One batched claim transaction for all `epochs`.
    async fn submit_claim(&self, epochs: &[u64]) -> Result<TxHandle, ChainError>;
}
