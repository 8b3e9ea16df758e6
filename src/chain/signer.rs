//! Transaction signing boundary.
//!
//! The engine never touches key material. A `TransactionSigner` takes an
//! unsigned request, signs and broadcasts it, and waits for confirmation.
//! `NodeAccountSigner` delegates signing to an account managed by the node
//! itself (`eth_sendTransaction`).

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::rpc::{hex_address, RpcClient};
use super::units;
use crate::error::ChainError;
use crate::types::TxHandle;

/// An unsigned contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Vec<u8>,
    /// Native value in wei.
    pub value: u128,
    pub gas: u64,
    pub gas_price: u128,
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign, broadcast and await confirmation. Returns the transaction hash.
    async fn sign_and_submit(&self, request: TransactionRequest) -> Result<TxHandle, ChainError>;
}

/// Confirmation polling bounds.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

/// Signs through a node-managed (unlocked) account.
pub struct NodeAccountSigner {
    rpc: Arc<RpcClient>,
    from: Address,
    confirmation: ConfirmationPolicy,
}

impl NodeAccountSigner {
    pub fn new(rpc: Arc<RpcClient>, from: Address, confirmation: ConfirmationPolicy) -> Self {
        Self {
            rpc,
            from,
            confirmation,
        }
    }

    /// Poll for a receipt. A hash with no receipt after the polling budget is
    /// returned as-is: the transaction was accepted and may still be mined.
    async fn await_receipt(&self, hash: &str) -> Result<(), ChainError> {
        for poll in 0..self.confirmation.max_polls {
            let receipt = self
                .rpc
                .request("eth_getTransactionReceipt", json!([hash]))
                .await;

            match receipt {
                Ok(Value::Null) => {}
                Ok(receipt) => return check_status(hash, &receipt),
                Err(e) if e.is_transient() => {
                    debug!(hash, poll, error = %e, "Receipt poll failed, retrying");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.confirmation.poll_interval).await;
        }

        warn!(
            hash,
            polls = self.confirmation.max_polls,
            "Transaction not confirmed within polling budget"
        );
        Ok(())
    }
}

fn check_status(hash: &str, receipt: &Value) -> Result<(), ChainError> {
    match receipt.get("status").and_then(Value::as_str) {
        Some("0x1") => Ok(()),
        Some("0x0") => Err(ChainError::Reverted(hash.to_string())),
        other => Err(ChainError::Malformed(format!(
            "receipt for {hash} has status {other:?}"
        ))),
    }
}

#[async_trait]
impl TransactionSigner for NodeAccountSigner {
    async fn sign_and_submit(&self, request: TransactionRequest) -> Result<TxHandle, ChainError> {
        let tx = json!({
            "from": hex_address(&self.from),
            "to": hex_address(&request.to),
            "data": format!("0x{}", hex::encode(&request.data)),
            "value": units::quantity(request.value),
            "gas": units::quantity(u128::from(request.gas)),
            "gasPrice": units::quantity(request.gas_price),
        });

        let result = self.rpc.request("eth_sendTransaction", json!([tx])).await?;
        let hash = result
            .as_str()
            .ok_or_else(|| ChainError::Malformed("eth_sendTransaction result is not a string".into()))?
            .to_string();

        info!(hash = %hash, value = request.value, "Transaction broadcast");
        self.await_receipt(&hash).await?;
        Ok(TxHandle::new(hash))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_success() {
        assert!(check_status("0xaa", &json!({ "status": "0x1" })).is_ok());
    }

    #[test]
    fn test_check_status_reverted() {
        let err = check_status("0xaa", &json!({ "status": "0x0" })).unwrap_err();
        assert_eq!(err, ChainError::Reverted("0xaa".into()));
    }

    #[test]
    fn test_check_status_missing() {
        assert!(matches!(
            check_status("0xaa", &json!({})),
            Err(ChainError::Malformed(_))
        ));
    }
}
