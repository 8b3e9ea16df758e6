//! JSON-RPC gateway for the prediction contract.
//!
//! Reads go through `eth_call` and `eth_getBalance`. Writes are encoded here
//! and handed to a `TransactionSigner`; without a signer the gateway is
//! read-only and every submission fails with `ChainError::Signer`.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::abi::{self, ContractInterface, Selectors};
use super::signer::{TransactionRequest, TransactionSigner};
use super::units;
use super::ChainGateway;
use crate::error::ChainError;
use crate::types::{Position, Round, TxHandle};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC 2.0 client over HTTP.
pub struct RpcClient {
    http: Client,
    url: SecretString,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: SecretString, timeout: std::time::Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("UPDOWN/0.1.0 (prediction-bot)")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client for RPC: {e}"))?;

        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send one request and return its `result` value.
    ///
    /// Connection errors and HTTP 429/5xx are `Transport`; a JSON-RPC error
    /// object is `Rpc`; anything undecodable is `Malformed`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        debug!(method, id, "RPC request");

        let resp = self
            .http
            .post(self.url.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("{method}: {}", e.without_url())))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ChainError::Transport(format!("{method}: HTTP {status}")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChainError::Rpc {
                code: i64::from(status.as_u16()),
                message: format!("{method}: HTTP {status}: {text}"),
            });
        }

        let parsed: RpcResponse = resp
            .json()
            .await
            .map_err(|e| ChainError::Malformed(format!("{method}: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        parsed
            .result
            .ok_or_else(|| ChainError::Malformed(format!("{method}: response has no result")))
    }

    /// `eth_call` against the latest block, returning raw return data.
    pub async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let result = self
            .request(
                "eth_call",
                json!([
                    { "to": hex_address(to), "data": format!("0x{}", hex::encode(data)) },
                    "latest"
                ]),
            )
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::Malformed("eth_call result is not a string".into()))?;
        abi::decode_hex(hex)
    }
}

/// Lowercase `0x`-prefixed address.
pub fn hex_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

pub fn parse_address(value: &str) -> Result<Address, ChainError> {
    Address::from_str(value).map_err(|e| ChainError::Malformed(format!("invalid address {value}: {e}")))
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Gas settings applied to every submitted transaction.
#[derive(Debug, Clone, Copy)]
pub struct GasSettings {
    pub bet_gas: u64,
    pub claim_gas: u64,
    pub gas_price: u128,
}

/// `ChainGateway` backed by a JSON-RPC node.
pub struct RpcGateway {
    rpc: Arc<RpcClient>,
    contract: Address,
    selectors: Selectors,
    gas: GasSettings,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl RpcGateway {
    pub fn new(
        rpc: Arc<RpcClient>,
        contract: Address,
        interface: &ContractInterface,
        gas: GasSettings,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Self {
        info!(
            contract = %hex_address(&contract),
            signer = signer.is_some(),
            "RPC gateway initialised"
        );
        Self {
            rpc,
            contract,
            selectors: interface.selectors(),
            gas,
            signer,
        }
    }

    async fn call<C>(&self, selector: [u8; 4], call: &C) -> Result<C::Return, ChainError>
    where
        C: SolCall,
    {
        let bytes = self.rpc.call(&self.contract, &abi::encode(selector, call)).await?;
        abi::decode_returns::<C>(&bytes)
    }

    async fn send(&self, data: Vec<u8>, value: u128, gas: u64) -> Result<TxHandle, ChainError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| ChainError::Signer("gateway has no transaction signer".into()))?;

        signer
            .sign_and_submit(TransactionRequest {
                to: self.contract,
                data,
                value,
                gas,
                gas_price: self.gas.gas_price,
            })
            .await
    }
}

#[async_trait]
impl ChainGateway for RpcGateway {
    async fn current_epoch(&self) -> Result<u64, ChainError> {
        let epoch = self
            .call(self.selectors.current_epoch, &abi::currentEpochCall {})
            .await?;
        abi::to_u64(epoch, "currentEpoch")
    }

    async fn round(&self, epoch: u64) -> Result<Round, ChainError> {
        let call = abi::roundsCall { epoch: abi::uint(epoch) };
        let round = self.call(self.selectors.rounds, &call).await?;
        abi::round_from_return(round)
    }

    async fn min_bet(&self) -> Result<Decimal, ChainError> {
        let wei = self
            .call(self.selectors.min_bet_amount, &abi::minBetAmountCall {})
            .await?;
        units::from_wei(abi::to_u128(wei, "minBetAmount")?)
    }

    async fn is_paused(&self) -> Result<bool, ChainError> {
        self.call(self.selectors.paused, &abi::pausedCall {}).await
    }

    async fn balance(&self, address: &str) -> Result<Decimal, ChainError> {
        let address = parse_address(address)?;
        let result = self
            .rpc
            .request("eth_getBalance", json!([hex_address(&address), "latest"]))
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::Malformed("eth_getBalance result is not a string".into()))?;
        units::from_wei(units::parse_quantity(hex)?)
    }

    async fn is_claimable(&self, epoch: u64, address: &str) -> Result<bool, ChainError> {
        let call = abi::claimableCall {
            epoch: abi::uint(epoch),
            user: parse_address(address)?,
        };
        self.call(self.selectors.claimable, &call).await
    }

    async fn submit_bet(
        &self,
        epoch: u64,
        position: Position,
        stake: Decimal,
    ) -> Result<TxHandle, ChainError> {
        let value = units::to_wei(stake)?;
        let epoch = abi::uint(epoch);
        let data = match position {
            Position::Bull => abi::encode(self.selectors.bet_bull, &abi::betBullCall { epoch }),
            Position::Bear => abi::encode(self.selectors.bet_bear, &abi::betBearCall { epoch }),
        };
        self.send(data, value, self.gas.bet_gas).await
    }

    async fn submit_claim(&self, epochs: &[u64]) -> Result<TxHandle, ChainError> {
        let call = abi::claimCall {
            epochs: epochs.iter().copied().map(abi::uint).collect(),
        };
        self.send(abi::encode(self.selectors.claim, &call), 0, self.gas.claim_gas).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
