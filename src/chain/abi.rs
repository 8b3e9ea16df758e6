//! Prediction contract ABI.
//!
//! Calls and return tuples are declared with `sol!` and encoded by alloy.
//! Function selectors come from the configurable `ContractInterface`, so a
//! deployment that renames a function can still be driven as long as its
//! argument and return types match Prediction V2.

use alloy::primitives::{keccak256, I256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use serde::Deserialize;

use super::units;
use crate::error::ChainError;
use crate::types::Round;

sol! {
    /// PancakeSwap Prediction V2, as far as the engine uses it.
    interface Prediction {
        function currentEpoch() external view returns (uint256);

        function rounds(uint256 epoch) external view returns (
            uint256 epoch,
            uint256 startTimestamp,
            uint256 lockTimestamp,
            uint256 closeTimestamp,
            int256 lockPrice,
            int256 closePrice,
            uint256 lockOracleId,
            uint256 closeOracleId,
            uint256 totalAmount,
            uint256 bullAmount,
            uint256 bearAmount,
            uint256 rewardBaseCalAmount,
            uint256 rewardAmount,
            bool oracleCalled
        );

        function minBetAmount() external view returns (uint256);

        function paused() external view returns (bool);

        function claimable(uint256 epoch, address user) external view returns (bool);

        function betBull(uint256 epoch) external payable;

        function betBear(uint256 epoch) external payable;

        function claim(uint256[] epochs) external;
    }
}

pub use Prediction::{
    betBearCall, betBullCall, claimCall, claimableCall, currentEpochCall, minBetAmountCall,
    pausedCall, roundsCall, roundsReturn,
};

// ---------------------------------------------------------------------------
// Interface descriptor
// ---------------------------------------------------------------------------

/// Function signatures of the prediction contract.
///
/// Defaults match the PancakeSwap Prediction V2 contract; individual
/// signatures can be overridden from config.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContractInterface {
    pub current_epoch: String,
    pub rounds: String,
    pub min_bet_amount: String,
    pub paused: String,
    pub claimable: String,
    pub bet_bull: String,
    pub bet_bear: String,
    pub claim: String,
}

impl Default for ContractInterface {
    fn default() -> Self {
        Self {
            current_epoch: currentEpochCall::SIGNATURE.into(),
            rounds: roundsCall::SIGNATURE.into(),
            min_bet_amount: minBetAmountCall::SIGNATURE.into(),
            paused: pausedCall::SIGNATURE.into(),
            claimable: claimableCall::SIGNATURE.into(),
            bet_bull: betBullCall::SIGNATURE.into(),
            bet_bear: betBearCall::SIGNATURE.into(),
            claim: claimCall::SIGNATURE.into(),
        }
    }
}

impl ContractInterface {
    pub fn selectors(&self) -> Selectors {
        Selectors {
            current_epoch: selector(&self.current_epoch),
            rounds: selector(&self.rounds),
            min_bet_amount: selector(&self.min_bet_amount),
            paused: selector(&self.paused),
            claimable: selector(&self.claimable),
            bet_bull: selector(&self.bet_bull),
            bet_bear: selector(&self.bet_bear),
            claim: selector(&self.claim),
        }
    }
}

/// Precomputed 4-byte function selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selectors {
    pub current_epoch: [u8; 4],
    pub rounds: [u8; 4],
    pub min_bet_amount: [u8; 4],
    pub paused: [u8; 4],
    pub claimable: [u8; 4],
    pub bet_bull: [u8; 4],
    pub bet_bear: [u8; 4],
    pub claim: [u8; 4],
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

// ---------------------------------------------------------------------------
// Encoding / decoding
// ---------------------------------------------------------------------------

/// Calldata for `call` under `selector`.
pub fn encode<C: SolCall>(selector: [u8; 4], call: &C) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + call.abi_encoded_size());
    out.extend_from_slice(&selector);
    call.abi_encode_raw(&mut out);
    out
}

/// Decode the return data of `C`.
pub fn decode_returns<C: SolCall>(data: &[u8]) -> Result<C::Return, ChainError> {
    C::abi_decode_returns(data)
        .map_err(|e| ChainError::Malformed(format!("{} returned bad data: {e}", C::SIGNATURE)))
}

/// Decode an `0x`-prefixed hex return value into bytes.
pub fn decode_hex(data: &str) -> Result<Vec<u8>, ChainError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits).map_err(|e| ChainError::Malformed(format!("invalid hex data: {e}")))
}

pub fn uint(value: u64) -> U256 {
    U256::from(value)
}

pub fn to_u64(value: U256, field: &str) -> Result<u64, ChainError> {
    u64::try_from(value)
        .map_err(|_| ChainError::Malformed(format!("{field} {value} exceeds 64 bits")))
}

pub fn to_u128(value: U256, field: &str) -> Result<u128, ChainError> {
    u128::try_from(value)
        .map_err(|_| ChainError::Malformed(format!("{field} {value} exceeds 128 bits")))
}

fn to_i128(value: I256, field: &str) -> Result<i128, ChainError> {
    i128::try_from(value)
        .map_err(|_| ChainError::Malformed(format!("{field} {value} exceeds 128 bits")))
}

/// Scale a decoded `rounds(uint256)` tuple into a `Round`.
pub fn round_from_return(r: roundsReturn) -> Result<Round, ChainError> {
    Ok(Round {
        epoch: to_u64(r.epoch, "epoch")?,
        start_at: units::timestamp(to_u64(r.startTimestamp, "startTimestamp")?)?,
        lock_at: units::timestamp(to_u64(r.lockTimestamp, "lockTimestamp")?)?,
        close_at: units::timestamp(to_u64(r.closeTimestamp, "closeTimestamp")?)?,
        lock_price: units::from_price(to_i128(r.lockPrice, "lockPrice")?)?,
        close_price: units::from_price(to_i128(r.closePrice, "closePrice")?)?,
        total_amount: units::from_wei(to_u128(r.totalAmount, "totalAmount")?)?,
        bull_amount: units::from_wei(to_u128(r.bullAmount, "bullAmount")?)?,
        bear_amount: units::from_wei(to_u128(r.bearAmount, "bearAmount")?)?,
        reward_base_amount: units::from_wei(to_u128(
            r.rewardBaseCalAmount,
            "rewardBaseCalAmount",
        )?)?,
        reward_amount: units::from_wei(to_u128(r.rewardAmount, "rewardAmount")?)?,
        oracle_called: r.oracleCalled,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
