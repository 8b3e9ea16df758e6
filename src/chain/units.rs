//! Unit scaling between on-chain integers and `Decimal`.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::*;

use crate::error::ChainError;

/// Native token decimals (wei per ether).
pub const WEI_DECIMALS: u32 = 18;

/// Oracle price decimals.
pub const PRICE_DECIMALS: u32 = 8;

/// Convert a wei amount to decimal ether.
pub fn from_wei(wei: u128) -> Result<Decimal, ChainError> {
    let raw = i128::try_from(wei)
        .map_err(|_| ChainError::Malformed(format!("amount {wei} out of range")))?;
    Decimal::try_from_i128_with_scale(raw, WEI_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|_| ChainError::Malformed(format!("amount {wei} out of range")))
}

/// Convert decimal ether to wei. Sub-wei precision is truncated.
pub fn to_wei(amount: Decimal) -> Result<u128, ChainError> {
    if amount.is_sign_negative() {
        return Err(ChainError::Malformed(format!("negative amount {amount}")));
    }
    amount
        .checked_mul(Decimal::from(10u64.pow(WEI_DECIMALS)))
        .and_then(|scaled| scaled.trunc().to_u128())
        .ok_or_else(|| ChainError::Malformed(format!("amount {amount} out of range")))
}

/// Convert a fixed-point oracle price to decimal.
pub fn from_price(raw: i128) -> Result<Decimal, ChainError> {
    Decimal::try_from_i128_with_scale(raw, PRICE_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|_| ChainError::Malformed(format!("price {raw} out of range")))
}

/// Convert a unix timestamp (seconds) to an instant.
pub fn timestamp(secs: u64) -> Result<DateTime<Utc>, ChainError> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
        .ok_or_else(|| ChainError::Malformed(format!("timestamp {secs} out of range")))
}

/// Parse a JSON-RPC hex quantity (`"0x1bc16d674ec80000"`).
pub fn parse_quantity(value: &str) -> Result<u128, ChainError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Malformed(format!("quantity {value} lacks 0x prefix")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|_| ChainError::Malformed(format!("quantity {value} is not hex")))
}

/// Format an integer as a JSON-RPC hex quantity.
pub fn quantity(value: u128) -> String {
    format!("{value:#x}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
