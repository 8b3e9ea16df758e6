//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. The
//! resulting `AppConfig` is built once in `main` and handed by reference to
//! each component constructor. Secrets (the RPC URL, which usually embeds a
//! provider key) are referenced by env-var name and resolved at runtime.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::chain::abi::ContractInterface;
use crate::engine::evaluator::DrawRule;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub tx: TxConfig,
    pub retry: RetryConfig,
    pub bet: BetConfig,
    #[serde(default)]
    pub claim: ClaimConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub stop: StopConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    /// Prediction contract address.
    pub contract_address: String,
    /// Name of the env var holding the RPC endpoint URL.
    pub rpc_url_env: String,
    /// Wallet address used for balance and claimability queries.
    pub account_address: String,
    /// Sign through the node's own account (`eth_sendTransaction`).
    #[serde(default)]
    pub node_signer: bool,
    /// Contract function signatures. Defaults to Prediction V2.
    #[serde(default)]
    pub interface: ContractInterface,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,
    #[serde(default = "default_confirmation_max_polls")]
    pub confirmation_max_polls: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TxConfig {
    /// Gas limit for wager transactions.
    pub gas: u64,
    /// Gas price in wei.
    pub gas_price: u64,
    /// Gas limit for claim transactions (batches are larger).
    #[serde(default = "default_claim_gas")]
    pub claim_gas: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BetConfig {
    /// Seconds before lock at which the bet window opens.
    pub seconds_left: u64,
    /// Simulation mode: never submit transactions.
    pub simulation: bool,
    /// Use the locally estimated window instead of the round's own lock time.
    #[serde(default)]
    pub estimated_timing: bool,
    #[serde(default)]
    pub epochs: EpochFilter,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Which epochs are eligible for betting.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EpochFilter {
    #[default]
    All,
    Even,
    Odd,
}

impl EpochFilter {
    pub fn accepts(&self, epoch: u64) -> bool {
        match self {
            EpochFilter::All => true,
            EpochFilter::Even => epoch % 2 == 0,
            EpochFilter::Odd => epoch % 2 == 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClaimConfig {
    pub enabled: bool,
    /// Legacy fixed scan window. When unset, scans down to the oldest
    /// ledger epoch.
    pub lookback_epochs: Option<u64>,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_epochs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub draw_rule: DrawRule,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StrategyConfig {
    /// `same-before`, `bullish` or `bearish`.
    pub name: String,
    pub base_bet: Decimal,
    /// Martingale multiplier after a loss. `0` selects recovery sizing.
    pub factor: Decimal,
    #[serde(default)]
    pub safe_bet: Decimal,
}

/// Stop conditions. Zero disables a condition.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StopConfig {
    pub max_loss: Decimal,
    pub spend_limit: Decimal,
    pub gain_target: Decimal,
    pub max_consecutive_losses: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExportConfig {
    /// Ledger CSV written on shutdown.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_confirmation_poll_ms() -> u64 {
    1000
}

fn default_confirmation_max_polls() -> u32 {
    60
}

fn default_claim_gas() -> u64 {
    800_000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and sanity-check configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.retry.max_attempts > 0, "retry.max_attempts must be positive");
        anyhow::ensure!(
            self.strategy.base_bet > Decimal::ZERO,
            "strategy.base_bet must be positive"
        );
        anyhow::ensure!(
            self.bet.seconds_left < crate::engine::tracker::ROUND_DURATION_SECS,
            "bet.seconds_left must be shorter than a round"
        );
        Ok(())
    }

    /// Resolve the RPC endpoint from its env var.
    pub fn rpc_url(&self) -> Result<SecretString> {
        Self::resolve_env(&self.chain.rpc_url_env).map(SecretString::new)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

/// Minimal simulation config used across unit tests.
#[cfg(test)]
pub(crate) const SAMPLE_TOML: &str = r#"
    [chain]
    contract_address = "0x18B2A687610328590Bc8F2e5fEdDe3b582A49cdA"
    rpc_url_env = "UPDOWN_RPC_URL"
    account_address = "0x4a6779DaA59d5C0467E48CAE716557099AF842e3"

    [tx]
    gas = 300000
    gas_price = 5000000000

    [retry]
    max_attempts = 3
    delay_ms = 500

    [bet]
    seconds_left = 10
    simulation = true

    [strategy]
    name = "same-before"
    base_bet = 0.01
    factor = 2.0
"#;

#[cfg(test)]
impl AppConfig {
    pub fn sample() -> Self {
        Self::parse(SAMPLE_TOML).unwrap()
    }
}
