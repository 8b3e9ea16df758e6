//! UPDOWN: epoch lifecycle and betting ledger engine.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the chain gateway into the engine, and runs the control loop until
//! a stop condition triggers or Ctrl+C. The ledger is exported on exit.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};

use updown::chain::rpc::{parse_address, GasSettings, RpcClient, RpcGateway};
use updown::chain::signer::{ConfirmationPolicy, NodeAccountSigner, TransactionSigner};
use updown::chain::ChainGateway;
use updown::config::AppConfig;
use updown::dashboard::{self, routes::DashboardState};
use updown::engine::Engine;
use updown::storage;
use updown::strategy::{self, martingale::required_budget};

const BANNER: &str = r#"
 _   _ ____  ____   _____        ___   _
| | | |  _ \|  _ \ / _ \ \      / / \ | |
| | | | |_) | | | | | | \ \ /\ / /|  \| |
| |_| |  __/| |_| | |_| |\ V  V / | |\  |
 \___/|_|   |____/ \___/  \_/\_/  |_| \_|

  Epoch-based up/down prediction engine
  v0.1.0
"#;

/// Consecutive losses shown in the startup budget estimate when no stop
/// limit is configured.
const DEFAULT_BUDGET_ROUNDS: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");

    let run_id = uuid::Uuid::new_v4();
    run(cfg).instrument(info_span!("run", %run_id)).await
}

async fn run(cfg: AppConfig) -> Result<()> {
    info!(
        contract = %cfg.chain.contract_address,
        account = %cfg.chain.account_address,
        simulation = cfg.bet.simulation,
        strategy = %cfg.strategy.name,
        "UPDOWN starting up"
    );

    let rounds = match cfg.stop.max_consecutive_losses {
        0 => DEFAULT_BUDGET_ROUNDS,
        n => n + 1,
    };
    info!(
        rounds,
        required = %required_budget(cfg.strategy.base_bet, cfg.strategy.factor, rounds),
        "Budget needed to survive a losing streak"
    );

    // -- Chain gateway -----------------------------------------------------

    let rpc = Arc::new(RpcClient::new(
        cfg.rpc_url()?,
        Duration::from_secs(cfg.chain.request_timeout_secs),
    )?);
    let contract = parse_address(&cfg.chain.contract_address)
        .context("Invalid contract address")?;

    let signer: Option<Arc<dyn TransactionSigner>> = if cfg.bet.simulation {
        None
    } else if cfg.chain.node_signer {
        let from = parse_address(&cfg.chain.account_address)
            .context("Invalid account address")?;
        Some(Arc::new(NodeAccountSigner::new(
            rpc.clone(),
            from,
            ConfirmationPolicy {
                poll_interval: Duration::from_millis(cfg.chain.confirmation_poll_ms),
                max_polls: cfg.chain.confirmation_max_polls,
            },
        )))
    } else {
        warn!("Live mode without a transaction signer: submissions will be rejected");
        None
    };

    let gas = GasSettings {
        bet_gas: cfg.tx.gas,
        claim_gas: cfg.tx.claim_gas,
        gas_price: u128::from(cfg.tx.gas_price),
    };
    let gateway: Arc<dyn ChainGateway> = Arc::new(RpcGateway::new(
        rpc,
        contract,
        &cfg.chain.interface,
        gas,
        signer,
    ));

    // -- Engine -------------------------------------------------------------

    let strategy = strategy::from_config(&cfg.strategy)?;
    let mut engine = Engine::new(gateway, strategy, &cfg);

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(engine.snapshot_handle()));
        dashboard::spawn_dashboard(state, cfg.dashboard.port).await?;
    }

    info!(
        poll_ms = engine.poll_interval().as_millis() as u64,
        "Entering main loop. Press Ctrl+C to stop."
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    let stop = engine.run(shutdown).await;

    let entries = engine.ledger().snapshot();
    storage::export_ledger(&entries, cfg.export.path.as_deref())?;

    info!(
        wagers = entries.len(),
        stop_reason = ?stop,
        "UPDOWN shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("updown=info"));

    let json_logging = std::env::var("UPDOWN_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
