//! End-to-end engine cycles in live mode against `ScriptedGateway`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use updown::config::AppConfig;
use updown::engine::accountant::BudgetState;
use updown::engine::Engine;
use updown::error::EngineError;
use updown::storage;
use updown::strategy;
use updown::types::{Position, TxHandle};

use crate::mock_gateway::{open_round, settled_round, ScriptedGateway};

const LIVE_TOML: &str = r#"
    [chain]
    contract_address = "0x18B2A687610328590Bc8F2e5fEdDe3b582A49cdA"
    rpc_url_env = "UPDOWN_RPC_URL"
    account_address = "0x4a6779DaA59d5C0467E48CAE716557099AF842e3"

    [tx]
    gas = 300000
    gas_price = 5000000000

    [retry]
    max_attempts = 3
    delay_ms = 0

    [bet]
    seconds_left = 10
    simulation = false

    [strategy]
    name = "same-before"
    base_bet = 0.01
    factor = 2.0
"#;

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn engine(gateway: &ScriptedGateway) -> Engine {
    let cfg = AppConfig::parse(LIVE_TOML).unwrap();
    let strategy = strategy::from_config(&cfg.strategy).unwrap();
    Engine::new(Arc::new(gateway.clone()), strategy, &cfg)
}

/// Epoch 100 open and locking 5s after `t0`, reference round 98 went up.
fn scripted() -> ScriptedGateway {
    let gateway = ScriptedGateway::new(100);
    let lock = t0() + Duration::seconds(5);
    gateway.put_round(settled_round(98, lock - Duration::minutes(10), dec!(300), dec!(301)));
    gateway.put_round(open_round(100, lock));
    gateway
}

/// Advance two epochs: round 100 settles and epoch 102 opens.
fn advance(gateway: &ScriptedGateway, lock_price: Decimal, close_price: Decimal) -> DateTime<Utc> {
    let now = t0() + Duration::minutes(10);
    gateway.put_round(settled_round(100, t0() + Duration::seconds(5), lock_price, close_price));
    gateway.put_round(open_round(102, now + Duration::seconds(5)));
    gateway.set_epoch(102);
    now
}

#[tokio::test]
async fn test_win_is_resolved_claimed_and_exported() {
    let gateway = scripted();
    let mut engine = engine(&gateway);

    let report = assert_ok!(engine.tick(t0()).await);
    assert_eq!(report.bet, Some(TxHandle::new("0xbet100")));
    assert_eq!(gateway.bets(), vec![(100, Position::Bull, dec!(0.01))]);

    let now = advance(&gateway, dec!(300), dec!(310));
    gateway.set_claimable(100);
    let report = assert_ok!(engine.tick(now).await);

    let claim = report.claim.unwrap();
    assert_eq!(claim.claimed, 1);
    assert_eq!(claim.handle, Some(TxHandle::new("0xclaim100")));
    assert_eq!(gateway.claims(), vec![vec![100]]);

    let entry = engine.ledger().find(100).unwrap();
    assert_eq!(entry.reward.value(), Some(dec!(0.04)));
    assert_eq!(entry.claim, Some(TxHandle::new("0xclaim100")));

    // A win resets the martingale to base.
    assert_eq!(gateway.bets()[1], (102, Position::Bull, dec!(0.01)));

    let csv = storage::ledger_csv(&engine.ledger().snapshot()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[1], "102,bull,0.01,0xbet102,,");
    assert_eq!(lines[2], "100,bull,0.01,0xbet100,0.04,0xclaim100");
}

#[tokio::test]
async fn test_loss_is_not_claimed_and_doubles_next_stake() {
    let gateway = scripted();
    let mut engine = engine(&gateway);

    assert_ok!(engine.tick(t0()).await);
    let now = advance(&gateway, dec!(310), dec!(300));
    let report = assert_ok!(engine.tick(now).await);

    assert_eq!(report.claim.map(|c| c.claimed), Some(0));
    assert!(gateway.claims().is_empty());
    assert_eq!(engine.ledger().find(100).unwrap().reward.value(), Some(dec!(-0.01)));

    // Round 100 went down, so the follow-up wager is bear at twice the stake.
    assert_eq!(gateway.bets()[1], (102, Position::Bear, dec!(0.02)));

    let budget = BudgetState::from_ledger(engine.ledger());
    assert_eq!(budget.total_spent, dec!(0.03));
    assert_eq!(budget.estimated_gain, dec!(-0.01));
    assert_eq!(budget.losses, 1);
    assert_eq!(budget.pending, 1);
}

#[tokio::test]
async fn test_transient_epoch_reads_are_retried() {
    let gateway = scripted();
    let mut engine = engine(&gateway);

    gateway.fail_epoch_reads(2);
    let report = assert_ok!(engine.tick(t0()).await);
    assert!(report.bet.is_some());
}

#[tokio::test]
async fn test_exhausted_retries_abort_tick_without_side_effects() {
    let gateway = scripted();
    let mut engine = engine(&gateway);

    gateway.fail_epoch_reads(3);
    let err = assert_err!(engine.tick(t0()).await);
    assert!(matches!(err, EngineError::RemoteUnavailable { attempts: 3, .. }));
    assert!(gateway.bets().is_empty());
    assert!(engine.ledger().is_empty());

    // The next tick recovers.
    assert_ok!(engine.tick(t0() + Duration::seconds(1)).await);
    assert_eq!(engine.ledger().len(), 1);
}

#[tokio::test]
async fn test_rejected_bet_is_not_recorded_or_resubmitted() {
    let gateway = scripted();
    gateway.reject_bets(true);
    let mut engine = engine(&gateway);

    assert_err!(engine.tick(t0()).await);
    assert!(engine.ledger().is_empty());

    assert_ok!(engine.tick(t0() + Duration::seconds(1)).await);
    assert_eq!(gateway.bets().len(), 1);
    assert!(engine.ledger().is_empty());
}

#[tokio::test]
async fn test_paused_contract_takes_no_wager() {
    let gateway = scripted();
    gateway.set_paused(true);
    let mut engine = engine(&gateway);

    let report = assert_ok!(engine.tick(t0()).await);
    assert!(report.bet.is_none());
    assert!(gateway.bets().is_empty());

    let snapshot = engine.snapshot_handle().read().await.clone();
    assert_eq!(snapshot.paused, Some(true));
    assert_eq!(snapshot.current_epoch, Some(100));
}
