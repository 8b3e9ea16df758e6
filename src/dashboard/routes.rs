//! Dashboard API route handlers.
//!
//! Every handler reads the latest published `EngineSnapshot`; nothing here
//! can reach the live ledger.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::engine::accountant::{BudgetState, StopReason};
use crate::engine::SharedSnapshot;
use crate::storage;
use crate::types::{EpochWindow, LedgerEntry, RoundStats};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct DashboardState {
    pub snapshot: SharedSnapshot,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(snapshot: SharedSnapshot) -> Self {
        Self {
            snapshot,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub simulation: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub current_epoch: Option<u64>,
    pub window: Option<EpochWindow>,
    pub stats: Option<RoundStats>,
    pub paused: Option<bool>,
    pub balance: Option<Decimal>,
    pub min_bet: Option<Decimal>,
    pub budget: BudgetState,
    pub stop_reason: Option<StopReason>,
    pub wagers: usize,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snap = state.snapshot.read().await;
    Json(StatusResponse {
        simulation: snap.simulation,
        updated_at: snap.updated_at,
        current_epoch: snap.current_epoch,
        window: snap.window,
        stats: snap.stats.clone(),
        paused: snap.paused,
        balance: snap.balance,
        min_bet: snap.min_bet,
        budget: snap.budget.clone(),
        stop_reason: snap.stop_reason.clone(),
        wagers: snap.ledger.len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /api/ledger
pub async fn get_ledger(State(state): State<AppState>) -> Json<Vec<LedgerEntry>> {
    let snap = state.snapshot.read().await;
    Json(snap.ledger.clone())
}

/// GET /api/ledger.csv
pub async fn get_ledger_csv(State(state): State<AppState>) -> Response {
    let entries = state.snapshot.read().await.ledger.clone();
    match storage::ledger_csv(&entries) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"running.csv\""),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Ledger CSV export failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
