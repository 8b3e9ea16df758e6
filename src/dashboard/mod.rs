//! Dashboard: read-only Axum server over engine snapshots.
//!
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use routes::AppState;

/// Bind the dashboard port and serve in a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;

    info!(port, "Dashboard server starting on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/status", get(routes::get_status))
        .route("/api/ledger", get(routes::get_ledger))
        .route("/api/ledger.csv", get(routes::get_ledger_csv))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSnapshot;
    use crate::types::{LedgerEntry, Position, TxHandle};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use routes::DashboardState;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let snapshot = EngineSnapshot {
            simulation: true,
            current_epoch: Some(100),
            ledger: vec![
                LedgerEntry::placed(100, Position::Bull, dec!(1), TxHandle::new("0xa")),
                LedgerEntry::placed(98, Position::Bear, dec!(2), TxHandle::new("0xb")),
            ],
            ..Default::default()
        };
        Arc::new(DashboardState::new(Arc::new(RwLock::new(snapshot))))
    }

    async fn get(uri: &str) -> axum::response::Response {
        build_router(test_state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(get("/health").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let resp = get("/api/status").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["current_epoch"], 100);
        assert_eq!(json["simulation"], true);
        assert_eq!(json["wagers"], 2);
    }

    #[tokio::test]
    async fn test_ledger_endpoint_descending() {
        let resp = get("/api/ledger").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.len(), 2);
        assert_eq!(json[0]["epoch"], 100);
        assert_eq!(json[0]["reward"]["state"], "unresolved");
    }

    #[tokio::test]
    async fn test_ledger_csv_download() {
        let resp = get("/api/ledger.csv").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );

        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let csv = String::from_utf8(body.to_vec()).unwrap();
        assert!(csv.starts_with("epoch,position,amount,transactionHandle,reward,claimHandle"));
        assert!(csv.contains("100,bull,1,0xa,,"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        assert_eq!(get("/api/cycles").await.status(), StatusCode::NOT_FOUND);
    }
}
