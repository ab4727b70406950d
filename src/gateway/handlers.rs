//! Boundary HTTP handlers
//!
//! Liveness, FX-rate lookup, recent-game history, and the feature-gated mock
//! deposit. These call into the store/escrow but carry no game logic.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::state::AppState;
use crate::store::GameRecord;

pub mod error_codes {
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);

fn internal_error(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error(error_codes::INTERNAL_ERROR, msg)),
    )
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// GET /api/v1/fx/usd-zar
#[derive(Debug, Serialize)]
pub struct FxRateData {
    pub base: &'static str,
    pub quote: &'static str,
    pub rate: Decimal,
}

pub async fn fx_rate(State(state): State<Arc<AppState>>) -> Json<ApiResponse<FxRateData>> {
    let rate = state.fx.usd_zar_rate().await;
    Json(ApiResponse::success(FxRateData {
        base: "USD",
        quote: "ZAR",
        rate,
    }))
}

/// GET /api/v1/games/recent/{account_id}?limit=&offset=
#[derive(Debug, Deserialize)]
pub struct RecentGamesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGameRow {
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_id: Option<String>,
    pub opponent_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stake: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot: Option<Decimal>,
    pub result: String,
    pub delta: Decimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct RecentGamesData {
    pub games: Vec<RecentGameRow>,
}

pub async fn recent_games(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Query(query): Query<RecentGamesQuery>,
) -> Result<Json<ApiResponse<RecentGamesData>>, ApiError> {
    let limit = query.limit.unwrap_or(5).clamp(1, 50);
    let offset = query.offset.unwrap_or(0).max(0);

    let records = state
        .store
        .recent_games(&account_id, limit, offset)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    let mut games = Vec::with_capacity(records.len());
    for record in records {
        games.push(to_row(&state, &account_id, record).await);
    }
    Ok(Json(ApiResponse::success(RecentGamesData { games })))
}

async fn to_row(state: &AppState, account_id: &str, record: GameRecord) -> RecentGameRow {
    let opponent_id = if record.white_id.as_deref() == Some(account_id) {
        record.black_id.clone()
    } else {
        record.white_id.clone()
    };
    let opponent_name = match &opponent_id {
        Some(id) => state
            .store
            .display_name(id)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| id.chars().take(8).collect()),
        None => "Opponent".to_string(),
    };

    let won = record.winner_id.as_deref() == Some(account_id);
    let lost = record.loser_id.as_deref() == Some(account_id);
    let stake = record.stake.unwrap_or(Decimal::ZERO);
    let delta = if record.result == "draw" {
        Decimal::ZERO
    } else if won {
        stake * Decimal::TWO
    } else if lost {
        -stake
    } else {
        Decimal::ZERO
    };

    RecentGameRow {
        room_id: record.room_id,
        opponent_id,
        opponent_name,
        stake: record.stake,
        pot: record.pot,
        result: record.result,
        delta,
        created_at: record.created_at,
    }
}

/// Internal Mock Deposit (Debug/Test Trigger)
///
/// [SECURITY WARNING] This endpoint is for development/testing ONLY.
/// It allows direct injection of funds into balances without a real payment
/// gateway notification.
///
/// POST /internal/mock/deposit
#[cfg(feature = "mock-api")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDepositRequest {
    pub account_id: String,
    pub amount: Decimal,
}

#[cfg(feature = "mock-api")]
pub async fn mock_deposit(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(req): Json<MockDepositRequest>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    use crate::store::TxKind;

    let secret = headers
        .get("X-Internal-Secret")
        .and_then(|v| v.to_str().ok());
    if secret != Some("dev-secret") {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error(
                error_codes::AUTH_FAILED,
                "Access Denied: Missing or Invalid X-Internal-Secret",
            )),
        ));
    }

    if req.amount <= Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(
                error_codes::INVALID_PARAMETER,
                "Invalid amount",
            )),
        ));
    }

    state
        .escrow
        .credit(&req.account_id, req.amount, TxKind::Deposit, None)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(format!(
        "Deposited {} to {}",
        req.amount, req.account_id
    ))))
}
