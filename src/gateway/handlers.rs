//! Intake handlers used by the game-server plugin
//!
//! Review actions (approve/reject) are not routed here; they belong to the
//! presentation layer that checks the reviewer's role.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use super::state::AppState;
use super::types::{ApiError, ApiResponse, CreateWithdrawalBody, HealthResponse, ListQuery};
use crate::withdrawal::{DEFAULT_LIST_LIMIT, RequestId, WithdrawalRequest, WithdrawalStatus};

/// Upper bound for `GET /withdrawals?limit=`
pub const MAX_LIST_LIMIT: u32 = 200;

/// Health check
///
/// - Healthy: 200 OK + {code: 0, data: {status: "ok", ...}}
/// - Store closed: 503 + {code: 5001}
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let closed = state.manager.store().is_closed().await;
    let (status, label) = if closed {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else {
        (StatusCode::OK, "ok")
    };

    let mut body = ApiResponse::success(HealthResponse {
        status: label.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        executor: state.manager.executor_name().to_string(),
        timestamp_ms: Utc::now().timestamp_millis(),
    });
    if closed {
        body.code = super::types::error_codes::SERVICE_UNAVAILABLE;
        body.msg = label.to_string();
    }
    (status, Json(body))
}

/// POST /withdrawals
pub async fn create_withdrawal(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateWithdrawalBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<WithdrawalRequest>>), ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let input = body.into_new_withdrawal()?;

    let request = state.manager.create_request(input).await?;
    info!(
        request_id = request.id,
        player = %request.player_name,
        "Withdrawal request accepted"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(request))))
}

/// GET /withdrawals/{id}
pub async fn get_withdrawal(
    State(state): State<Arc<AppState>>,
    id: Result<Path<RequestId>, PathRejection>,
) -> Result<Json<ApiResponse<WithdrawalRequest>>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = state.manager.get_request(id).await?;
    Ok(Json(ApiResponse::success(request)))
}

/// GET /withdrawals?status=&limit=
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<WithdrawalRequest>>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(WithdrawalStatus::from_str(raw).map_err(ApiError::bad_request)?),
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        )));
    }

    let requests = state.manager.list_requests(status, limit).await?;
    Ok(Json(ApiResponse::success(requests)))
}
