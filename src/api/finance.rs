//! Financial ledger endpoints.

use crate::api::{routes::AppState, ApiError};
use crate::auth::models::User;
use crate::models::{NewTransaction, SummaryRange, TransactionFilters, TransactionStatus};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// GET /api/finance/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(filters): Query<TransactionFilters>,
) -> Result<Json<Value>, ApiError> {
    let transactions = state.finance.list(&filters)?;

    Ok(Json(json!({
        "success": true,
        "data": transactions,
        "total": transactions.len(),
    })))
}

/// GET /api/finance/transactions/:id
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;

    let transaction = state
        .finance
        .find_by_id(id)?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": transaction })))
}

/// GET /api/finance/summary
pub async fn finance_summary(
    State(state): State<AppState>,
    Query(range): Query<SummaryRange>,
) -> Result<Json<Value>, ApiError> {
    let summary = state.finance.summary(&range)?;

    Ok(Json(json!({ "success": true, "data": summary })))
}

/// POST /api/finance/transactions (Admin, Finance Officer)
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if payload.amount_cents <= 0 {
        return Err(ApiError::BadRequest("Amount must be positive".to_string()));
    }

    let transaction = state.finance.create(&payload, &user.email)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": transaction,
            "message": "Transaction recorded successfully",
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: TransactionStatus,
}

/// PUT /api/finance/transactions/:id/status (Admin, Finance Officer)
pub async fn update_transaction_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;

    let transaction = state
        .finance
        .update_status(id, payload.status)?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": transaction,
        "message": "Transaction status updated",
    })))
}

/// DELETE /api/finance/transactions/:id (Admin, Finance Officer)
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;

    if state.finance.find_by_id(id)?.is_none() {
        return Err(ApiError::NotFound("Transaction not found".to_string()));
    }
    state.finance.delete(id)?;

    Ok(Json(json!({
        "success": true,
        "message": "Transaction deleted successfully",
    })))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest("Invalid transaction ID format".to_string()))
}
