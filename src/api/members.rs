//! Member record endpoints.

use crate::api::{routes::AppState, ApiError};
use crate::models::{MemberFilters, MemberUpdate, NewMember};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

/// GET /api/members
pub async fn list_members(
    State(state): State<AppState>,
    Query(filters): Query<MemberFilters>,
) -> Result<Json<Value>, ApiError> {
    let members = state.members.list(&filters)?;

    Ok(Json(json!({
        "success": true,
        "data": members,
        "total": members.len(),
    })))
}

/// GET /api/members/:id
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;

    let member = state
        .members
        .find_by_id(id)?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": member })))
}

/// POST /api/members (Admin, HR Officer)
pub async fn create_member(
    State(state): State<AppState>,
    Json(payload): Json<NewMember>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if payload.full_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Full name is required".to_string()));
    }

    let member = state.members.create(&payload)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": member,
            "message": "Member created successfully",
        })),
    ))
}

/// PUT /api/members/:id (Admin, HR Officer)
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MemberUpdate>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;

    let member = state
        .members
        .update(id, &payload)?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": member,
        "message": "Member updated successfully",
    })))
}

/// DELETE /api/members/:id (Admin, HR Officer)
pub async fn delete_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;

    if state.members.find_by_id(id)?.is_none() {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }
    state.members.delete(id)?;

    Ok(Json(json!({
        "success": true,
        "message": "Member deleted successfully",
    })))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid member ID format".to_string()))
}
