//! Authentication API Endpoints
//! Mission: Provide login, session, and user management endpoints

use crate::auth::{
    jwt::JwtHandler,
    models::{
        LoginRequest, LoginResponse, NewUser, PasswordChangeRequest, User, UserFilters,
        UserResponse, UserUpdate,
    },
    user_store::UserStore,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let user = state
        .user_store
        .verify_password(&payload.email, &payload.password)
        .map_err(|err| {
            error!(error = %err, "Credential check failed");
            AuthApiError::InternalError
        })?
        .ok_or_else(|| {
            warn!(email = %payload.email, "Failed login attempt");
            AuthApiError::InvalidCredentials
        })?;

    let (token, expires_in) = state.jwt_handler.issue(&user).map_err(|err| {
        error!(error = %err, "Token issuance failed");
        AuthApiError::InternalError
    })?;

    if let Err(err) = state.user_store.touch_last_login(user.id) {
        // Login still succeeds; the timestamp is best-effort
        warn!(error = %err, "Failed to record last login");
    }

    info!("✅ Login successful: {} ({})", user.email, user.role.as_str());

    Ok(Json(LoginResponse {
        token,
        expires_in,
        user: UserResponse::from_user(&user),
    }))
}

/// Current account info - GET /api/auth/me (behind mandatory auth)
pub async fn me(Extension(user): Extension<User>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": UserResponse::from_user(&user),
    }))
}

/// Session probe - GET /api/auth/session (behind optional auth).
///
/// Anonymous callers get `authenticated: false` instead of a rejection.
pub async fn session(user: Option<Extension<User>>) -> Json<Value> {
    match user {
        Some(Extension(user)) => Json(json!({
            "success": true,
            "data": {
                "authenticated": true,
                "user": UserResponse::from_user(&user),
            },
        })),
        None => Json(json!({
            "success": true,
            "data": { "authenticated": false },
        })),
    }
}

/// Self-service password change - POST /api/auth/password
pub async fn change_password(
    State(state): State<AuthState>,
    Extension(user): Extension<User>,
    Json(payload): Json<PasswordChangeRequest>,
) -> Result<Json<Value>, AuthApiError> {
    if payload.new_password.len() < 8 {
        return Err(AuthApiError::WeakPassword);
    }

    state
        .user_store
        .verify_password(&user.email, &payload.current_password)
        .map_err(|err| {
            error!(error = %err, "Credential check failed");
            AuthApiError::InternalError
        })?
        .ok_or(AuthApiError::InvalidCredentials)?;

    state
        .user_store
        .update_password(user.id, &payload.new_password)
        .map_err(|err| {
            error!(error = %err, "Password update failed");
            AuthApiError::InternalError
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Password updated successfully",
    })))
}

/// List all users - GET /api/admin/users (Admin only)
pub async fn list_users(
    State(state): State<AuthState>,
    Query(filters): Query<UserFilters>,
) -> Result<Json<Value>, AuthApiError> {
    let users = state.user_store.list(&filters).map_err(|err| {
        error!(error = %err, "User listing failed");
        AuthApiError::InternalError
    })?;

    let data: Vec<UserResponse> = users.iter().map(UserResponse::from_user).collect();

    Ok(Json(json!({
        "success": true,
        "data": data,
        "total": data.len(),
    })))
}

/// Create user - POST /api/admin/users (Admin only)
pub async fn create_user(
    State(state): State<AuthState>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<Value>), AuthApiError> {
    if payload.password.len() < 8 {
        return Err(AuthApiError::WeakPassword);
    }

    let user = state.user_store.create(&payload).map_err(|err| {
        warn!(error = %err, "Failed to create user");
        AuthApiError::UserAlreadyExists
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": UserResponse::from_user(&user),
            "message": "User created successfully",
        })),
    ))
}

/// Update user - PUT /api/admin/users/:id (Admin only)
pub async fn update_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<Value>, AuthApiError> {
    let id = parse_user_id(&user_id)?;

    let user = state
        .user_store
        .update(id, &payload)
        .map_err(|err| {
            warn!(error = %err, "Failed to update user");
            AuthApiError::InternalError
        })?
        .ok_or(AuthApiError::UserNotFound)?;

    Ok(Json(json!({
        "success": true,
        "data": UserResponse::from_user(&user),
        "message": "User updated successfully",
    })))
}

/// Activate account - POST /api/admin/users/:id/activate (Admin only)
pub async fn activate_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AuthApiError> {
    set_user_active(&state, &user_id, true).await
}

/// Deactivate account - POST /api/admin/users/:id/deactivate (Admin only)
///
/// This is the only revocation mechanism: tokens stay valid until expiry,
/// but a deactivated account fails the gate on its very next request.
pub async fn deactivate_user(
    State(state): State<AuthState>,
    Extension(current): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AuthApiError> {
    let id = parse_user_id(&user_id)?;

    if id == current.id {
        return Err(AuthApiError::CannotDeactivateSelf);
    }

    set_user_active(&state, &user_id, false).await
}

async fn set_user_active(
    state: &AuthState,
    user_id: &str,
    active: bool,
) -> Result<Json<Value>, AuthApiError> {
    let id = parse_user_id(user_id)?;

    let user = state
        .user_store
        .set_active(id, active)
        .map_err(|err| {
            error!(error = %err, "Account status change failed");
            AuthApiError::InternalError
        })?
        .ok_or(AuthApiError::UserNotFound)?;

    Ok(Json(json!({
        "success": true,
        "data": UserResponse::from_user(&user),
        "message": if active {
            "Account activated"
        } else {
            "Account deactivated"
        },
    })))
}

/// Delete user - DELETE /api/admin/users/:id (Admin only)
pub async fn delete_user(
    State(state): State<AuthState>,
    Extension(current): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AuthApiError> {
    let id = parse_user_id(&user_id)?;

    // Don't allow deleting yourself
    if id == current.id {
        return Err(AuthApiError::CannotDeleteSelf);
    }

    state
        .user_store
        .delete(id)
        .map_err(|_| AuthApiError::UserNotFound)?;

    info!("🗑️  User deleted: {}", user_id);

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}

fn parse_user_id(raw: &str) -> Result<Uuid, AuthApiError> {
    Uuid::parse_str(raw).map_err(|_| AuthApiError::InvalidUserId)
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    UserNotFound,
    UserAlreadyExists,
    WeakPassword,
    InvalidUserId,
    CannotDeleteSelf,
    CannotDeactivateSelf,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            AuthApiError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthApiError::UserAlreadyExists => (StatusCode::CONFLICT, "Email already exists"),
            AuthApiError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                "Password must be at least 8 characters",
            ),
            AuthApiError::InvalidUserId => (StatusCode::BAD_REQUEST, "Invalid user ID format"),
            AuthApiError::CannotDeleteSelf => {
                (StatusCode::BAD_REQUEST, "Cannot delete your own account")
            }
            AuthApiError::CannotDeactivateSelf => (
                StatusCode::BAD_REQUEST,
                "Cannot deactivate your own account",
            ),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use chrono::Utc;

    #[test]
    fn test_auth_api_error_responses() {
        let invalid_creds = AuthApiError::InvalidCredentials.into_response();
        assert_eq!(invalid_creds.status(), StatusCode::UNAUTHORIZED);

        let not_found = AuthApiError::UserNotFound.into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict = AuthApiError::UserAlreadyExists.into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let weak = AuthApiError::WeakPassword.into_response();
        assert_eq!(weak.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_user_response_from_user() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.org".to_string(),
            password_hash: "hash123".to_string(),
            role: Role::User,
            department: None,
            employee_id: None,
            phone: None,
            is_active: true,
            created_at: Utc::now().to_rfc3339(),
            last_login: None,
        };

        let response = UserResponse::from_user(&user);
        assert_eq!(response.email, "test@example.org");
        assert_eq!(response.role, Role::User);
    }
}
