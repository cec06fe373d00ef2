//! Router assembly: every protected route passes through the
//! authorization gate, writes additionally pass a role gate, and the
//! login endpoint sits behind the rate limiter.

use crate::api::{finance, members};
use crate::auth::api::{self as auth_api, AuthState};
use crate::auth::middleware::{optional_auth, require_admin, require_auth, require_role, AuthGate};
use crate::auth::models::Role;
use crate::auth::user_store::{IdentityResolver, UserStore};
use crate::auth::JwtHandler;
use crate::middleware::{rate_limit, RateLimiter};
use crate::store::{FinanceStore, MemberStore};
use axum::{
    middleware,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Member record writes
const MEMBER_WRITERS: &[Role] = &[Role::Admin, Role::HrOfficer];
/// Ledger writes
const FINANCE_WRITERS: &[Role] = &[Role::Admin, Role::FinanceOfficer];

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub members: Arc<MemberStore>,
    pub finance: Arc<FinanceStore>,
    pub jwt: Arc<JwtHandler>,
}

/// Create the API router.
///
/// `login_limiter` guards only the login endpoint; call sites can build
/// additional limiters with their own budgets.
pub fn build_router(state: AppState, login_limiter: RateLimiter) -> Router {
    let auth_state = AuthState::new(state.users.clone(), state.jwt.clone());
    let gate = AuthGate::new(
        state.jwt.clone(),
        state.users.clone() as Arc<dyn IdentityResolver>,
    );

    let auth_routes = Router::new()
        .route("/login", post(auth_api::login))
        .route_layer(middleware::from_fn_with_state(login_limiter, rate_limit))
        .merge(
            Router::new()
                .route("/me", get(auth_api::me))
                .route("/password", post(auth_api::change_password))
                .route_layer(middleware::from_fn_with_state(gate.clone(), require_auth)),
        )
        .merge(
            Router::new()
                .route("/session", get(auth_api::session))
                .route_layer(middleware::from_fn_with_state(gate.clone(), optional_auth)),
        )
        .with_state(auth_state.clone());

    let admin_routes = Router::new()
        .route(
            "/users",
            get(auth_api::list_users).post(auth_api::create_user),
        )
        .route(
            "/users/:id",
            put(auth_api::update_user).delete(auth_api::delete_user),
        )
        .route("/users/:id/activate", post(auth_api::activate_user))
        .route("/users/:id/deactivate", post(auth_api::deactivate_user))
        .route_layer(middleware::from_fn(require_admin()))
        .route_layer(middleware::from_fn_with_state(gate.clone(), require_auth))
        .with_state(auth_state);

    let member_routes = Router::new()
        .route("/", post(members::create_member))
        .route(
            "/:id",
            put(members::update_member).delete(members::delete_member),
        )
        .route_layer(middleware::from_fn(require_role(MEMBER_WRITERS)))
        .route("/", get(members::list_members))
        .route("/:id", get(members::get_member))
        .route_layer(middleware::from_fn_with_state(gate.clone(), require_auth))
        .with_state(state.clone());

    let finance_routes = Router::new()
        .route("/transactions", post(finance::create_transaction))
        .route(
            "/transactions/:id/status",
            put(finance::update_transaction_status),
        )
        .route("/transactions/:id", delete(finance::delete_transaction))
        .route_layer(middleware::from_fn(require_role(FINANCE_WRITERS)))
        .route("/transactions", get(finance::list_transactions))
        .route("/transactions/:id", get(finance::get_transaction))
        .route("/summary", get(finance::finance_summary))
        .route_layer(middleware::from_fn_with_state(gate, require_auth))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/members", member_routes)
        .nest("/api/finance", finance_routes)
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
