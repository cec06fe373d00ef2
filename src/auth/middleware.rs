//! Authentication Middleware
//! Mission: Gate every protected route behind token verification and RBAC

use crate::auth::jwt::{JwtHandler, TokenError};
use crate::auth::models::{Role, User};
use crate::auth::user_store::IdentityResolver;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::error;
use uuid::Uuid;

const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the authorization gate.
///
/// The verifier holds the process-wide signing secret; the resolver sits
/// behind a trait seam and is re-queried on every request.
#[derive(Clone)]
pub struct AuthGate {
    pub verifier: Arc<JwtHandler>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub resolver_timeout: Duration,
}

impl AuthGate {
    pub fn new(verifier: Arc<JwtHandler>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            verifier,
            resolver,
            resolver_timeout: DEFAULT_RESOLVER_TIMEOUT,
        }
    }

    pub fn with_resolver_timeout(mut self, resolver_timeout: Duration) -> Self {
        self.resolver_timeout = resolver_timeout;
        self
    }
}

/// Mandatory auth middleware.
///
/// Verifies the bearer token, re-resolves the account (fresh on every
/// request - deactivation takes effect immediately), and binds it into the
/// request extensions for downstream handlers and role checks.
pub async fn require_auth(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req).ok_or(AuthError::NoToken)?;

    let claims = gate
        .verifier
        .verify(&token, Utc::now())
        .map_err(|err| match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Malformed | TokenError::BadSignature => AuthError::InvalidToken,
        })?;

    let user = resolve_subject(&gate, &claims.sub).await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Optional auth middleware - continues without an identity on any failure.
///
/// Handlers behind this can distinguish anonymous from authenticated
/// callers, but no token problem ever turns into a rejection here.
pub async fn optional_auth(State(gate): State<AuthGate>, mut req: Request, next: Next) -> Response {
    if let Some(token) = bearer_token(&req) {
        if let Ok(claims) = gate.verifier.verify(&token, Utc::now()) {
            if let Ok(user) = resolve_subject(&gate, &claims.sub).await {
                req.extensions_mut().insert(user);
            }
        }
    }

    next.run(req).await
}

/// Verified subject -> active account, with a bounded wait on the store.
async fn resolve_subject(gate: &AuthGate, subject: &str) -> Result<User, AuthError> {
    // A claim whose subject is not a well-formed id can never resolve
    let id = Uuid::parse_str(subject).map_err(|_| AuthError::InvalidToken)?;

    let resolved = timeout(gate.resolver_timeout, gate.resolver.resolve(id))
        .await
        .map_err(|_| {
            error!(
                subject = %id,
                timeout_ms = gate.resolver_timeout.as_millis() as u64,
                "Identity lookup timed out"
            );
            AuthError::Internal
        })?
        .map_err(|err| {
            error!(subject = %id, error = %err, "Identity lookup failed");
            AuthError::Internal
        })?;

    let user = resolved.ok_or(AuthError::UserNotFound)?;

    if !user.is_active {
        return Err(AuthError::AccountDeactivated);
    }

    Ok(user)
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.to_string())
}

/// Extract the bound account from a request (use after `require_auth`)
pub fn current_user(req: &Request) -> Option<&User> {
    req.extensions().get::<User>()
}

type RoleCheckFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Role gate factory for `axum::middleware::from_fn`.
///
/// Must run strictly after `require_auth`; with no bound identity it
/// answers 401 unconditionally.
pub fn require_role(
    allowed: &'static [Role],
) -> impl Fn(Request, Next) -> RoleCheckFuture + Clone + Send + Sync + 'static {
    move |req, next| Box::pin(check_role(allowed, req, next))
}

/// Admin-only gate
pub fn require_admin() -> impl Fn(Request, Next) -> RoleCheckFuture + Clone + Send + Sync + 'static
{
    require_role(&[Role::Admin])
}

async fn check_role(
    allowed: &'static [Role],
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = current_user(&req).ok_or(AuthError::Unauthenticated)?;

    if !allowed.contains(&user.role) {
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(req).await)
}

/// Request-gating rejections.
///
/// Every rejection the gate, role check, or rate limiter can produce.
/// Internal failures are logged with detail where they occur; the caller
/// only ever sees the opaque message below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    NoToken,
    InvalidToken,
    TokenExpired,
    UserNotFound,
    AccountDeactivated,
    Unauthenticated,
    Forbidden,
    RateLimited,
    Internal,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::NoToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::UserNotFound
            | AuthError::AccountDeactivated
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthError::NoToken => "Access denied. No token provided.",
            AuthError::InvalidToken => "Invalid token.",
            AuthError::TokenExpired => "Token has expired.",
            AuthError::UserNotFound => "Invalid token. User not found.",
            AuthError::AccountDeactivated => "Account is deactivated.",
            AuthError::Unauthenticated => "Authentication required.",
            AuthError::Forbidden => "Insufficient permissions.",
            AuthError::RateLimited => "Too many requests. Please try again later.",
            AuthError::Internal => "Authentication failed.",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message(),
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn test_user(role: Role, is_active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.org".to_string(),
            password_hash: "hash".to_string(),
            role,
            department: None,
            employee_id: None,
            phone: None,
            is_active,
            created_at: Utc::now().to_rfc3339(),
            last_login: None,
        }
    }

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(AuthError::NoToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::UserNotFound.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::AccountDeactivated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AuthError::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejection_body_shape() {
        let response = AuthError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        // Body is the JSON envelope; message never leaks internals
        assert_eq!(AuthError::Internal.message(), "Authentication failed.");
    }

    #[test]
    fn test_bearer_token_extraction() {
        let req = HttpRequest::builder()
            .header("Authorization", "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi".to_string()));

        let no_header = HttpRequest::new(Body::empty());
        assert_eq!(bearer_token(&no_header), None);

        // Wrong scheme is not a bearer credential
        let basic = HttpRequest::builder()
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&basic), None);
    }

    #[test]
    fn test_current_user_extraction() {
        let mut req = HttpRequest::new(Body::empty());
        assert!(current_user(&req).is_none());

        req.extensions_mut().insert(test_user(Role::User, true));

        let bound = current_user(&req);
        assert!(bound.is_some());
        assert_eq!(bound.unwrap().role, Role::User);
    }
}
