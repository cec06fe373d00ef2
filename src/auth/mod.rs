//! Authentication Module
//! Mission: Secure API access with signed tokens and RBAC

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod user_store;

pub use jwt::JwtHandler;
pub use middleware::{optional_auth, require_admin, require_auth, require_role, AuthGate};
pub use user_store::{IdentityResolver, UserStore};
