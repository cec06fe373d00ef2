//! Authentication Models
//! Mission: Define user accounts, roles, and token claims

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub department: Option<String>,
    pub employee_id: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// User roles for RBAC
///
/// A closed set: role strings coming off the wire or out of the database
/// must match one of these names exactly (case-sensitive) or fail to parse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "Admin")]
    Admin, // Full access to all endpoints
    #[serde(rename = "HR Officer")]
    HrOfficer, // Member record management
    #[serde(rename = "Finance Officer")]
    FinanceOfficer, // Financial ledger management
    #[serde(rename = "User")]
    User, // Read-only access
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::HrOfficer => "HR Officer",
            Role::FinanceOfficer => "Finance Officer",
            Role::User => "User",
        }
    }

    /// Exact, case-sensitive parse. Typos never silently match.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Admin" => Some(Role::Admin),
            "HR Officer" => Some(Role::HrOfficer),
            "Finance Officer" => Some(Role::FinanceOfficer),
            "User" => Some(Role::User),
            _ => None,
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Role::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

/// JWT Claims payload
///
/// Deliberately minimal: the account (role, active flag) is re-resolved
/// from the user store on every request, so the token only names the
/// subject and its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    pub iat: usize,  // issued-at timestamp
    pub exp: usize,  // expiration timestamp
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: usize, // seconds until expiration
    pub user: UserResponse,
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            department: user.department.clone(),
            is_active: user.is_active,
            created_at: user.created_at.clone(),
            last_login: user.last_login.clone(),
        }
    }
}

/// New account payload consumed by the user store
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub department: Option<String>,
    pub employee_id: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Partial account update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub employee_id: Option<String>,
    pub phone: Option<String>,
}

/// Listing filters for the admin user directory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilters {
    pub role: Option<Role>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// Self-service password change
#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}
