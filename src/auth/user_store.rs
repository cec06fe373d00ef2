//! User Storage
//! Mission: Persist user accounts with SQLite and resolve identities

use crate::auth::models::{NewUser, Role, User, UserFilters, UserUpdate};
use crate::store::uuid_column;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};
use uuid::Uuid;

/// Identity lookup boundary consumed by the authorization gate.
///
/// `Ok(None)` means the subject does not exist; `Err` is an infrastructure
/// failure and is reported differently upstream. Implementations must
/// return the current persisted state - results are never cached across
/// requests.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, id: Uuid) -> Result<Option<User>>;
}

/// User storage with SQLite backend
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("Failed to open user database")
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                department TEXT,
                employee_id TEXT,
                phone TEXT,
                is_active INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_login TEXT
            )",
            [],
        )?;

        self.create_default_admin(&conn)?;

        Ok(())
    }

    /// Create default admin user for initial setup
    fn create_default_admin(&self, conn: &Connection) -> Result<()> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE role = 'Admin'",
                [],
                |row| row.get(0),
            )
            .context("Failed to check for admin users")?;

        if count == 0 {
            let password_hash =
                hash("admin123", DEFAULT_COST).context("Failed to hash password")?;

            conn.execute(
                "INSERT INTO users (id, name, email, password_hash, role, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    "Administrator",
                    "admin@local",
                    password_hash,
                    Role::Admin,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to insert admin user")?;

            info!("🔐 Default admin user created (email: admin@local, password: admin123)");
            warn!("⚠️  CHANGE DEFAULT PASSWORD IN PRODUCTION!");
        }

        Ok(())
    }

    fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: row.get(4)?,
            department: row.get(5)?,
            employee_id: row.get(6)?,
            phone: row.get(7)?,
            is_active: row.get(8)?,
            created_at: row.get(9)?,
            last_login: row.get(10)?,
        })
    }

    const USER_COLUMNS: &'static str = "id, name, email, password_hash, role, department, \
         employee_id, phone, is_active, created_at, last_login";

    /// Create a new user account
    pub fn create(&self, new: &NewUser) -> Result<User> {
        let email = new.email.trim().to_lowercase();
        let conn = self.open()?;

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        if exists > 0 {
            bail!("Email already exists");
        }

        let password_hash = hash(&new.password, DEFAULT_COST).context("Failed to hash password")?;

        let user = User {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            email,
            password_hash,
            role: new.role,
            department: new.department.clone(),
            employee_id: new.employee_id.clone(),
            phone: new.phone.clone(),
            is_active: new.is_active,
            created_at: Utc::now().to_rfc3339(),
            last_login: None,
        };

        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, department, \
             employee_id, phone, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.role,
                user.department,
                user.employee_id,
                user.phone,
                user.is_active,
                user.created_at,
            ],
        )
        .context("Failed to insert user")?;

        info!("✅ Created user: {} ({})", user.email, user.role.as_str());

        Ok(user)
    }

    /// Get user by id
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.open()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", Self::USER_COLUMNS);

        conn.query_row(&sql, params![id.to_string()], Self::row_to_user)
            .optional()
            .context("Failed to load user by id")
    }

    /// Get user by email (stored lowercased)
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.open()?;
        let sql = format!("SELECT {} FROM users WHERE email = ?1", Self::USER_COLUMNS);

        conn.query_row(&sql, params![email.trim().to_lowercase()], Self::row_to_user)
            .optional()
            .context("Failed to load user by email")
    }

    /// List users with optional filters
    pub fn list(&self, filters: &UserFilters) -> Result<Vec<User>> {
        let conn = self.open()?;

        let mut sql = format!("SELECT {} FROM users WHERE 1=1", Self::USER_COLUMNS);
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(role) = filters.role {
            sql.push_str(" AND role = ?");
            args.push(Box::new(role.as_str().to_string()));
        }
        if let Some(department) = &filters.department {
            sql.push_str(" AND department = ?");
            args.push(Box::new(department.clone()));
        }
        if let Some(is_active) = filters.is_active {
            sql.push_str(" AND is_active = ?");
            args.push(Box::new(is_active));
        }
        if let Some(search) = &filters.search {
            sql.push_str(" AND (name LIKE ? OR email LIKE ?)");
            let term = format!("%{}%", search);
            args.push(Box::new(term.clone()));
            args.push(Box::new(term));
        }

        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Apply a partial update and return the fresh record
    pub fn update(&self, id: Uuid, changes: &UserUpdate) -> Result<Option<User>> {
        let conn = self.open()?;

        let mut fields: Vec<&str> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(name) = &changes.name {
            fields.push("name = ?");
            args.push(Box::new(name.clone()));
        }
        if let Some(email) = &changes.email {
            fields.push("email = ?");
            args.push(Box::new(email.trim().to_lowercase()));
        }
        if let Some(role) = changes.role {
            fields.push("role = ?");
            args.push(Box::new(role.as_str().to_string()));
        }
        if let Some(department) = &changes.department {
            fields.push("department = ?");
            args.push(Box::new(department.clone()));
        }
        if let Some(employee_id) = &changes.employee_id {
            fields.push("employee_id = ?");
            args.push(Box::new(employee_id.clone()));
        }
        if let Some(phone) = &changes.phone {
            fields.push("phone = ?");
            args.push(Box::new(phone.clone()));
        }

        if fields.is_empty() {
            bail!("No fields to update");
        }

        let sql = format!("UPDATE users SET {} WHERE id = ?", fields.join(", "));
        args.push(Box::new(id.to_string()));

        conn.execute(&sql, rusqlite::params_from_iter(args.iter()))
            .context("Failed to update user")?;

        drop(conn);
        self.find_by_id(id)
    }

    /// Activate or deactivate an account
    pub fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>> {
        let conn = self.open()?;

        conn.execute(
            "UPDATE users SET is_active = ?1 WHERE id = ?2",
            params![active, id.to_string()],
        )?;

        drop(conn);
        self.find_by_id(id)
    }

    /// Replace a user's password hash
    pub fn update_password(&self, id: Uuid, new_password: &str) -> Result<()> {
        let password_hash =
            hash(new_password, DEFAULT_COST).context("Failed to hash password")?;
        let conn = self.open()?;

        let rows = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id.to_string()],
        )?;
        if rows == 0 {
            bail!("User not found");
        }

        Ok(())
    }

    /// Verify email and password; returns the account on success.
    ///
    /// Inactive accounts are refused even with the correct password.
    pub fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_by_email(email)? else {
            return Ok(None);
        };

        if !user.is_active {
            return Ok(None);
        }

        let valid = verify(password, &user.password_hash).context("Failed to verify password")?;
        if !valid {
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Record a successful login time
    pub fn touch_last_login(&self, id: Uuid) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    /// Delete a user by id
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let conn = self.open()?;

        let rows_affected = conn.execute(
            "DELETE FROM users WHERE id = ?1",
            params![id.to_string()],
        )?;

        if rows_affected == 0 {
            bail!("User not found");
        }

        info!("🗑️  Deleted user: {}", id);
        Ok(())
    }
}

#[async_trait]
impl IdentityResolver for UserStore {
    async fn resolve(&self, id: Uuid) -> Result<Option<User>> {
        self.find_by_id(id)
    }
}
