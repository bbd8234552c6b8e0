//! Tenants, campuses, users and revoked tokens

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::auth::roles::Role;
use crate::error::ApiError;

/// User row; the password hash never leaves this module's callers
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub campus_id: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let role: String = row.get("role")?;
        let role = role.parse::<Role>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            campus_id: row.get("campus_id")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            full_name: row.get("full_name")?,
            role,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct NewUser<'a> {
    pub tenant_id: &'a str,
    pub campus_id: Option<&'a str>,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub role: Role,
}

pub fn tenant_exists(conn: &Connection, slug: &str) -> Result<Option<String>, ApiError> {
    Ok(conn
        .query_row("SELECT id FROM tenants WHERE slug = ?", params![slug], |r| r.get(0))
        .optional()?)
}

pub fn insert_tenant(conn: &Connection, id: &str, name: &str, slug: &str) -> Result<(), ApiError> {
    conn.execute(
        "INSERT INTO tenants (id, name, slug, created_at) VALUES (?, ?, ?, ?)",
        params![id, name, slug, super::now()],
    )?;
    Ok(())
}

pub fn campus_by_name(conn: &Connection, tenant_id: &str, name: &str) -> Result<Option<String>, ApiError> {
    Ok(conn
        .query_row(
            "SELECT id FROM campuses WHERE tenant_id = ? AND name = ?",
            params![tenant_id, name],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn insert_campus(conn: &Connection, id: &str, tenant_id: &str, name: &str) -> Result<(), ApiError> {
    conn.execute(
        "INSERT INTO campuses (id, tenant_id, name, created_at) VALUES (?, ?, ?, ?)",
        params![id, tenant_id, name, super::now()],
    )?;
    Ok(())
}

/// Insert a user and return its id
pub fn insert_user(conn: &Connection, input: &NewUser<'_>) -> Result<String, ApiError> {
    let id = super::new_id();
    let now = super::now();
    conn.execute(
        r#"
        INSERT INTO users (id, tenant_id, campus_id, email, password_hash, full_name, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            input.tenant_id,
            input.campus_id,
            input.email.to_lowercase(),
            input.password_hash,
            input.full_name,
            input.role.as_str(),
            now,
            now,
        ],
    )?;
    Ok(id)
}

/// Live (not soft-deleted) user by email, case-insensitively
pub fn find_active_by_email(conn: &Connection, email: &str) -> Result<Option<User>, ApiError> {
    Ok(conn
        .query_row(
            "SELECT * FROM users WHERE email = ? AND deleted_at IS NULL",
            params![email.trim().to_lowercase()],
            User::from_row,
        )
        .optional()?)
}

/// Whether any user, deleted or not, holds this email
pub fn email_taken(conn: &Connection, email: &str) -> Result<bool, ApiError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM users WHERE email = ?",
            params![email.trim().to_lowercase()],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn get_active(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<User>, ApiError> {
    Ok(conn
        .query_row(
            "SELECT * FROM users WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
            params![id, tenant_id],
            User::from_row,
        )
        .optional()?)
}

pub fn soft_delete(conn: &Connection, tenant_id: &str, id: &str) -> Result<bool, ApiError> {
    let changed = conn.execute(
        "UPDATE users SET deleted_at = ? WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
        params![super::now(), id, tenant_id],
    )?;
    Ok(changed > 0)
}

/// Record a token id as revoked until its natural expiry
pub fn revoke_token(conn: &Connection, jti: &str, expires_at: i64) -> Result<(), ApiError> {
    conn.execute(
        "INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)",
        params![jti, expires_at],
    )?;
    Ok(())
}

pub fn is_token_revoked(conn: &Connection, jti: &str) -> Result<bool, ApiError> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM revoked_tokens WHERE jti = ?", params![jti], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Drop revocations whose tokens have expired anyway
pub fn prune_revoked(conn: &Connection, now_ts: i64) -> Result<usize, ApiError> {
    Ok(conn.execute("DELETE FROM revoked_tokens WHERE expires_at < ?", params![now_ts])?)
}
