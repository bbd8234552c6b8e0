//! SQLite persistence for tenants, curriculum content and the game catalog
//!
//! ## Tables
//!
//! - `tenants`, `campuses`, `users`, `revoked_tokens` - identity
//! - `curriculum_frameworks` → `versions` → `courses` → `units` - curriculum tree
//! - `resources`, `approvals`, `comments`, `mappings` - attachments
//! - `games`, `assignments` - gamified catalog
//!
//! Each submodule exposes plain functions over `&Connection` /
//! `&mut Connection`; `Database` owns the single connection and hands it out
//! under a mutex.

pub mod attachments;
pub mod courses;
pub mod frameworks;
pub mod games;
pub mod mappings;
pub mod migrations;
pub mod ordering;
pub mod seed;
pub mod units;
pub mod users;
pub mod versions;

use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::ApiError;

/// SQLite database shared by all handlers
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database and bring the schema up to date.
    ///
    /// `":memory:"` opens an ephemeral database.
    pub fn open(path: &str) -> Result<Self, ApiError> {
        if path == ":memory:" {
            return Self::open_in_memory();
        }

        info!("Opening SQLite database at {}", path);
        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, ApiError> {
        debug!("Opening in-memory SQLite database");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, ApiError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read (or single-statement write) with the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Connection) -> Result<T, ApiError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ApiError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run an operation that needs a transaction
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Connection) -> Result<T, ApiError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ApiError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }
}

/// Current time as fixed-width RFC 3339, so timestamp columns sort as text
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fresh random identifier for a new row
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Offset pagination request, already clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Clamp raw query values: `page` ≥ 1, `page_size` in `[1, max]`
    pub fn new(page: Option<u32>, page_size: Option<u32>, default_size: u32, max_size: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(default_size).clamp(1, max_size.max(1)),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

/// One page of results plus the totals the envelope reports
#[derive(Debug, Clone)]
pub struct PageSlice<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// True when `err` is a UNIQUE/PRIMARY KEY constraint failure
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Encode a list for a JSON text column
pub(crate) fn to_json_column<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a JSON text column
pub(crate) fn from_json_column<T: serde::de::DeserializeOwned>(
    raw: Option<String>,
) -> rusqlite::Result<T>
where
    T: Default,
{
    match raw {
        None => Ok(T::default()),
        Some(text) if text.is_empty() => Ok(T::default()),
        Some(text) => serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        }),
    }
}
