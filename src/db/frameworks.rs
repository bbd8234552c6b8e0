//! Curriculum framework (KCT) CRUD
//!
//! Frameworks are soft-deleted. Every lookup here filters on
//! `deleted_at IS NULL`, so a deleted framework and everything below it
//! disappears from the API while the rows stay on disk.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PageRequest, PageSlice};
use crate::error::ApiError;

/// Framework statuses a client may set directly
pub const FRAMEWORK_STATUSES: &[&str] = &["draft", "approved", "published"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Framework {
    pub id: String,
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub target_level: Option<String>,
    pub age_group: Option<String>,
    pub total_hours: f64,
    pub total_sessions: i64,
    pub session_duration_hours: f64,
    pub learning_method: Option<String>,
    pub learning_format: Option<String>,
    pub status: String,
    pub owner_user_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Framework {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            description: row.get("description")?,
            language: row.get("language")?,
            target_level: row.get("target_level")?,
            age_group: row.get("age_group")?,
            total_hours: row.get("total_hours")?,
            total_sessions: row.get("total_sessions")?,
            session_duration_hours: row.get("session_duration_hours")?,
            learning_method: row.get("learning_method")?,
            learning_format: row.get("learning_format")?,
            status: row.get("status")?,
            owner_user_id: row.get("owner_user_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for creating a framework
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateFramework {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub target_level: Option<String>,
    #[serde(default)]
    pub age_group: Option<String>,
    #[serde(default)]
    pub total_hours: f64,
    #[serde(default)]
    pub total_sessions: i64,
    #[serde(default)]
    pub session_duration_hours: f64,
    #[serde(default)]
    pub learning_method: Option<String>,
    #[serde(default)]
    pub learning_format: Option<String>,
    #[serde(default)]
    pub owner_user_id: Option<String>,
}

/// Partial update; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFramework {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub target_level: Option<String>,
    pub age_group: Option<String>,
    pub total_hours: Option<f64>,
    pub total_sessions: Option<i64>,
    pub session_duration_hours: Option<f64>,
    pub learning_method: Option<String>,
    pub learning_format: Option<String>,
    pub status: Option<String>,
    pub owner_user_id: Option<String>,
}

/// List filters; all optional and combined with AND
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameworkFilter {
    pub status: Option<String>,
    pub language: Option<String>,
    pub target_level: Option<String>,
    /// Substring match on code or name
    pub q: Option<String>,
}

fn validate_fields(code: &str, name: &str, hours: f64, sessions: i64, session_hours: f64) -> Result<(), ApiError> {
    if code.trim().is_empty() {
        return Err(ApiError::Validation("code is required".into()));
    }
    if name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if hours < 0.0 || sessions < 0 || session_hours < 0.0 {
        return Err(ApiError::Validation(
            "total_hours, total_sessions and session_duration_hours must not be negative".into(),
        ));
    }
    Ok(())
}

fn code_taken(conn: &Connection, tenant_id: &str, code: &str, except_id: Option<&str>) -> Result<bool, ApiError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM curriculum_frameworks WHERE tenant_id = ? AND code = ? AND deleted_at IS NULL",
            params![tenant_id, code],
            |r| r.get(0),
        )
        .optional()?;
    Ok(match (existing, except_id) {
        (Some(found), Some(except)) => found != except,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

fn duplicate_code(code: &str) -> ApiError {
    ApiError::Conflict(format!("Framework code '{}' already exists", code))
}

/// Live framework in the tenant
pub fn get(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<Framework>, ApiError> {
    Ok(conn
        .query_row(
            "SELECT * FROM curriculum_frameworks WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
            params![id, tenant_id],
            Framework::from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, tenant_id: &str, id: &str) -> Result<Framework, ApiError> {
    get(conn, tenant_id, id)?.ok_or_else(|| ApiError::not_found("Framework", id))
}

pub fn create(conn: &Connection, tenant_id: &str, input: &CreateFramework, owner: &str) -> Result<Framework, ApiError> {
    let code = input.code.trim();
    validate_fields(
        code,
        &input.name,
        input.total_hours,
        input.total_sessions,
        input.session_duration_hours,
    )?;

    if code_taken(conn, tenant_id, code, None)? {
        return Err(duplicate_code(code));
    }

    let id = super::new_id();
    let now = super::now();
    conn.execute(
        r#"
        INSERT INTO curriculum_frameworks (
            id, tenant_id, code, name, description, language, target_level, age_group,
            total_hours, total_sessions, session_duration_hours, learning_method, learning_format,
            status, owner_user_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'draft', ?, ?, ?)
        "#,
        params![
            id,
            tenant_id,
            code,
            input.name.trim(),
            input.description,
            input.language,
            input.target_level,
            input.age_group,
            input.total_hours,
            input.total_sessions,
            input.session_duration_hours,
            input.learning_method,
            input.learning_format,
            input.owner_user_id.as_deref().unwrap_or(owner),
            now,
            now,
        ],
    )
    .map_err(|e| {
        if super::is_unique_violation(&e) {
            duplicate_code(code)
        } else {
            e.into()
        }
    })?;

    debug!(framework_id = %id, code, "Created framework");
    require(conn, tenant_id, &id)
}

pub fn update(conn: &Connection, tenant_id: &str, id: &str, patch: &UpdateFramework) -> Result<Framework, ApiError> {
    let mut fw = require(conn, tenant_id, id)?;

    if let Some(code) = &patch.code {
        let code = code.trim();
        if code != fw.code && code_taken(conn, tenant_id, code, Some(id))? {
            return Err(duplicate_code(code));
        }
        fw.code = code.to_string();
    }
    if let Some(name) = &patch.name {
        fw.name = name.trim().to_string();
    }
    if let Some(status) = &patch.status {
        if !FRAMEWORK_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::Validation(format!("Unknown framework status '{}'", status)));
        }
        fw.status = status.clone();
    }
    macro_rules! merge {
        ($($field:ident),*) => {
            $(if let Some(v) = &patch.$field { fw.$field = Some(v.clone()); })*
        };
    }
    merge!(description, language, target_level, age_group, learning_method, learning_format, owner_user_id);
    fw.total_hours = patch.total_hours.unwrap_or(fw.total_hours);
    fw.total_sessions = patch.total_sessions.unwrap_or(fw.total_sessions);
    fw.session_duration_hours = patch.session_duration_hours.unwrap_or(fw.session_duration_hours);

    validate_fields(&fw.code, &fw.name, fw.total_hours, fw.total_sessions, fw.session_duration_hours)?;

    conn.execute(
        r#"
        UPDATE curriculum_frameworks SET
            code = ?, name = ?, description = ?, language = ?, target_level = ?, age_group = ?,
            total_hours = ?, total_sessions = ?, session_duration_hours = ?,
            learning_method = ?, learning_format = ?, status = ?, owner_user_id = ?, updated_at = ?
        WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL
        "#,
        params![
            fw.code,
            fw.name,
            fw.description,
            fw.language,
            fw.target_level,
            fw.age_group,
            fw.total_hours,
            fw.total_sessions,
            fw.session_duration_hours,
            fw.learning_method,
            fw.learning_format,
            fw.status,
            fw.owner_user_id,
            super::now(),
            id,
            tenant_id,
        ],
    )
    .map_err(|e| {
        if super::is_unique_violation(&e) {
            duplicate_code(&fw.code)
        } else {
            e.into()
        }
    })?;

    require(conn, tenant_id, id)
}

/// Set the status column as a side effect of the version workflow
pub fn set_status(conn: &Connection, tenant_id: &str, id: &str, status: &str) -> Result<(), ApiError> {
    conn.execute(
        "UPDATE curriculum_frameworks SET status = ?, updated_at = ? WHERE id = ? AND tenant_id = ?",
        params![status, super::now(), id, tenant_id],
    )?;
    Ok(())
}

/// Soft delete; returns false when nothing live matched
pub fn soft_delete(conn: &Connection, tenant_id: &str, id: &str) -> Result<bool, ApiError> {
    let now = super::now();
    let changed = conn.execute(
        "UPDATE curriculum_frameworks SET deleted_at = ?, updated_at = ? WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
        params![now, now, id, tenant_id],
    )?;
    Ok(changed > 0)
}

pub fn list(
    conn: &Connection,
    tenant_id: &str,
    filter: &FrameworkFilter,
    page: PageRequest,
) -> Result<PageSlice<Framework>, ApiError> {
    let mut clauses = vec!["tenant_id = ?", "deleted_at IS NULL"];
    let mut values: Vec<Value> = vec![Value::Text(tenant_id.to_string())];

    if let Some(status) = &filter.status {
        clauses.push("status = ?");
        values.push(Value::Text(status.clone()));
    }
    if let Some(language) = &filter.language {
        clauses.push("language = ?");
        values.push(Value::Text(language.clone()));
    }
    if let Some(level) = &filter.target_level {
        clauses.push("target_level = ?");
        values.push(Value::Text(level.clone()));
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        clauses.push("(code LIKE ? OR name LIKE ?)");
        let pattern = format!("%{}%", q);
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }

    let where_sql = clauses.join(" AND ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM curriculum_frameworks WHERE {}", where_sql),
        params_from_iter(values.iter()),
        |r| r.get(0),
    )?;

    values.push(Value::Integer(page.limit()));
    values.push(Value::Integer(page.offset()));

    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM curriculum_frameworks WHERE {} ORDER BY created_at DESC, code ASC LIMIT ? OFFSET ?",
        where_sql
    ))?;
    let items = stmt
        .query_map(params_from_iter(values.iter()), Framework::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PageSlice {
        items,
        total: total as u64,
    })
}
