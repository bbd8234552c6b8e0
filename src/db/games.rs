//! Game catalog and assignments

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{PageRequest, PageSlice};
use crate::curriculum::EntityRef;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct Game {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub game_type: String,
    pub level: Option<String>,
    pub skill: Option<String>,
    pub duration_minutes: i64,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Game {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            game_type: row.get("game_type")?,
            level: row.get("level")?,
            skill: row.get("skill")?,
            duration_minutes: row.get("duration_minutes")?,
            tags: super::from_json_column(row.get("tags_json")?)?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGame {
    pub title: String,
    #[serde(rename = "type", alias = "game_type")]
    pub game_type: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameFilter {
    #[serde(rename = "type")]
    pub game_type: Option<String>,
    pub level: Option<String>,
    pub skill: Option<String>,
}

pub fn create(conn: &Connection, tenant_id: &str, input: &CreateGame) -> Result<Game, ApiError> {
    if input.title.trim().is_empty() || input.game_type.trim().is_empty() {
        return Err(ApiError::Validation("title and type are required".into()));
    }
    if input.duration_minutes < 0 {
        return Err(ApiError::Validation("duration_minutes must not be negative".into()));
    }

    let id = super::new_id();
    let now = super::now();
    conn.execute(
        r#"
        INSERT INTO games (id, tenant_id, title, game_type, level, skill, duration_minutes, tags_json, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            tenant_id,
            input.title.trim(),
            input.game_type.trim(),
            input.level,
            input.skill,
            input.duration_minutes,
            super::to_json_column(&input.tags)?,
            input.description,
            now,
            now,
        ],
    )?;
    require(conn, tenant_id, &id)
}

pub fn get(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<Game>, ApiError> {
    Ok(conn
        .query_row(
            "SELECT * FROM games WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
            params![id, tenant_id],
            Game::from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, tenant_id: &str, id: &str) -> Result<Game, ApiError> {
    get(conn, tenant_id, id)?.ok_or_else(|| ApiError::not_found("Game", id))
}

pub fn title_exists(conn: &Connection, tenant_id: &str, title: &str) -> Result<bool, ApiError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM games WHERE tenant_id = ? AND title = ? AND deleted_at IS NULL",
            params![tenant_id, title],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn soft_delete(conn: &Connection, tenant_id: &str, id: &str) -> Result<bool, ApiError> {
    let now = super::now();
    let changed = conn.execute(
        "UPDATE games SET deleted_at = ?, updated_at = ? WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
        params![now, now, id, tenant_id],
    )?;
    Ok(changed > 0)
}

pub fn list(conn: &Connection, tenant_id: &str, filter: &GameFilter, page: PageRequest) -> Result<PageSlice<Game>, ApiError> {
    let mut clauses = vec!["tenant_id = ?", "deleted_at IS NULL"];
    let mut values = vec![Value::Text(tenant_id.to_string())];

    for (column, value) in [
        ("game_type = ?", &filter.game_type),
        ("level = ?", &filter.level),
        ("skill = ?", &filter.skill),
    ] {
        if let Some(v) = value {
            clauses.push(column);
            values.push(Value::Text(v.clone()));
        }
    }
    let where_sql = clauses.join(" AND ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM games WHERE {}", where_sql),
        params_from_iter(values.iter()),
        |r| r.get(0),
    )?;

    values.push(Value::Integer(page.limit()));
    values.push(Value::Integer(page.offset()));
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM games WHERE {} ORDER BY title, id LIMIT ? OFFSET ?",
        where_sql
    ))?;
    let items = stmt
        .query_map(params_from_iter(values.iter()), Game::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PageSlice {
        items,
        total: total as u64,
    })
}

// ============================================================================
// Assignments
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub id: String,
    pub game_id: String,
    pub unit_id: Option<String>,
    pub title: String,
    pub due_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl Assignment {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            game_id: row.get("game_id")?,
            unit_id: row.get("unit_id")?,
            title: row.get("title")?,
            due_at: row.get("due_at")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssignment {
    pub game_id: String,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
}

pub fn create_assignment(
    conn: &Connection,
    tenant_id: &str,
    input: &CreateAssignment,
    actor: &str,
) -> Result<Assignment, ApiError> {
    let game = get(conn, tenant_id, &input.game_id)?
        .ok_or_else(|| ApiError::Validation(format!("Game {} does not exist", input.game_id)))?;

    if let Some(unit_id) = &input.unit_id {
        super::attachments::require_entity(conn, tenant_id, &EntityRef::Unit(unit_id.clone()))?;
    }
    if let Some(due_at) = &input.due_at {
        chrono::DateTime::parse_from_rfc3339(due_at)
            .map_err(|_| ApiError::Validation(format!("due_at '{}' is not an RFC 3339 timestamp", due_at)))?;
    }

    let title = input
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(game.title.as_str());

    let id = super::new_id();
    conn.execute(
        r#"
        INSERT INTO assignments (id, tenant_id, game_id, unit_id, title, due_at, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![id, tenant_id, game.id, input.unit_id, title, input.due_at, actor, super::now()],
    )?;
    require_assignment(conn, tenant_id, &id)
}

pub fn get_assignment(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<Assignment>, ApiError> {
    Ok(conn
        .query_row(
            "SELECT * FROM assignments WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
            params![id, tenant_id],
            Assignment::from_row,
        )
        .optional()?)
}

pub fn require_assignment(conn: &Connection, tenant_id: &str, id: &str) -> Result<Assignment, ApiError> {
    get_assignment(conn, tenant_id, id)?.ok_or_else(|| ApiError::not_found("Assignment", id))
}

pub fn list_assignments(conn: &Connection, tenant_id: &str) -> Result<Vec<Assignment>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM assignments WHERE tenant_id = ? AND deleted_at IS NULL ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map(params![tenant_id], Assignment::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_assignment(conn: &Connection, tenant_id: &str, id: &str) -> Result<bool, ApiError> {
    let changed = conn.execute(
        "UPDATE assignments SET deleted_at = ? WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
        params![super::now(), id, tenant_id],
    )?;
    Ok(changed > 0)
}
