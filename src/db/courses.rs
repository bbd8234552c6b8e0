//! Course CRUD and ordering inside a version

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::ordering::{OrderEntry, COURSES};
use super::versions;
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: String,
    pub tenant_id: String,
    pub version_id: String,
    pub title: String,
    pub hours: f64,
    pub summary: Option<String>,
    pub order_index: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Course {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            version_id: row.get("version_id")?,
            title: row.get("title")?,
            hours: row.get("hours")?,
            summary: row.get("summary")?,
            order_index: row.get("order_index")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCourse {
    pub title: String,
    #[serde(default)]
    pub hours: f64,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourse {
    pub title: Option<String>,
    pub hours: Option<f64>,
    pub summary: Option<String>,
}

fn validate(title: &str, hours: f64) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if hours < 0.0 {
        return Err(ApiError::Validation("hours must not be negative".into()));
    }
    Ok(())
}

/// Course reachable in the tenant (its framework is not deleted)
pub fn get(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<Course>, ApiError> {
    Ok(conn
        .query_row(
            r#"
            SELECT c.* FROM courses c
            JOIN versions v ON v.id = c.version_id
            JOIN curriculum_frameworks f ON f.id = v.framework_id
            WHERE c.id = ? AND c.tenant_id = ? AND f.deleted_at IS NULL
            "#,
            params![id, tenant_id],
            Course::from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, tenant_id: &str, id: &str) -> Result<Course, ApiError> {
    get(conn, tenant_id, id)?.ok_or_else(|| ApiError::not_found("Course", id))
}

/// Course whose version still accepts content changes
pub fn require_editable(conn: &Connection, tenant_id: &str, id: &str) -> Result<Course, ApiError> {
    let course = require(conn, tenant_id, id)?;
    versions::require_editable(conn, tenant_id, &course.version_id)?;
    Ok(course)
}

/// Courses of a version in order; the version must be reachable
pub fn list(conn: &Connection, tenant_id: &str, version_id: &str) -> Result<Vec<Course>, ApiError> {
    versions::require(conn, tenant_id, version_id)?;
    list_unchecked(conn, version_id)
}

pub(crate) fn list_unchecked(conn: &Connection, version_id: &str) -> Result<Vec<Course>, ApiError> {
    let mut stmt = conn.prepare("SELECT * FROM courses WHERE version_id = ? ORDER BY order_index, created_at")?;
    let courses = stmt
        .query_map(params![version_id], Course::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(courses)
}

pub fn create(conn: &Connection, tenant_id: &str, version_id: &str, input: &CreateCourse) -> Result<Course, ApiError> {
    versions::require_editable(conn, tenant_id, version_id)?;
    validate(&input.title, input.hours)?;

    let order_index = COURSES.count(conn, version_id)?;
    let id = insert(
        conn,
        tenant_id,
        version_id,
        input.title.trim(),
        input.hours,
        input.summary.as_deref(),
        order_index,
    )?;
    require(conn, tenant_id, &id)
}

pub(crate) fn insert(
    conn: &Connection,
    tenant_id: &str,
    version_id: &str,
    title: &str,
    hours: f64,
    summary: Option<&str>,
    order_index: i64,
) -> Result<String, ApiError> {
    let id = super::new_id();
    let now = super::now();
    conn.execute(
        r#"
        INSERT INTO courses (id, tenant_id, version_id, title, hours, summary, order_index, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![id, tenant_id, version_id, title, hours, summary, order_index, now, now],
    )?;
    Ok(id)
}

pub fn update(conn: &Connection, tenant_id: &str, id: &str, patch: &UpdateCourse) -> Result<Course, ApiError> {
    let mut course = require_editable(conn, tenant_id, id)?;

    if let Some(title) = &patch.title {
        course.title = title.trim().to_string();
    }
    if let Some(hours) = patch.hours {
        course.hours = hours;
    }
    if let Some(summary) = &patch.summary {
        course.summary = Some(summary.clone());
    }
    validate(&course.title, course.hours)?;

    conn.execute(
        "UPDATE courses SET title = ?, hours = ?, summary = ?, updated_at = ? WHERE id = ?",
        params![course.title, course.hours, course.summary, super::now(), id],
    )?;
    require(conn, tenant_id, id)
}

/// Delete a course with its units and close the gap it leaves
pub fn delete(conn: &mut Connection, tenant_id: &str, id: &str) -> Result<(), ApiError> {
    let tx = conn.transaction()?;
    let course = require_editable(&tx, tenant_id, id)?;

    tx.execute("DELETE FROM courses WHERE id = ?", params![id])?;
    COURSES.compact(&tx, &course.version_id)?;

    tx.commit()?;
    Ok(())
}

/// Apply a full reorder of one version's courses
pub fn reorder(conn: &mut Connection, tenant_id: &str, orders: &[OrderEntry]) -> Result<Vec<Course>, ApiError> {
    let version_id = COURSES.reorder(conn, tenant_id, orders, |c, version_id| {
        versions::require_editable(c, tenant_id, version_id).map(|_| ())
    })?;
    list_unchecked(conn, &version_id)
}
