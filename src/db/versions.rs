//! Framework versions and the persistence side of the approval workflow
//!
//! The state machine itself lives in `curriculum::workflow`; this module
//! loads the current state, asks `transition` for the next one and writes
//! the result together with its approval record in one transaction.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::attachments::{self, NewApproval};
use super::courses::{self, Course};
use super::frameworks;
use super::units::{self, Unit};
use crate::curriculum::{transition, VersionAction, VersionState};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Version {
    pub id: String,
    pub tenant_id: String,
    pub framework_id: String,
    pub version_no: String,
    pub changelog: Option<String>,
    pub state: VersionState,
    pub rollout_notes: Option<String>,
    pub submitted_at: Option<String>,
    pub approved_at: Option<String>,
    pub published_at: Option<String>,
    pub archived_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Version {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let state: String = row.get("state")?;
        let state = state.parse::<VersionState>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
        })?;
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            framework_id: row.get("framework_id")?,
            version_no: row.get("version_no")?,
            changelog: row.get("changelog")?,
            state,
            rollout_notes: row.get("rollout_notes")?,
            submitted_at: row.get("submitted_at")?,
            approved_at: row.get("approved_at")?,
            published_at: row.get("published_at")?,
            archived_at: row.get("archived_at")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateVersion {
    pub version_no: String,
    #[serde(default)]
    pub changelog: Option<String>,
    /// Deep-copy courses and units from this version
    #[serde(default)]
    pub copy_from_version_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVersion {
    pub version_no: Option<String>,
    pub changelog: Option<String>,
}

/// A workflow action with its payload
#[derive(Debug, Clone)]
pub struct TransitionRequest<'a> {
    pub action: VersionAction,
    pub comments: Option<&'a str>,
    pub rollout_notes: Option<&'a str>,
    pub actor_user_id: &'a str,
}

/// Aggregate numbers for one framework
#[derive(Debug, Clone, Serialize)]
pub struct VersionStats {
    pub total_versions: i64,
    pub by_state: BTreeMap<String, i64>,
    pub published_version: Option<Version>,
    pub latest_version: Option<Version>,
    /// Version the content totals below were taken from
    pub content_version_id: Option<String>,
    pub total_courses: i64,
    pub total_units: i64,
    pub total_hours: f64,
}

const SELECT_LIVE: &str = r#"
    SELECT v.* FROM versions v
    JOIN curriculum_frameworks f ON f.id = v.framework_id
    WHERE f.deleted_at IS NULL
"#;

pub fn get(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<Version>, ApiError> {
    Ok(conn
        .query_row(
            &format!("{} AND v.id = ? AND v.tenant_id = ?", SELECT_LIVE),
            params![id, tenant_id],
            Version::from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, tenant_id: &str, id: &str) -> Result<Version, ApiError> {
    get(conn, tenant_id, id)?.ok_or_else(|| ApiError::not_found("Version", id))
}

/// Version whose courses and units may still change
pub fn require_editable(conn: &Connection, tenant_id: &str, id: &str) -> Result<Version, ApiError> {
    let version = require(conn, tenant_id, id)?;
    if !version.state.is_editable() {
        return Err(ApiError::VersionNotEditable(format!(
            "{} ({})",
            version.version_no, version.state
        )));
    }
    Ok(version)
}

pub fn list(conn: &Connection, tenant_id: &str, framework_id: &str) -> Result<Vec<Version>, ApiError> {
    frameworks::require(conn, tenant_id, framework_id)?;
    let mut stmt = conn.prepare(&format!(
        "{} AND v.framework_id = ? AND v.tenant_id = ? ORDER BY v.created_at, v.rowid",
        SELECT_LIVE
    ))?;
    let versions = stmt
        .query_map(params![framework_id, tenant_id], Version::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(versions)
}

fn version_no_taken(conn: &Connection, framework_id: &str, version_no: &str) -> Result<bool, ApiError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM versions WHERE framework_id = ? AND version_no = ?",
            params![framework_id, version_no],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn duplicate_version_no(version_no: &str) -> ApiError {
    ApiError::Conflict(format!("Version '{}' already exists for this framework", version_no))
}

pub fn create(
    conn: &mut Connection,
    tenant_id: &str,
    framework_id: &str,
    input: &CreateVersion,
    actor_user_id: &str,
) -> Result<Version, ApiError> {
    let version_no = input.version_no.trim();
    if version_no.is_empty() {
        return Err(ApiError::Validation("version_no is required".into()));
    }

    let tx = conn.transaction()?;
    frameworks::require(&tx, tenant_id, framework_id)?;

    if version_no_taken(&tx, framework_id, version_no)? {
        return Err(duplicate_version_no(version_no));
    }

    let source = match &input.copy_from_version_id {
        Some(source_id) => Some(require(&tx, tenant_id, source_id)?),
        None => None,
    };

    let id = super::new_id();
    let now = super::now();
    tx.execute(
        r#"
        INSERT INTO versions (id, tenant_id, framework_id, version_no, changelog, state, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'draft', ?, ?, ?)
        "#,
        params![id, tenant_id, framework_id, version_no, input.changelog, actor_user_id, now, now],
    )?;

    if let Some(source) = source {
        copy_content(&tx, tenant_id, &source.id, &id)?;
    }

    tx.commit()?;
    info!(version_id = %id, framework_id, version_no, "Created version");
    require(conn, tenant_id, &id)
}

fn copy_content(conn: &Connection, tenant_id: &str, from_version: &str, to_version: &str) -> Result<(), ApiError> {
    for course in courses::list_unchecked(conn, from_version)? {
        let new_course = courses::insert(
            conn,
            tenant_id,
            to_version,
            &course.title,
            course.hours,
            course.summary.as_deref(),
            course.order_index,
        )?;
        for unit in units::list_unchecked(conn, &course.id)? {
            units::insert_copy(conn, &unit, &new_course, unit.order_index)?;
        }
    }
    Ok(())
}

pub fn update(conn: &Connection, tenant_id: &str, id: &str, patch: &UpdateVersion) -> Result<Version, ApiError> {
    let version = require_editable(conn, tenant_id, id)?;

    let version_no = match &patch.version_no {
        Some(v) => {
            let v = v.trim();
            if v.is_empty() {
                return Err(ApiError::Validation("version_no must not be empty".into()));
            }
            if v != version.version_no && version_no_taken(conn, &version.framework_id, v)? {
                return Err(duplicate_version_no(v));
            }
            v.to_string()
        }
        None => version.version_no.clone(),
    };
    let changelog = patch.changelog.clone().or(version.changelog);

    conn.execute(
        "UPDATE versions SET version_no = ?, changelog = ?, updated_at = ? WHERE id = ?",
        params![version_no, changelog, super::now(), id],
    )?;
    require(conn, tenant_id, id)
}

fn timestamp_column(state: VersionState) -> Option<&'static str> {
    match state {
        VersionState::Submitted => Some("submitted_at"),
        VersionState::Approved => Some("approved_at"),
        VersionState::Published => Some("published_at"),
        VersionState::Archived => Some("archived_at"),
        VersionState::Draft => None,
    }
}

fn write_state(conn: &Connection, id: &str, to: VersionState, now: &str) -> Result<(), ApiError> {
    match timestamp_column(to) {
        Some(column) => conn.execute(
            &format!("UPDATE versions SET state = ?, {} = ?, updated_at = ? WHERE id = ?", column),
            params![to.as_str(), now, now, id],
        )?,
        None => conn.execute(
            "UPDATE versions SET state = ?, updated_at = ? WHERE id = ?",
            params![to.as_str(), now, id],
        )?,
    };
    Ok(())
}

/// Run one workflow action and record it
pub fn apply_transition(
    conn: &mut Connection,
    tenant_id: &str,
    id: &str,
    request: &TransitionRequest<'_>,
) -> Result<Version, ApiError> {
    let tx = conn.transaction()?;
    let version = require(&tx, tenant_id, id)?;
    let from = version.state;
    let to = transition(from, request.action)?;
    let now = super::now();

    write_state(&tx, id, to, &now)?;

    let decision = match request.action {
        VersionAction::Review(decision) => Some(decision.as_str()),
        _ => None,
    };
    attachments::insert_approval(
        &tx,
        tenant_id,
        &NewApproval {
            version_id: id,
            action: request.action.name(),
            decision,
            comments: request.comments,
            from_state: from.as_str(),
            to_state: to.as_str(),
            actor_user_id: Some(request.actor_user_id),
        },
    )?;

    match to {
        VersionState::Published => {
            if let Some(notes) = request.rollout_notes {
                tx.execute("UPDATE versions SET rollout_notes = ? WHERE id = ?", params![notes, id])?;
            }
            archive_superseded(&tx, &version, request.actor_user_id, &now)?;
            frameworks::set_status(&tx, tenant_id, &version.framework_id, "published")?;
        }
        VersionState::Approved => {
            tx.execute(
                "UPDATE curriculum_frameworks SET status = 'approved', updated_at = ? WHERE id = ? AND status = 'draft'",
                params![now, version.framework_id],
            )?;
        }
        _ => {}
    }

    tx.commit()?;
    info!(
        version_id = id,
        action = request.action.name(),
        from = %from,
        to = %to,
        actor = request.actor_user_id,
        "Version transition"
    );
    require(conn, tenant_id, id)
}

// At most one version per framework is published
fn archive_superseded(conn: &Connection, published: &Version, actor: &str, now: &str) -> Result<(), ApiError> {
    let mut stmt = conn.prepare("SELECT id FROM versions WHERE framework_id = ? AND state = 'published' AND id != ?")?;
    let previous = stmt
        .query_map(params![published.framework_id, published.id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let comment = format!("Superseded by version {}", published.version_no);
    for old_id in previous {
        let to = transition(VersionState::Published, VersionAction::Archive)?;
        write_state(conn, &old_id, to, now)?;
        attachments::insert_approval(
            conn,
            &published.tenant_id,
            &NewApproval {
                version_id: &old_id,
                action: VersionAction::Archive.name(),
                decision: None,
                comments: Some(&comment),
                from_state: VersionState::Published.as_str(),
                to_state: to.as_str(),
                actor_user_id: Some(actor),
            },
        )?;
        info!(version_id = %old_id, superseded_by = %published.id, "Archived superseded version");
    }
    Ok(())
}

/// Courses of a version with their units, in order
pub fn load_tree(conn: &Connection, tenant_id: &str, id: &str) -> Result<Vec<(Course, Vec<Unit>)>, ApiError> {
    require(conn, tenant_id, id)?;
    courses::list_unchecked(conn, id)?
        .into_iter()
        .map(|course| {
            let units = units::list_unchecked(conn, &course.id)?;
            Ok((course, units))
        })
        .collect()
}

pub fn stats(conn: &Connection, tenant_id: &str, framework_id: &str) -> Result<VersionStats, ApiError> {
    let versions = list(conn, tenant_id, framework_id)?;

    let mut by_state: BTreeMap<String, i64> = VersionState::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for v in &versions {
        *by_state.entry(v.state.as_str().to_string()).or_default() += 1;
    }

    let published_version = versions.iter().find(|v| v.state == VersionState::Published).cloned();
    let latest_version = versions.last().cloned();

    // Totals describe the published content, or the newest draft before anything is published
    let content_version_id = published_version
        .as_ref()
        .or(latest_version.as_ref())
        .map(|v| v.id.clone());

    let (total_courses, total_units, total_hours) = match &content_version_id {
        Some(vid) => conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM courses WHERE version_id = ?1),
                (SELECT COUNT(*) FROM units u JOIN courses c ON c.id = u.course_id WHERE c.version_id = ?1),
                (SELECT COALESCE(SUM(hours), 0) FROM courses WHERE version_id = ?1)
            "#,
            params![vid],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?,
        None => (0, 0, 0.0),
    };

    Ok(VersionStats {
        total_versions: versions.len() as i64,
        by_state,
        published_version,
        latest_version,
        content_version_id,
        total_courses,
        total_units,
        total_hours,
    })
}
