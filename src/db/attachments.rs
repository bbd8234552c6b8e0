//! Resources, approval records and comments attached to curriculum entities

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::curriculum::{EntityKind, EntityRef};
use crate::error::ApiError;

/// Framework that owns `entity`, if the entity is live in the tenant
pub fn owning_framework(conn: &Connection, tenant_id: &str, entity: &EntityRef) -> Result<Option<String>, ApiError> {
    let sql = match entity.kind() {
        EntityKind::Framework => {
            "SELECT f.id FROM curriculum_frameworks f WHERE f.id = ?1 AND f.tenant_id = ?2 AND f.deleted_at IS NULL"
        }
        EntityKind::Version => {
            r#"SELECT f.id FROM versions v
               JOIN curriculum_frameworks f ON f.id = v.framework_id
               WHERE v.id = ?1 AND v.tenant_id = ?2 AND f.deleted_at IS NULL"#
        }
        EntityKind::Course => {
            r#"SELECT f.id FROM courses c
               JOIN versions v ON v.id = c.version_id
               JOIN curriculum_frameworks f ON f.id = v.framework_id
               WHERE c.id = ?1 AND c.tenant_id = ?2 AND f.deleted_at IS NULL"#
        }
        EntityKind::Unit => {
            r#"SELECT f.id FROM units u
               JOIN courses c ON c.id = u.course_id
               JOIN versions v ON v.id = c.version_id
               JOIN curriculum_frameworks f ON f.id = v.framework_id
               WHERE u.id = ?1 AND u.tenant_id = ?2 AND f.deleted_at IS NULL"#
        }
    };
    Ok(conn
        .query_row(sql, params![entity.id(), tenant_id], |r| r.get(0))
        .optional()?)
}

/// 404 unless `entity` is live in the tenant
pub fn require_entity(conn: &Connection, tenant_id: &str, entity: &EntityRef) -> Result<String, ApiError> {
    owning_framework(conn, tenant_id, entity)?.ok_or_else(|| {
        let kind = entity.kind().as_str();
        let mut label = kind.to_string();
        label[..1].make_ascii_uppercase();
        ApiError::not_found(&label, entity.id())
    })
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub title: String,
    pub resource_type: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl Resource {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            entity_type: row.get("entity_type")?,
            entity_id: row.get("entity_id")?,
            title: row.get("title")?,
            resource_type: row.get("resource_type")?,
            url: row.get("url")?,
            description: row.get("description")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResource {
    pub title: String,
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_resource_type() -> String {
    "link".to_string()
}

pub fn list_resources(conn: &Connection, tenant_id: &str, entity: &EntityRef) -> Result<Vec<Resource>, ApiError> {
    require_entity(conn, tenant_id, entity)?;
    let mut stmt = conn.prepare(
        "SELECT * FROM resources WHERE tenant_id = ? AND entity_type = ? AND entity_id = ? ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map(params![tenant_id, entity.kind().as_str(), entity.id()], Resource::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_resource(
    conn: &Connection,
    tenant_id: &str,
    entity: &EntityRef,
    input: &CreateResource,
    actor: &str,
) -> Result<Resource, ApiError> {
    require_entity(conn, tenant_id, entity)?;
    if input.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }

    let id = super::new_id();
    conn.execute(
        r#"
        INSERT INTO resources (id, tenant_id, entity_type, entity_id, title, resource_type, url, description, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            tenant_id,
            entity.kind().as_str(),
            entity.id(),
            input.title.trim(),
            input.resource_type,
            input.url,
            input.description,
            actor,
            super::now(),
        ],
    )?;
    Ok(conn.query_row("SELECT * FROM resources WHERE id = ?", params![id], Resource::from_row)?)
}

// ============================================================================
// Approvals
// ============================================================================

/// Audit record written for every workflow transition
#[derive(Debug, Clone, Serialize)]
pub struct Approval {
    pub id: String,
    pub version_id: String,
    pub action: String,
    pub decision: Option<String>,
    pub comments: Option<String>,
    pub from_state: String,
    pub to_state: String,
    pub actor_user_id: Option<String>,
    pub created_at: String,
}

impl Approval {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            version_id: row.get("version_id")?,
            action: row.get("action")?,
            decision: row.get("decision")?,
            comments: row.get("comments")?,
            from_state: row.get("from_state")?,
            to_state: row.get("to_state")?,
            actor_user_id: row.get("actor_user_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct NewApproval<'a> {
    pub version_id: &'a str,
    pub action: &'a str,
    pub decision: Option<&'a str>,
    pub comments: Option<&'a str>,
    pub from_state: &'a str,
    pub to_state: &'a str,
    pub actor_user_id: Option<&'a str>,
}

pub fn insert_approval(conn: &Connection, tenant_id: &str, record: &NewApproval<'_>) -> Result<(), ApiError> {
    conn.execute(
        r#"
        INSERT INTO approvals (id, tenant_id, version_id, action, decision, comments, from_state, to_state, actor_user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            super::new_id(),
            tenant_id,
            record.version_id,
            record.action,
            record.decision,
            record.comments,
            record.from_state,
            record.to_state,
            record.actor_user_id,
            super::now(),
        ],
    )?;
    Ok(())
}

/// Approval records of one version, oldest first
pub fn list_approvals(conn: &Connection, tenant_id: &str, version_id: &str) -> Result<Vec<Approval>, ApiError> {
    require_entity(conn, tenant_id, &EntityRef::Version(version_id.to_string()))?;
    let mut stmt = conn.prepare(
        "SELECT * FROM approvals WHERE tenant_id = ? AND version_id = ? ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map(params![tenant_id, version_id], Approval::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Approval records across all versions of a framework, newest first
pub fn framework_history(conn: &Connection, tenant_id: &str, framework_id: &str) -> Result<Vec<Approval>, ApiError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT a.* FROM approvals a
        JOIN versions v ON v.id = a.version_id
        WHERE a.tenant_id = ? AND v.framework_id = ?
        ORDER BY a.created_at DESC, a.rowid DESC
        "#,
    )?;
    let rows = stmt
        .query_map(params![tenant_id, framework_id], Approval::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub author_user_id: Option<String>,
    pub created_at: String,
}

impl Comment {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            entity_type: row.get("entity_type")?,
            entity_id: row.get("entity_id")?,
            parent_id: row.get("parent_id")?,
            body: row.get("body")?,
            author_user_id: row.get("author_user_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateComment {
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

pub fn list_comments(conn: &Connection, tenant_id: &str, entity: &EntityRef) -> Result<Vec<Comment>, ApiError> {
    require_entity(conn, tenant_id, entity)?;
    let mut stmt = conn.prepare(
        "SELECT * FROM comments WHERE tenant_id = ? AND entity_type = ? AND entity_id = ? ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map(params![tenant_id, entity.kind().as_str(), entity.id()], Comment::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_comment(
    conn: &Connection,
    tenant_id: &str,
    entity: &EntityRef,
    input: &CreateComment,
    author: &str,
) -> Result<Comment, ApiError> {
    require_entity(conn, tenant_id, entity)?;
    if input.body.trim().is_empty() {
        return Err(ApiError::Validation("body is required".into()));
    }

    if let Some(parent_id) = &input.parent_id {
        let parent_matches: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM comments WHERE id = ? AND tenant_id = ? AND entity_type = ? AND entity_id = ?",
                params![parent_id, tenant_id, entity.kind().as_str(), entity.id()],
                |r| r.get(0),
            )
            .optional()?;
        if parent_matches.is_none() {
            return Err(ApiError::Validation(format!(
                "parent_id {} is not a comment on this {}",
                parent_id,
                entity.kind()
            )));
        }
    }

    let id = super::new_id();
    conn.execute(
        r#"
        INSERT INTO comments (id, tenant_id, entity_type, entity_id, parent_id, body, author_user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            tenant_id,
            entity.kind().as_str(),
            entity.id(),
            input.parent_id,
            input.body.trim(),
            author,
            super::now(),
        ],
    )?;
    Ok(conn.query_row("SELECT * FROM comments WHERE id = ?", params![id], Comment::from_row)?)
}
