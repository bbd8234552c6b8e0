//! Cross-references from curriculum entities to external standards

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::attachments::require_entity;
use crate::curriculum::EntityRef;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct Mapping {
    pub id: String,
    pub framework_id: String,
    pub entity_type: String,
    pub entity_id: String,
    /// External standard, e.g. `CEFR`
    pub standard: String,
    pub external_code: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl Mapping {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            framework_id: row.get("framework_id")?,
            entity_type: row.get("entity_type")?,
            entity_id: row.get("entity_id")?,
            standard: row.get("standard")?,
            external_code: row.get("external_code")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMapping {
    pub entity_type: String,
    pub entity_id: String,
    pub standard: String,
    pub external_code: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Mappings in the tenant, optionally restricted to one framework.
/// Mappings of deleted frameworks are hidden.
pub fn list(conn: &Connection, tenant_id: &str, framework_id: Option<&str>) -> Result<Vec<Mapping>, ApiError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT m.* FROM mappings m
        JOIN curriculum_frameworks f ON f.id = m.framework_id
        WHERE m.tenant_id = ?1 AND f.deleted_at IS NULL AND (?2 IS NULL OR m.framework_id = ?2)
        ORDER BY m.created_at, m.rowid
        "#,
    )?;
    let rows = stmt
        .query_map(params![tenant_id, framework_id], Mapping::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create(conn: &Connection, tenant_id: &str, input: &CreateMapping) -> Result<Mapping, ApiError> {
    let entity = EntityRef::parse(&input.entity_type, &input.entity_id).map_err(ApiError::Validation)?;
    if input.standard.trim().is_empty() || input.external_code.trim().is_empty() {
        return Err(ApiError::Validation("standard and external_code are required".into()));
    }

    let framework_id = require_entity(conn, tenant_id, &entity)?;

    let id = super::new_id();
    conn.execute(
        r#"
        INSERT INTO mappings (id, tenant_id, framework_id, entity_type, entity_id, standard, external_code, description, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            tenant_id,
            framework_id,
            entity.kind().as_str(),
            entity.id(),
            input.standard.trim(),
            input.external_code.trim(),
            input.description,
            super::now(),
        ],
    )?;
    Ok(conn.query_row("SELECT * FROM mappings WHERE id = ?", params![id], Mapping::from_row)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_framework, seed_version, TENANT};
    use crate::db::Database;

    #[test]
    fn test_mapping_resolves_framework() {
        let db = Database::open_in_memory().unwrap();
        let version_id = seed_version(&db);
        let other_framework = seed_framework(&db);

        let mapping = db
            .with_conn(|conn| {
                create(
                    conn,
                    TENANT,
                    &CreateMapping {
                        entity_type: "versions".into(),
                        entity_id: version_id.clone(),
                        standard: "CEFR".into(),
                        external_code: "A1".into(),
                        description: None,
                    },
                )
            })
            .unwrap();
        assert_eq!(mapping.entity_type, "version");

        let all = db.with_conn(|conn| list(conn, TENANT, None)).unwrap();
        assert_eq!(all.len(), 1);
        let filtered = db
            .with_conn(|conn| list(conn, TENANT, Some(&mapping.framework_id)))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        let other = db.with_conn(|conn| list(conn, TENANT, Some(&other_framework))).unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_unknown_entity_type() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| {
                create(
                    conn,
                    TENANT,
                    &CreateMapping {
                        entity_type: "lesson".into(),
                        entity_id: "x".into(),
                        standard: "CEFR".into(),
                        external_code: "A1".into(),
                        description: None,
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
