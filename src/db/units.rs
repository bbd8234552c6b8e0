//! Unit CRUD plus the derived operations: bulk update, duplicate, split and
//! completeness refresh.
//!
//! The stored `completeness_score` is recomputed on every write so list
//! responses never show a stale value.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::courses;
use super::ordering::{OrderEntry, UNITS};
use crate::curriculum::completeness::{self, CompletenessReport, UnitFields};
use crate::curriculum::{is_valid_difficulty, split, templates, Activity, MAX_ACTIVITY_MINUTES};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    pub id: String,
    pub tenant_id: String,
    pub course_id: String,
    pub title: String,
    pub objectives: Vec<String>,
    pub skills: Vec<String>,
    pub activities: Vec<Activity>,
    pub hours: f64,
    pub difficulty_level: Option<String>,
    pub order_index: i64,
    pub completeness_score: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Unit {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            course_id: row.get("course_id")?,
            title: row.get("title")?,
            objectives: super::from_json_column(row.get("objectives_json")?)?,
            skills: super::from_json_column(row.get("skills_json")?)?,
            activities: super::from_json_column(row.get("activities_json")?)?,
            hours: row.get("hours")?,
            difficulty_level: row.get("difficulty_level")?,
            order_index: row.get("order_index")?,
            completeness_score: row.get("completeness_score")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn fields(&self) -> UnitFields<'_> {
        UnitFields {
            title: &self.title,
            objectives: &self.objectives,
            skills: &self.skills,
            activities: &self.activities,
            hours: self.hours,
            difficulty_level: self.difficulty_level.as_deref(),
        }
    }

    fn blank(tenant_id: &str, course_id: &str, order_index: i64) -> Self {
        let now = super::now();
        Self {
            id: super::new_id(),
            tenant_id: tenant_id.to_string(),
            course_id: course_id.to_string(),
            title: String::new(),
            objectives: Vec::new(),
            skills: Vec::new(),
            activities: Vec::new(),
            hours: 0.0,
            difficulty_level: None,
            order_index,
            completeness_score: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Input for creating a unit; `template_id` fills omitted fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUnit {
    pub title: Option<String>,
    pub objectives: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub activities: Option<Vec<Activity>>,
    pub hours: Option<f64>,
    pub difficulty_level: Option<String>,
    pub template_id: Option<String>,
}

/// Partial update; absent fields keep their value, unknown fields are rejected
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUnit {
    pub title: Option<String>,
    pub objectives: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub activities: Option<Vec<Activity>>,
    pub hours: Option<f64>,
    pub difficulty_level: Option<String>,
}

impl UpdateUnit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.objectives.is_none()
            && self.skills.is_none()
            && self.activities.is_none()
            && self.hours.is_none()
            && self.difficulty_level.is_none()
    }

    fn apply(&self, unit: &mut Unit) {
        if let Some(title) = &self.title {
            unit.title = title.trim().to_string();
        }
        if let Some(objectives) = &self.objectives {
            unit.objectives = objectives.clone();
        }
        if let Some(skills) = &self.skills {
            unit.skills = skills.clone();
        }
        if let Some(activities) = &self.activities {
            unit.activities = activities.clone();
        }
        if let Some(hours) = self.hours {
            unit.hours = hours;
        }
        if let Some(level) = &self.difficulty_level {
            unit.difficulty_level = Some(level.clone());
        }
    }
}

/// One entry of a bulk update: `{id, ...partial}`
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct BulkUnitUpdate {
    pub id: String,
    pub changes: UpdateUnit,
}

impl TryFrom<Map<String, Value>> for BulkUnitUpdate {
    type Error = String;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            _ => return Err("every update needs a string id".to_string()),
        };
        let changes: UpdateUnit = serde_json::from_value(Value::Object(fields))
            .map_err(|e| format!("update for unit {}: {}", id, e))?;
        if changes.is_empty() {
            return Err(format!("update for unit {} changes nothing", id));
        }
        Ok(Self { id, changes })
    }
}

fn validate(unit: &Unit) -> Result<(), ApiError> {
    if unit.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if unit.hours < 0.0 {
        return Err(ApiError::Validation("hours must not be negative".into()));
    }
    if let Some(level) = &unit.difficulty_level {
        if !is_valid_difficulty(level) {
            return Err(ApiError::Validation(format!("Unknown difficulty level '{}'", level)));
        }
    }
    if unit.activities.iter().any(|a| a.title.trim().is_empty()) {
        return Err(ApiError::Validation("Every activity needs a title".into()));
    }
    if unit.activities.iter().any(|a| a.duration_minutes > MAX_ACTIVITY_MINUTES) {
        return Err(ApiError::Validation(format!(
            "Activity duration must not exceed {} minutes",
            MAX_ACTIVITY_MINUTES
        )));
    }
    Ok(())
}

fn insert(conn: &Connection, unit: &mut Unit) -> Result<(), ApiError> {
    unit.completeness_score = completeness::score(&unit.fields()) as i64;
    conn.execute(
        r#"
        INSERT INTO units (
            id, tenant_id, course_id, title, objectives_json, skills_json, activities_json,
            hours, difficulty_level, order_index, completeness_score, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            unit.id,
            unit.tenant_id,
            unit.course_id,
            unit.title,
            super::to_json_column(&unit.objectives)?,
            super::to_json_column(&unit.skills)?,
            super::to_json_column(&unit.activities)?,
            unit.hours,
            unit.difficulty_level,
            unit.order_index,
            unit.completeness_score,
            unit.created_at,
            unit.updated_at,
        ],
    )?;
    Ok(())
}

fn save(conn: &Connection, unit: &mut Unit) -> Result<(), ApiError> {
    unit.completeness_score = completeness::score(&unit.fields()) as i64;
    unit.updated_at = super::now();
    conn.execute(
        r#"
        UPDATE units SET
            course_id = ?, title = ?, objectives_json = ?, skills_json = ?, activities_json = ?,
            hours = ?, difficulty_level = ?, order_index = ?, completeness_score = ?, updated_at = ?
        WHERE id = ?
        "#,
        params![
            unit.course_id,
            unit.title,
            super::to_json_column(&unit.objectives)?,
            super::to_json_column(&unit.skills)?,
            super::to_json_column(&unit.activities)?,
            unit.hours,
            unit.difficulty_level,
            unit.order_index,
            unit.completeness_score,
            unit.updated_at,
            unit.id,
        ],
    )?;
    Ok(())
}

/// Unit reachable in the tenant (its framework is not deleted)
pub fn get(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<Unit>, ApiError> {
    Ok(conn
        .query_row(
            r#"
            SELECT u.* FROM units u
            JOIN courses c ON c.id = u.course_id
            JOIN versions v ON v.id = c.version_id
            JOIN curriculum_frameworks f ON f.id = v.framework_id
            WHERE u.id = ? AND u.tenant_id = ? AND f.deleted_at IS NULL
            "#,
            params![id, tenant_id],
            Unit::from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, tenant_id: &str, id: &str) -> Result<Unit, ApiError> {
    get(conn, tenant_id, id)?.ok_or_else(|| ApiError::not_found("Unit", id))
}

fn require_editable(conn: &Connection, tenant_id: &str, id: &str) -> Result<Unit, ApiError> {
    let unit = require(conn, tenant_id, id)?;
    courses::require_editable(conn, tenant_id, &unit.course_id)?;
    Ok(unit)
}

pub fn list(conn: &Connection, tenant_id: &str, course_id: &str) -> Result<Vec<Unit>, ApiError> {
    courses::require(conn, tenant_id, course_id)?;
    list_unchecked(conn, course_id)
}

pub(crate) fn list_unchecked(conn: &Connection, course_id: &str) -> Result<Vec<Unit>, ApiError> {
    let mut stmt = conn.prepare("SELECT * FROM units WHERE course_id = ? ORDER BY order_index, created_at")?;
    let units = stmt
        .query_map(params![course_id], Unit::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(units)
}

pub fn create(conn: &Connection, tenant_id: &str, course_id: &str, input: &CreateUnit) -> Result<Unit, ApiError> {
    courses::require_editable(conn, tenant_id, course_id)?;

    let mut unit = Unit::blank(tenant_id, course_id, UNITS.count(conn, course_id)?);

    if let Some(template_id) = &input.template_id {
        let template = templates::find(template_id)
            .ok_or_else(|| ApiError::Validation(format!("Unknown template '{}'", template_id)))?;
        unit.title = template.name.to_string();
        unit.objectives = template.objectives;
        unit.skills = template.skills;
        unit.activities = template.activities;
        unit.hours = template.hours;
        unit.difficulty_level = template.difficulty_level.map(str::to_string);
    }

    UpdateUnit {
        title: input.title.clone(),
        objectives: input.objectives.clone(),
        skills: input.skills.clone(),
        activities: input.activities.clone(),
        hours: input.hours,
        difficulty_level: input.difficulty_level.clone(),
    }
    .apply(&mut unit);

    validate(&unit)?;
    insert(conn, &mut unit)?;
    debug!(unit_id = %unit.id, course_id, "Created unit");
    Ok(unit)
}

pub fn update(conn: &Connection, tenant_id: &str, id: &str, patch: &UpdateUnit) -> Result<Unit, ApiError> {
    let mut unit = require_editable(conn, tenant_id, id)?;
    patch.apply(&mut unit);
    validate(&unit)?;
    save(conn, &mut unit)?;
    Ok(unit)
}

pub fn delete(conn: &mut Connection, tenant_id: &str, id: &str) -> Result<(), ApiError> {
    let tx = conn.transaction()?;
    let unit = require_editable(&tx, tenant_id, id)?;

    tx.execute("DELETE FROM units WHERE id = ?", params![id])?;
    UNITS.compact(&tx, &unit.course_id)?;

    tx.commit()?;
    Ok(())
}

pub fn reorder(conn: &mut Connection, tenant_id: &str, orders: &[OrderEntry]) -> Result<Vec<Unit>, ApiError> {
    let course_id = UNITS.reorder(conn, tenant_id, orders, |c, course_id| {
        courses::require_editable(c, tenant_id, course_id).map(|_| ())
    })?;
    list_unchecked(conn, &course_id)
}

/// Apply every update or none
pub fn bulk_update(conn: &mut Connection, tenant_id: &str, updates: &[BulkUnitUpdate]) -> Result<Vec<Unit>, ApiError> {
    if updates.is_empty() {
        return Err(ApiError::Validation("updates must not be empty".into()));
    }

    let tx = conn.transaction()?;
    let mut result = Vec::with_capacity(updates.len());
    for entry in updates {
        let mut unit = require_editable(&tx, tenant_id, &entry.id)?;
        entry.changes.apply(&mut unit);
        validate(&unit)?;
        save(&tx, &mut unit)?;
        result.push(unit);
    }
    tx.commit()?;

    Ok(result)
}

/// Deep-copy a unit to the end of `target_course_id` (default: its own course)
pub fn duplicate(
    conn: &mut Connection,
    tenant_id: &str,
    id: &str,
    target_course_id: Option<&str>,
) -> Result<Unit, ApiError> {
    let tx = conn.transaction()?;
    let source = require(&tx, tenant_id, id)?;
    let target = target_course_id.unwrap_or(&source.course_id).to_string();
    courses::require_editable(&tx, tenant_id, &target)?;

    let mut copy = Unit {
        title: format!("{} (copy)", source.title),
        ..Unit::blank(tenant_id, &target, UNITS.count(&tx, &target)?)
    };
    copy.objectives = source.objectives;
    copy.skills = source.skills;
    copy.activities = source.activities;
    copy.hours = source.hours;
    copy.difficulty_level = source.difficulty_level;

    insert(&tx, &mut copy)?;
    tx.commit()?;
    Ok(copy)
}

/// Copy a unit verbatim into another course at a given position
pub(crate) fn insert_copy(conn: &Connection, source: &Unit, course_id: &str, order_index: i64) -> Result<Unit, ApiError> {
    let mut copy = Unit {
        title: source.title.clone(),
        objectives: source.objectives.clone(),
        skills: source.skills.clone(),
        activities: source.activities.clone(),
        hours: source.hours,
        difficulty_level: source.difficulty_level.clone(),
        ..Unit::blank(&source.tenant_id, course_id, order_index)
    };
    insert(conn, &mut copy)?;
    Ok(copy)
}

/// Move the activities after `split_after` into a new unit placed right
/// after the source. Returns `(source, new_unit)`.
pub fn split(
    conn: &mut Connection,
    tenant_id: &str,
    id: &str,
    split_after: i64,
    new_title: Option<&str>,
) -> Result<(Unit, Unit), ApiError> {
    if split_after < 0 {
        return Err(ApiError::Validation("split_after_order_index must not be negative".into()));
    }

    let tx = conn.transaction()?;
    let mut source = require_editable(&tx, tenant_id, id)?;

    let plan = split::plan(&source.activities, source.hours, split_after as usize).map_err(ApiError::Validation)?;

    let title = match new_title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => format!("{} (part 2)", source.title),
    };

    UNITS.make_room(&tx, &source.course_id, source.order_index + 1)?;

    let mut tail = Unit {
        title,
        skills: source.skills.clone(),
        activities: plan.moved,
        hours: plan.moved_hours,
        difficulty_level: source.difficulty_level.clone(),
        ..Unit::blank(tenant_id, &source.course_id, source.order_index + 1)
    };
    insert(&tx, &mut tail)?;

    source.activities = plan.kept;
    source.hours = plan.kept_hours;
    save(&tx, &mut source)?;

    tx.commit()?;
    debug!(unit_id = %source.id, new_unit_id = %tail.id, "Split unit");
    Ok((source, tail))
}

/// Recompute, persist and return the completeness report
pub fn refresh_completeness(conn: &Connection, tenant_id: &str, id: &str) -> Result<(Unit, CompletenessReport), ApiError> {
    let mut unit = require(conn, tenant_id, id)?;
    let report = completeness::evaluate(&unit.fields());
    unit.completeness_score = report.score as i64;
    conn.execute(
        "UPDATE units SET completeness_score = ? WHERE id = ?",
        params![unit.completeness_score, id],
    )?;
    Ok((unit, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::courses::CreateCourse;
    use crate::db::test_support::{seed_version, TENANT};
    use crate::db::Database;

    fn activity(title: &str, minutes: u32) -> Activity {
        Activity {
            activity_type: "practice".into(),
            title: title.into(),
            duration_minutes: minutes,
            description: None,
        }
    }

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let version_id = seed_version(&db);
        let course = db
            .with_conn(|conn| {
                courses::create(
                    conn,
                    TENANT,
                    &version_id,
                    &CreateCourse {
                        title: "Course".into(),
                        hours: 10.0,
                        summary: None,
                    },
                )
            })
            .unwrap();
        (db, course.id)
    }

    fn unit(title: &str) -> CreateUnit {
        CreateUnit {
            title: Some(title.into()),
            hours: Some(2.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_from_template_keeps_explicit_fields() {
        let (db, course_id) = setup();
        let created = db
            .with_conn(|conn| {
                create(
                    conn,
                    TENANT,
                    &course_id,
                    &CreateUnit {
                        title: Some("My lesson".into()),
                        template_id: Some("standard-lesson".into()),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert_eq!(created.title, "My lesson");
        assert_eq!(created.activities.len(), 4);
        assert_eq!(created.hours, 1.0);
        assert!(created.completeness_score > 0);

        let err = db
            .with_conn(|conn| {
                create(
                    conn,
                    TENANT,
                    &course_id,
                    &CreateUnit {
                        template_id: Some("missing".into()),
                        ..Default::default()
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_duplicate_appends_copy() {
        let (db, course_id) = setup();
        let (a, _b) = db
            .with_conn(|conn| {
                let mut input = unit("A");
                input.objectives = Some(vec!["Greet".into()]);
                Ok((create(conn, TENANT, &course_id, &input)?, create(conn, TENANT, &course_id, &unit("B"))?))
            })
            .unwrap();

        let copy = db.with_conn_mut(|conn| duplicate(conn, TENANT, &a.id, None)).unwrap();
        assert_ne!(copy.id, a.id);
        assert_eq!(copy.title, "A (copy)");
        assert_eq!(copy.objectives, a.objectives);
        assert_eq!(copy.order_index, 2);
    }

    #[test]
    fn test_split_inserts_after_source() {
        let (db, course_id) = setup();
        let (a, b) = db
            .with_conn(|conn| {
                let mut input = unit("A");
                input.skills = Some(vec!["speaking".into()]);
                input.objectives = Some(vec!["Talk".into()]);
                input.activities = Some(vec![activity("one", 30), activity("two", 30), activity("three", 60)]);
                Ok((create(conn, TENANT, &course_id, &input)?, create(conn, TENANT, &course_id, &unit("B"))?))
            })
            .unwrap();

        let (source, tail) = db
            .with_conn_mut(|conn| split(conn, TENANT, &a.id, 1, Some("A2")))
            .unwrap();
        assert_eq!(source.activities.len(), 2);
        assert_eq!(source.hours, 1.0);
        assert_eq!(tail.activities.len(), 1);
        assert_eq!(tail.hours, 1.0);
        assert_eq!(tail.skills, vec!["speaking".to_string()]);
        assert!(tail.objectives.is_empty());

        let order: Vec<(String, i64)> = db
            .with_conn(|conn| list(conn, TENANT, &course_id))
            .unwrap()
            .into_iter()
            .map(|u| (u.id, u.order_index))
            .collect();
        assert_eq!(order, vec![(a.id.clone(), 0), (tail.id.clone(), 1), (b.id.clone(), 2)]);

        let err = db
            .with_conn_mut(|conn| split(conn, TENANT, &a.id, 1, None))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_bulk_update_is_atomic() {
        let (db, course_id) = setup();
        let a = db.with_conn(|conn| create(conn, TENANT, &course_id, &unit("A"))).unwrap();

        let updates = vec![
            BulkUnitUpdate {
                id: a.id.clone(),
                changes: UpdateUnit {
                    title: Some("Renamed".into()),
                    ..Default::default()
                },
            },
            BulkUnitUpdate {
                id: "missing".into(),
                changes: UpdateUnit::default(),
            },
        ];
        assert!(db.with_conn_mut(|conn| bulk_update(conn, TENANT, &updates)).is_err());
        let fresh = db.with_conn(|conn| require(conn, TENANT, &a.id)).unwrap();
        assert_eq!(fresh.title, "A");

        let updated = db
            .with_conn_mut(|conn| bulk_update(conn, TENANT, &updates[..1]))
            .unwrap();
        assert_eq!(updated[0].title, "Renamed");
    }

    #[test]
    fn test_invalid_difficulty_rejected() {
        let (db, course_id) = setup();
        let mut input = unit("A");
        input.difficulty_level = Some("expert".into());
        let err = db
            .with_conn(|conn| create(conn, TENANT, &course_id, &input))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_refresh_completeness_persists() {
        let (db, course_id) = setup();
        let a = db.with_conn(|conn| create(conn, TENANT, &course_id, &unit("A"))).unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE units SET completeness_score = 0 WHERE id = ?", [&a.id])?;
            Ok(())
        })
        .unwrap();

        let (_, report) = db.with_conn(|conn| refresh_completeness(conn, TENANT, &a.id)).unwrap();
        assert_eq!(report.score, 20);
        let stored = db.with_conn(|conn| require(conn, TENANT, &a.id)).unwrap();
        assert_eq!(stored.completeness_score, 20);
    }

    #[test]
    fn test_bulk_entries_reject_unknown_and_empty_fields() {
        let misspelled = serde_json::from_str::<BulkUnitUpdate>(r#"{"id": "u1", "titel": "Oops"}"#);
        assert!(misspelled.unwrap_err().to_string().contains("titel"));

        let empty = serde_json::from_str::<BulkUnitUpdate>(r#"{"id": "u1"}"#);
        assert!(empty.unwrap_err().to_string().contains("changes nothing"));

        let missing_id = serde_json::from_str::<BulkUnitUpdate>(r#"{"hours": 2.0}"#);
        assert!(missing_id.is_err());

        let ok: BulkUnitUpdate = serde_json::from_str(r#"{"id": "u1", "hours": 2.0}"#).unwrap();
        assert_eq!(ok.id, "u1");
        assert_eq!(ok.changes.hours, Some(2.0));
    }

    #[test]
    fn test_activity_duration_is_bounded() {
        let (db, course_id) = setup();
        let mut input = unit("A");
        input.activities = Some(vec![activity("Marathon", MAX_ACTIVITY_MINUTES + 1)]);
        let err = db
            .with_conn(|conn| create(conn, TENANT, &course_id, &input))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        input.activities = Some(vec![activity("Full day", MAX_ACTIVITY_MINUTES)]);
        assert!(db.with_conn(|conn| create(conn, TENANT, &course_id, &input)).is_ok());
    }

    #[test]
    fn test_reorder_units_is_atomic() {
        let (db, course_id) = setup();
        let ids: Vec<String> = ["A", "B", "C"]
            .iter()
            .map(|t| db.with_conn(|conn| create(conn, TENANT, &course_id, &unit(t))).unwrap().id)
            .collect();
        let entry = |i: usize, order_index: i64| OrderEntry {
            id: ids[i].clone(),
            order_index,
        };

        // Duplicate index
        let bad = vec![entry(0, 1), entry(1, 1), entry(2, 0)];
        assert!(db.with_conn_mut(|conn| reorder(conn, TENANT, &bad)).is_err());
        // Partial list
        let partial = vec![entry(0, 1), entry(1, 0)];
        assert!(db.with_conn_mut(|conn| reorder(conn, TENANT, &partial)).is_err());

        let titles = |db: &Database| -> Vec<String> {
            db.with_conn(|conn| list(conn, TENANT, &course_id))
                .unwrap()
                .into_iter()
                .map(|u| u.title)
                .collect()
        };
        assert_eq!(titles(&db), vec!["A", "B", "C"]);

        let good = vec![entry(0, 2), entry(1, 0), entry(2, 1)];
        let reordered = db.with_conn_mut(|conn| reorder(conn, TENANT, &good)).unwrap();
        let indices: Vec<i64> = reordered.iter().map(|u| u.order_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(titles(&db), vec!["B", "C", "A"]);
    }
}
