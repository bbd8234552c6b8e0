//! Structural comparison of two curriculum versions
//!
//! Courses are matched by title (case-insensitive, trimmed); units are
//! matched by title inside a matched course pair. Anything unmatched on the
//! base side is removed, on the compare side added.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::db::courses::Course;
use crate::db::units::Unit;

/// One changed field, old and new value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: Value,
    pub to: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub id: String,
    pub title: String,
    /// Owning course title, set for units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedEntry {
    pub base_id: String,
    pub compare_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    pub added: Vec<EntrySummary>,
    pub removed: Vec<EntrySummary>,
    pub modified: Vec<ModifiedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub courses_added: usize,
    pub courses_removed: usize,
    pub courses_modified: usize,
    pub units_added: usize,
    pub units_removed: usize,
    pub units_modified: usize,
    pub total_changes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VersionDiff {
    pub courses: ChangeSet,
    pub units: ChangeSet,
    pub summary: DiffSummary,
}

fn key(title: &str) -> String {
    title.trim().to_lowercase()
}

fn push_change<T: PartialEq + Serialize>(out: &mut Vec<FieldChange>, field: &'static str, from: &T, to: &T) {
    if from != to {
        out.push(FieldChange {
            field,
            from: json!(from),
            to: json!(to),
        });
    }
}

fn course_changes(base: &Course, compare: &Course) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    push_change(&mut changes, "title", &base.title, &compare.title);
    push_change(&mut changes, "hours", &base.hours, &compare.hours);
    push_change(&mut changes, "summary", &base.summary, &compare.summary);
    push_change(&mut changes, "order_index", &base.order_index, &compare.order_index);
    changes
}

fn unit_changes(base: &Unit, compare: &Unit) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    push_change(&mut changes, "title", &base.title, &compare.title);
    push_change(&mut changes, "hours", &base.hours, &compare.hours);
    push_change(&mut changes, "difficulty_level", &base.difficulty_level, &compare.difficulty_level);
    push_change(&mut changes, "objectives", &base.objectives, &compare.objectives);
    push_change(&mut changes, "skills", &base.skills, &compare.skills);
    push_change(&mut changes, "activities", &base.activities, &compare.activities);
    push_change(&mut changes, "order_index", &base.order_index, &compare.order_index);
    changes
}

fn unit_entry(unit: &Unit, course: &Course) -> EntrySummary {
    EntrySummary {
        id: unit.id.clone(),
        title: unit.title.clone(),
        course: Some(course.title.clone()),
    }
}

fn course_entry(course: &Course) -> EntrySummary {
    EntrySummary {
        id: course.id.clone(),
        title: course.title.clone(),
        course: None,
    }
}

fn diff_units(base: (&Course, &[Unit]), compare: (&Course, &[Unit]), out: &mut ChangeSet) {
    let (base_course, base_units) = base;
    let (compare_course, compare_units) = compare;

    let mut unmatched: HashMap<String, Vec<&Unit>> = HashMap::new();
    for unit in compare_units {
        unmatched.entry(key(&unit.title)).or_default().push(unit);
    }

    for unit in base_units {
        let candidate = unmatched.get_mut(&key(&unit.title)).and_then(|list| {
            if list.is_empty() {
                None
            } else {
                Some(list.remove(0))
            }
        });
        match candidate {
            Some(other) => {
                let changes = unit_changes(unit, other);
                if !changes.is_empty() {
                    out.modified.push(ModifiedEntry {
                        base_id: unit.id.clone(),
                        compare_id: other.id.clone(),
                        title: other.title.clone(),
                        course: Some(compare_course.title.clone()),
                        changes,
                    });
                }
            }
            None => out.removed.push(unit_entry(unit, base_course)),
        }
    }

    // Keep compare-side order for additions
    for unit in compare_units {
        let still_unmatched = unmatched
            .get(&key(&unit.title))
            .is_some_and(|list| list.iter().any(|u| u.id == unit.id));
        if still_unmatched {
            out.added.push(unit_entry(unit, compare_course));
        }
    }
}

/// Compare two version trees, each a list of courses with their units in order
pub fn compare(base: &[(Course, Vec<Unit>)], other: &[(Course, Vec<Unit>)]) -> VersionDiff {
    let mut diff = VersionDiff::default();

    let mut pool: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, (course, _)) in other.iter().enumerate() {
        pool.entry(key(&course.title)).or_default().push(idx);
    }
    let mut matched = vec![false; other.len()];

    for (course, units) in base {
        let hit = pool.get_mut(&key(&course.title)).and_then(|list| {
            if list.is_empty() {
                None
            } else {
                Some(list.remove(0))
            }
        });
        let Some(idx) = hit else {
            diff.courses.removed.push(course_entry(course));
            for unit in units {
                diff.units.removed.push(unit_entry(unit, course));
            }
            continue;
        };

        matched[idx] = true;
        let (other_course, other_units) = &other[idx];
        let changes = course_changes(course, other_course);
        if !changes.is_empty() {
            diff.courses.modified.push(ModifiedEntry {
                base_id: course.id.clone(),
                compare_id: other_course.id.clone(),
                title: other_course.title.clone(),
                course: None,
                changes,
            });
        }
        diff_units((course, units), (other_course, other_units), &mut diff.units);
    }

    for (idx, (course, units)) in other.iter().enumerate() {
        if matched[idx] {
            continue;
        }
        diff.courses.added.push(course_entry(course));
        for unit in units {
            diff.units.added.push(unit_entry(unit, course));
        }
    }

    let counts = [
        diff.courses.added.len(),
        diff.courses.removed.len(),
        diff.courses.modified.len(),
        diff.units.added.len(),
        diff.units.removed.len(),
        diff.units.modified.len(),
    ];
    diff.summary = DiffSummary {
        courses_added: counts[0],
        courses_removed: counts[1],
        courses_modified: counts[2],
        units_added: counts[3],
        units_removed: counts[4],
        units_modified: counts[5],
        total_changes: counts.iter().sum(),
    };

    diff
}
