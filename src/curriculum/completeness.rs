//! Unit completeness scoring and validation

use serde::Serialize;

use super::{is_valid_difficulty, Activity};

/// The fields a unit is scored on, borrowed from whatever holds them
#[derive(Debug, Clone, Copy)]
pub struct UnitFields<'a> {
    pub title: &'a str,
    pub objectives: &'a [String],
    pub skills: &'a [String],
    pub activities: &'a [Activity],
    pub hours: f64,
    pub difficulty_level: Option<&'a str>,
}

/// One checklist line of the completeness report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistItem {
    pub item: &'static str,
    pub weight: u32,
    pub satisfied: bool,
}

/// Scored checklist for one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessReport {
    pub score: u32,
    pub checklist: Vec<ChecklistItem>,
    pub missing: Vec<&'static str>,
}

// Weights sum to 100
const WEIGHTS: [(&str, u32); 6] = [
    ("title", 10),
    ("objectives", 25),
    ("skills", 20),
    ("activities", 25),
    ("hours", 10),
    ("difficulty_level", 10),
];

fn non_blank(items: &[String]) -> bool {
    items.iter().any(|s| !s.trim().is_empty())
}

/// Score a unit against the required checklist
pub fn evaluate(unit: &UnitFields<'_>) -> CompletenessReport {
    let checklist: Vec<ChecklistItem> = WEIGHTS
        .iter()
        .map(|&(item, weight)| {
            let satisfied = match item {
                "title" => !unit.title.trim().is_empty(),
                "objectives" => non_blank(unit.objectives),
                "skills" => non_blank(unit.skills),
                "activities" => !unit.activities.is_empty(),
                "hours" => unit.hours > 0.0,
                _ => unit.difficulty_level.is_some_and(is_valid_difficulty),
            };
            ChecklistItem {
                item,
                weight,
                satisfied,
            }
        })
        .collect();

    let score = checklist.iter().filter(|c| c.satisfied).map(|c| c.weight).sum();
    let missing = checklist
        .iter()
        .filter(|c| !c.satisfied)
        .map(|c| c.item)
        .collect();

    CompletenessReport {
        score,
        checklist,
        missing,
    }
}

/// Convenience wrapper returning only the score
pub fn score(unit: &UnitFields<'_>) -> u32 {
    evaluate(unit).score
}

/// Result of validating a unit for review
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Check a unit against the rules a reviewer would apply
pub fn validate(unit: &UnitFields<'_>) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if unit.title.trim().is_empty() {
        errors.push("Title must not be empty".to_string());
    }
    if unit.hours <= 0.0 {
        errors.push("Hours must be greater than zero".to_string());
    }
    if !non_blank(unit.objectives) {
        errors.push("At least one learning objective is required".to_string());
    }
    match unit.difficulty_level {
        Some(level) if !is_valid_difficulty(level) => {
            errors.push(format!("Unknown difficulty level '{}'", level));
        }
        None => warnings.push("Difficulty level is not set".to_string()),
        Some(_) => {}
    }

    if unit.activities.is_empty() {
        warnings.push("Unit has no activities".to_string());
    } else {
        let planned_minutes: u64 = unit.activities.iter().map(|a| u64::from(a.duration_minutes)).sum();
        let available_minutes = unit.hours * 60.0;
        if unit.hours > 0.0 && planned_minutes as f64 > available_minutes {
            warnings.push(format!(
                "Activities take {} minutes but the unit only has {} hours",
                planned_minutes, unit.hours
            ));
        }
    }

    if !non_blank(unit.skills) {
        warnings.push("No skills are listed".to_string());
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
