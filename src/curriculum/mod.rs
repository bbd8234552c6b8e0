//! Curriculum domain rules, independent of storage and HTTP
//!
//! - `workflow` - version state machine
//! - `completeness` - unit completeness scoring and validation
//! - `diff` - structural comparison of two versions
//! - `split` - partitioning a unit's activities
//! - `templates` - built-in unit templates
//!
//! Shared value types (`Activity`, `EntityRef`) and `learning_outcomes`
//! live here.

pub mod completeness;
pub mod diff;
pub mod split;
pub mod templates;
pub mod workflow;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use workflow::{transition, InvalidTransition, ReviewDecision, VersionAction, VersionState};

/// A planned activity inside a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub title: String,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Accepted values of `difficulty_level`
pub const DIFFICULTY_LEVELS: &[&str] = &[
    "beginner",
    "elementary",
    "intermediate",
    "upper_intermediate",
    "advanced",
];

/// Longest accepted activity, one day
pub const MAX_ACTIVITY_MINUTES: u32 = 24 * 60;

pub fn is_valid_difficulty(level: &str) -> bool {
    DIFFICULTY_LEVELS.contains(&level)
}

/// One objective with the skills and activities that serve it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningOutcome {
    pub objective: String,
    pub skills: Vec<String>,
    pub activities: Vec<String>,
}

/// Pair every objective of a unit with its skills and activity titles
pub fn learning_outcomes(objectives: &[String], skills: &[String], activities: &[Activity]) -> Vec<LearningOutcome> {
    let titles: Vec<String> = activities.iter().map(|a| a.title.clone()).collect();
    objectives
        .iter()
        .filter(|o| !o.trim().is_empty())
        .map(|objective| LearningOutcome {
            objective: objective.clone(),
            skills: skills.to_vec(),
            activities: titles.clone(),
        })
        .collect()
}

/// Curriculum entity kinds that resources, comments and mappings attach to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Framework,
    Version,
    Course,
    Unit,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Framework => "framework",
            EntityKind::Version => "version",
            EntityKind::Course => "course",
            EntityKind::Unit => "unit",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    /// Accepts singular and plural path segments, plus `kct` for frameworks
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "framework" | "frameworks" | "kct" => Ok(EntityKind::Framework),
            "version" | "versions" => Ok(EntityKind::Version),
            "course" | "courses" => Ok(EntityKind::Course),
            "unit" | "units" => Ok(EntityKind::Unit),
            other => Err(format!("Unknown entity type: {}", other)),
        }
    }
}

/// Typed reference to one attachable curriculum entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Framework(String),
    Version(String),
    Course(String),
    Unit(String),
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        let id = id.into();
        match kind {
            EntityKind::Framework => EntityRef::Framework(id),
            EntityKind::Version => EntityRef::Version(id),
            EntityKind::Course => EntityRef::Course(id),
            EntityKind::Unit => EntityRef::Unit(id),
        }
    }

    /// Parse a `(type, id)` pair from a URL or a stored row
    pub fn parse(kind: &str, id: &str) -> Result<Self, String> {
        if id.trim().is_empty() {
            return Err("Entity id must not be empty".to_string());
        }
        Ok(Self::new(kind.parse()?, id))
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Framework(_) => EntityKind::Framework,
            EntityRef::Version(_) => EntityKind::Version,
            EntityRef::Course(_) => EntityKind::Course,
            EntityRef::Unit(_) => EntityKind::Unit,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityRef::Framework(id)
            | EntityRef::Version(id)
            | EntityRef::Course(id)
            | EntityRef::Unit(id) => id,
        }
    }
}
