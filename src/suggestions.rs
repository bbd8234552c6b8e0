//! Unit improvement suggestions
//!
//! Handlers only see the `SuggestionProvider` trait, so a generative
//! backend can be swapped in without touching the routes. The built-in
//! `RuleBasedSuggester` works offline and is deterministic.

use serde::Serialize;

use crate::curriculum::completeness;
use crate::curriculum::{Activity, DIFFICULTY_LEVELS};
use crate::db::units::Unit;
use crate::error::ApiError;

/// Suggested additions for one unit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Suggestions {
    pub unit_id: String,
    pub provider: String,
    pub objectives: Vec<String>,
    pub skills: Vec<String>,
    pub activities: Vec<Activity>,
    pub difficulty_level: Option<String>,
    pub notes: Vec<String>,
}

/// Source of suggestions for a unit
#[async_trait::async_trait]
pub trait SuggestionProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn suggest(&self, unit: &Unit) -> Result<Suggestions, ApiError>;
}

/// Derives suggestions from what the unit is missing
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedSuggester;

const DEFAULT_SKILLS: &[&str] = &["listening", "speaking", "reading", "writing"];

fn activity(kind: &str, title: String, minutes: u32) -> Activity {
    Activity {
        activity_type: kind.to_string(),
        title,
        duration_minutes: minutes,
        description: None,
    }
}

#[async_trait::async_trait]
impl SuggestionProvider for RuleBasedSuggester {
    fn name(&self) -> &'static str {
        "rule-based"
    }

    async fn suggest(&self, unit: &Unit) -> Result<Suggestions, ApiError> {
        let report = completeness::evaluate(&unit.fields());
        let topic = if unit.title.trim().is_empty() {
            "this unit".to_string()
        } else {
            format!("\"{}\"", unit.title.trim())
        };

        let mut out = Suggestions {
            unit_id: unit.id.clone(),
            provider: self.name().to_string(),
            ..Default::default()
        };

        let skills: Vec<String> = if unit.skills.is_empty() {
            DEFAULT_SKILLS.iter().take(2).map(|s| s.to_string()).collect()
        } else {
            unit.skills.clone()
        };

        for missing in &report.missing {
            match *missing {
                "objectives" => {
                    out.objectives = skills
                        .iter()
                        .map(|skill| format!("Use {} skills to work with the language of {}", skill, topic))
                        .collect();
                    out.objectives.push(format!("Summarise the key points of {}", topic));
                }
                "skills" => out.skills = skills.clone(),
                "activities" => {
                    out.activities = vec![
                        activity("warm_up", format!("Warm-up on {}", topic), 10),
                        activity("practice", format!("Guided practice: {}", topic), 25),
                        activity("review", "Exit ticket".to_string(), 5),
                    ];
                }
                "difficulty_level" => {
                    out.difficulty_level = DIFFICULTY_LEVELS.first().map(|s| s.to_string());
                    out.notes.push("Set a difficulty level so the unit can be sequenced".into());
                }
                "hours" => out.notes.push("Give the unit a positive number of hours".into()),
                "title" => out.notes.push("Give the unit a descriptive title".into()),
                _ => {}
            }
        }

        // Fill unplanned time with a review activity
        let planned: u64 = unit.activities.iter().map(|a| u64::from(a.duration_minutes)).sum();
        let available = (unit.hours * 60.0).round() as u64;
        if !unit.activities.is_empty() && planned < available {
            let gap = available - planned;
            let minutes = u32::try_from(gap).unwrap_or(u32::MAX);
            out.activities.push(activity("review", format!("Review game on {}", topic), minutes));
            out.notes.push(format!("{} minutes of the unit are not yet planned", gap));
        }

        let nothing_suggested = out.objectives.is_empty()
            && out.skills.is_empty()
            && out.activities.is_empty()
            && out.difficulty_level.is_none()
            && out.notes.is_empty();
        if nothing_suggested {
            out.notes.push("The unit is complete; no suggestions".into());
        }

        Ok(out)
    }
}
