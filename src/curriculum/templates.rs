//! Built-in unit templates

use serde::Serialize;

use super::Activity;

/// A starting point for a new unit
#[derive(Debug, Clone, Serialize)]
pub struct UnitTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub objectives: Vec<String>,
    pub skills: Vec<String>,
    pub activities: Vec<Activity>,
    pub hours: f64,
    pub difficulty_level: Option<&'static str>,
}

fn activity(kind: &str, title: &str, minutes: u32) -> Activity {
    Activity {
        activity_type: kind.to_string(),
        title: title.to_string(),
        duration_minutes: minutes,
        description: None,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// All templates, in display order
pub fn all() -> Vec<UnitTemplate> {
    vec![
        UnitTemplate {
            id: "standard-lesson",
            name: "Standard lesson",
            description: "Warm-up, presentation, guided practice and wrap-up",
            objectives: strings(&["Understand the target language of the lesson"]),
            skills: strings(&["listening", "speaking"]),
            activities: vec![
                activity("warm_up", "Warm-up", 10),
                activity("presentation", "Presentation", 20),
                activity("practice", "Guided practice", 25),
                activity("wrap_up", "Wrap-up", 5),
            ],
            hours: 1.0,
            difficulty_level: None,
        },
        UnitTemplate {
            id: "project-based",
            name: "Project-based unit",
            description: "Learners plan, build and present a small project",
            objectives: strings(&["Apply the unit's language in a real task"]),
            skills: strings(&["speaking", "writing", "collaboration"]),
            activities: vec![
                activity("briefing", "Project briefing", 15),
                activity("group_work", "Group work", 60),
                activity("presentation", "Project presentation", 30),
            ],
            hours: 2.0,
            difficulty_level: None,
        },
        UnitTemplate {
            id: "review-and-assessment",
            name: "Review and assessment",
            description: "Consolidate previous units and check progress",
            objectives: strings(&["Review previous units", "Assess learner progress"]),
            skills: strings(&["reading", "listening", "writing", "speaking"]),
            activities: vec![
                activity("review", "Review game", 20),
                activity("assessment", "Progress test", 40),
            ],
            hours: 1.0,
            difficulty_level: None,
        },
    ]
}

pub fn find(id: &str) -> Option<UnitTemplate> {
    all().into_iter().find(|t| t.id == id)
}
