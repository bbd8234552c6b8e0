//! Version approval workflow
//!
//! A version moves `draft → submitted → approved → published`; `archived`
//! is reachable from every other state and is terminal. A reviewer who does
//! not approve sends the version back to `draft`. `transition` is the only
//! place that decides whether an action is allowed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    Draft,
    Submitted,
    Approved,
    Published,
    Archived,
}

impl VersionState {
    pub const ALL: [VersionState; 5] = [
        VersionState::Draft,
        VersionState::Submitted,
        VersionState::Approved,
        VersionState::Published,
        VersionState::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionState::Draft => "draft",
            VersionState::Submitted => "submitted",
            VersionState::Approved => "approved",
            VersionState::Published => "published",
            VersionState::Archived => "archived",
        }
    }

    /// Courses and units can only change while the version is a draft
    pub fn is_editable(&self) -> bool {
        matches!(self, VersionState::Draft)
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(VersionState::Draft),
            "submitted" => Ok(VersionState::Submitted),
            "approved" => Ok(VersionState::Approved),
            "published" => Ok(VersionState::Published),
            "archived" => Ok(VersionState::Archived),
            other => Err(format!("Unknown version state: {}", other)),
        }
    }
}

/// Reviewer verdict carried by the approve action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    ChangesRequested,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
            ReviewDecision::ChangesRequested => "changes_requested",
        }
    }
}

/// Workflow action requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionAction {
    Submit,
    Review(ReviewDecision),
    Publish,
    Archive,
}

impl VersionAction {
    pub fn name(&self) -> &'static str {
        match self {
            VersionAction::Submit => "submit",
            VersionAction::Review(_) => "approve",
            VersionAction::Publish => "publish",
            VersionAction::Archive => "archive",
        }
    }
}

/// Rejected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: VersionState,
    pub action: VersionAction,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot {} a version in state '{}'", self.action.name(), self.from)
    }
}

impl From<InvalidTransition> for crate::error::ApiError {
    fn from(err: InvalidTransition) -> Self {
        crate::error::ApiError::InvalidTransition {
            state: err.from.to_string(),
            action: err.action.name().to_string(),
        }
    }
}

/// Apply `action` to `from`, returning the resulting state
pub fn transition(from: VersionState, action: VersionAction) -> Result<VersionState, InvalidTransition> {
    use VersionAction::*;
    use VersionState::*;

    let to = match (from, action) {
        (Draft, Submit) => Submitted,
        (Submitted, Review(ReviewDecision::Approved)) => Approved,
        (Submitted, Review(ReviewDecision::Rejected | ReviewDecision::ChangesRequested)) => Draft,
        (Approved, Publish) => Published,
        (Draft | Submitted | Approved | Published, Archive) => Archived,
        _ => return Err(InvalidTransition { from, action }),
    };

    Ok(to)
}
