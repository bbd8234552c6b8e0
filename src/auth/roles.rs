//! User roles and the permissions derived from them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role carried in the user row and in access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "owner")]
    Admin,
    AcademicDirector,
    ProgramOwner,
    CurriculumDesigner,
    Teacher,
    Consultant,
    Accountant,
    Qa,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::AcademicDirector => "academic_director",
            Role::ProgramOwner => "program_owner",
            Role::CurriculumDesigner => "curriculum_designer",
            Role::Teacher => "teacher",
            Role::Consultant => "consultant",
            Role::Accountant => "accountant",
            Role::Qa => "qa",
        }
    }

    /// May create and change frameworks, versions, courses and units
    pub fn can_edit_curriculum(&self) -> bool {
        matches!(
            self,
            Role::Admin | Role::AcademicDirector | Role::ProgramOwner | Role::CurriculumDesigner
        )
    }

    /// May record a review decision on a submitted version
    pub fn can_review(&self) -> bool {
        matches!(
            self,
            Role::Admin | Role::AcademicDirector | Role::ProgramOwner | Role::Qa
        )
    }

    pub fn can_publish(&self) -> bool {
        matches!(self, Role::Admin | Role::AcademicDirector | Role::ProgramOwner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" | "owner" => Ok(Role::Admin),
            "academic_director" => Ok(Role::AcademicDirector),
            "program_owner" => Ok(Role::ProgramOwner),
            "curriculum_designer" => Ok(Role::CurriculumDesigner),
            "teacher" => Ok(Role::Teacher),
            "consultant" => Ok(Role::Consultant),
            "accountant" => Ok(Role::Accountant),
            "qa" => Ok(Role::Qa),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_is_admin() {
        assert_eq!("owner".parse::<Role>().unwrap(), Role::Admin);
        let role: Role = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_permissions() {
        assert!(Role::CurriculumDesigner.can_edit_curriculum());
        assert!(!Role::CurriculumDesigner.can_review());
        assert!(!Role::CurriculumDesigner.can_publish());

        assert!(Role::Qa.can_review());
        assert!(!Role::Qa.can_edit_curriculum());

        assert!(!Role::Teacher.can_edit_curriculum());
        assert!(!Role::Accountant.can_review());
        assert!(Role::ProgramOwner.can_publish());
    }
}
