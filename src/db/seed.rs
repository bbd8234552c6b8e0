//! Demo data for local development and the end-to-end tests
//!
//! Every step checks for its row before inserting, so seeding is safe to
//! run on every startup.

use tracing::info;

use super::games::{self, CreateGame};
use super::users::{self, NewUser};
use super::Database;
use crate::auth::password::hash_password;
use crate::auth::roles::Role;
use crate::error::ApiError;

pub const DEMO_TENANT_SLUG: &str = "demo";
pub const DEMO_PASSWORD: &str = "password123";

const DEMO_CAMPUS: &str = "Main campus";

const DEMO_USERS: &[(&str, &str, Role)] = &[
    ("test@example.com", "Demo Admin", Role::Admin),
    ("director@example.com", "Academic Director", Role::AcademicDirector),
    ("designer@example.com", "Curriculum Designer", Role::CurriculumDesigner),
    ("qa@example.com", "QA Reviewer", Role::Qa),
    ("teacher@example.com", "Demo Teacher", Role::Teacher),
];

const DEMO_GAMES: &[(&str, &str, &str, &str, i64)] = &[
    ("Vocabulary Bingo", "vocabulary", "beginner", "reading", 15),
    ("Picture Charades", "speaking", "beginner", "speaking", 10),
    ("Listening Relay", "listening", "elementary", "listening", 20),
    ("Sentence Builder", "grammar", "intermediate", "writing", 15),
    ("Debate Cards", "speaking", "upper_intermediate", "speaking", 25),
];

/// What a seeding run actually inserted
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub tenant_created: bool,
    pub users_created: usize,
    pub games_created: usize,
}

/// Ensure the demo tenant, campus, users and games exist
pub fn seed_demo_data(db: &Database) -> Result<SeedReport, ApiError> {
    let mut report = SeedReport::default();

    let (tenant_id, campus_id) = db.with_conn(|conn| {
        let tenant_id = match users::tenant_exists(conn, DEMO_TENANT_SLUG)? {
            Some(id) => id,
            None => {
                let id = super::new_id();
                users::insert_tenant(conn, &id, "Demo Language School", DEMO_TENANT_SLUG)?;
                report.tenant_created = true;
                id
            }
        };
        let campus_id = match users::campus_by_name(conn, &tenant_id, DEMO_CAMPUS)? {
            Some(id) => id,
            None => {
                let id = super::new_id();
                users::insert_campus(conn, &id, &tenant_id, DEMO_CAMPUS)?;
                id
            }
        };
        Ok((tenant_id, campus_id))
    })?;

    for (email, full_name, role) in DEMO_USERS {
        // Emails are unique across deleted rows too
        if db.with_conn(|conn| users::email_taken(conn, email))? {
            continue;
        }
        // Hash outside the connection lock
        let password_hash = hash_password(DEMO_PASSWORD)?;
        db.with_conn(|conn| {
            users::insert_user(
                conn,
                &NewUser {
                    tenant_id: &tenant_id,
                    campus_id: Some(&campus_id),
                    email,
                    password_hash: &password_hash,
                    full_name,
                    role: *role,
                },
            )
        })?;
        report.users_created += 1;
    }

    report.games_created = db.with_conn(|conn| {
        let mut created = 0;
        for (title, kind, level, skill, minutes) in DEMO_GAMES {
            if games::title_exists(conn, &tenant_id, title)? {
                continue;
            }
            games::create(
                conn,
                &tenant_id,
                &CreateGame {
                    title: title.to_string(),
                    game_type: kind.to_string(),
                    level: Some(level.to_string()),
                    skill: Some(skill.to_string()),
                    duration_minutes: *minutes,
                    tags: vec![kind.to_string(), skill.to_string()],
                    description: None,
                },
            )?;
            created += 1;
        }
        Ok(created)
    })?;

    if report.tenant_created || report.users_created > 0 || report.games_created > 0 {
        info!(
            tenant = DEMO_TENANT_SLUG,
            users = report.users_created,
            games = report.games_created,
            "Seeded demo data"
        );
    }

    Ok(report)
}
