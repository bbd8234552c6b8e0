//! Schema migrations
//!
//! Migrations are named, ordered and checksummed. Each one is applied at
//! most once, inside its own transaction, and recorded in
//! `schema_migrations`. A recorded checksum that no longer matches the
//! embedded SQL aborts startup: an applied migration must never change.

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::ApiError;

/// A single schema step
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// All migrations, in application order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "identity",
        sql: IDENTITY_SCHEMA,
    },
    Migration {
        version: 2,
        name: "curriculum",
        sql: CURRICULUM_SCHEMA,
    },
    Migration {
        version: 3,
        name: "attachments",
        sql: ATTACHMENTS_SCHEMA,
    },
    Migration {
        version: 4,
        name: "games",
        sql: GAMES_SCHEMA,
    },
];

/// Outcome of a migration run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub already_applied: usize,
}

/// Apply every pending migration
pub fn run(conn: &mut Connection) -> Result<MigrationReport, ApiError> {
    run_migrations(conn, MIGRATIONS)
}

pub(crate) fn run_migrations(
    conn: &mut Connection,
    migrations: &[Migration],
) -> Result<MigrationReport, ApiError> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            checksum TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
        [],
    )?;

    let mut report = MigrationReport::default();

    for migration in migrations {
        let recorded: Option<String> = conn
            .query_row(
                "SELECT checksum FROM schema_migrations WHERE version = ?",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        let checksum = migration.checksum();

        match recorded {
            Some(existing) if existing == checksum => {
                debug!(version = migration.version, name = migration.name, "Migration already applied");
                report.already_applied += 1;
            }
            Some(existing) => {
                return Err(ApiError::Config(format!(
                    "Migration {} ({}) was modified after being applied: recorded checksum {}, current {}",
                    migration.version, migration.name, existing, checksum
                )));
            }
            None => {
                let tx = conn.transaction()?;
                tx.execute_batch(migration.sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (version, name, checksum, applied_at) VALUES (?, ?, ?, ?)",
                    params![migration.version, migration.name, checksum, super::now()],
                )?;
                tx.commit()?;

                info!(version = migration.version, name = migration.name, "Applied migration");
                report.applied.push(migration.name.to_string());
            }
        }
    }

    Ok(report)
}

const IDENTITY_SCHEMA: &str = r#"
CREATE TABLE tenants (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE campuses (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL REFERENCES tenants(id),
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE users (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL REFERENCES tenants(id),
    campus_id TEXT REFERENCES campuses(id),
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Revoked token ids; rows may be pruned once expires_at has passed
CREATE TABLE revoked_tokens (
    jti TEXT PRIMARY KEY NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX idx_users_tenant ON users(tenant_id);
"#;

const CURRICULUM_SCHEMA: &str = r#"
CREATE TABLE curriculum_frameworks (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL REFERENCES tenants(id),
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    language TEXT,
    target_level TEXT,
    age_group TEXT,
    total_hours REAL NOT NULL DEFAULT 0,
    total_sessions INTEGER NOT NULL DEFAULT 0,
    session_duration_hours REAL NOT NULL DEFAULT 0,
    learning_method TEXT,
    learning_format TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    owner_user_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Codes are unique among live frameworks; a deleted code may be reused
CREATE UNIQUE INDEX idx_frameworks_tenant_code
    ON curriculum_frameworks(tenant_id, code) WHERE deleted_at IS NULL;

CREATE TABLE versions (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    framework_id TEXT NOT NULL REFERENCES curriculum_frameworks(id),
    version_no TEXT NOT NULL,
    changelog TEXT,
    state TEXT NOT NULL DEFAULT 'draft',
    rollout_notes TEXT,
    submitted_at TEXT,
    approved_at TEXT,
    published_at TEXT,
    archived_at TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (framework_id, version_no)
);

CREATE TABLE courses (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    version_id TEXT NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    hours REAL NOT NULL DEFAULT 0,
    summary TEXT,
    order_index INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE units (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    objectives_json TEXT NOT NULL DEFAULT '[]',
    skills_json TEXT NOT NULL DEFAULT '[]',
    activities_json TEXT NOT NULL DEFAULT '[]',
    hours REAL NOT NULL DEFAULT 0,
    difficulty_level TEXT,
    order_index INTEGER NOT NULL,
    completeness_score INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_versions_framework ON versions(framework_id);
CREATE INDEX idx_courses_version_order ON courses(version_id, order_index);
CREATE INDEX idx_units_course_order ON units(course_id, order_index);
"#;

const ATTACHMENTS_SCHEMA: &str = r#"
CREATE TABLE resources (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    title TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    url TEXT,
    description TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE approvals (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    version_id TEXT NOT NULL,
    action TEXT NOT NULL,
    decision TEXT,
    comments TEXT,
    from_state TEXT NOT NULL,
    to_state TEXT NOT NULL,
    actor_user_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE comments (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    parent_id TEXT REFERENCES comments(id),
    body TEXT NOT NULL,
    author_user_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE mappings (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    framework_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    standard TEXT NOT NULL,
    external_code TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_resources_entity ON resources(entity_type, entity_id);
CREATE INDEX idx_approvals_version ON approvals(version_id);
CREATE INDEX idx_comments_entity ON comments(entity_type, entity_id);
CREATE INDEX idx_mappings_framework ON mappings(framework_id);
"#;

const GAMES_SCHEMA: &str = r#"
CREATE TABLE games (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    title TEXT NOT NULL,
    game_type TEXT NOT NULL,
    level TEXT,
    skill TEXT,
    duration_minutes INTEGER NOT NULL DEFAULT 0,
    tags_json TEXT NOT NULL DEFAULT '[]',
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE assignments (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    game_id TEXT NOT NULL REFERENCES games(id),
    unit_id TEXT,
    title TEXT NOT NULL,
    due_at TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX idx_games_tenant ON games(tenant_id);
CREATE INDEX idx_assignments_tenant ON assignments(tenant_id);
"#;
