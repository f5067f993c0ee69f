//! SQL DDL and the ordered migration list for the todo store.
//!
//! The schema version lives in `PRAGMA user_version`. A database written by an
//! older build reports version 0; every migration is written so it is a no-op
//! when its target shape is already present.

/// Owner assigned to todos that predate per-user ownership.
pub const LEGACY_OWNER_ID: i64 = 1;

pub const USERS_TABLE: &str = "users";
pub const TODOS_TABLE: &str = "todos";

/// Tables owned by the store, in dependency order.
pub const APP_TABLES: [&str; 2] = [USERS_TABLE, TODOS_TABLE];

pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    createdAt DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

/// Fresh installs: the owner must always be supplied.
pub const CREATE_TODOS: &str = r#"
CREATE TABLE todos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    userId INTEGER NOT NULL,
    title TEXT NOT NULL,
    completed INTEGER DEFAULT 0,
    createdAt DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (userId) REFERENCES users (id)
)
"#;

/// Migrated installs keep a default owner for rows written by older clients.
pub const CREATE_TODOS_WITH_LEGACY_OWNER: &str = r#"
CREATE TABLE todos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    userId INTEGER NOT NULL DEFAULT 1,
    title TEXT NOT NULL,
    completed INTEGER DEFAULT 0,
    createdAt DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (userId) REFERENCES users (id)
)
"#;

pub const RENAME_LEGACY_TODOS: &str = "ALTER TABLE todos RENAME TO todos_old";
pub const DROP_LEGACY_TODOS: &str = "DROP TABLE todos_old";

pub const DROP_TODOS: &str = "DROP TABLE IF EXISTS todos";
pub const DROP_USERS: &str = "DROP TABLE IF EXISTS users";

/// Row copy out of `todos_old`. Columns the legacy table lacks fall back to
/// the defaults a fresh insert would get.
pub fn copy_legacy_todos(has_completed: bool, has_created_at: bool) -> String {
    let completed = if has_completed { "completed" } else { "0" };
    let created_at = if has_created_at {
        "createdAt"
    } else {
        "CURRENT_TIMESTAMP"
    };
    format!(
        "INSERT INTO todos (id, userId, title, completed, createdAt) \
         SELECT id, {LEGACY_OWNER_ID}, title, {completed}, {created_at} FROM todos_old"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// Plain statements, each idempotent on its own.
    Statements(&'static [&'static str]),
    /// Introspects `todos` and creates it, rebuilds it with `userId`, or leaves it alone.
    TodosOwner,
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub step: MigrationStep,
}

/// Applied in order; a database at version `n` runs every entry with `version > n`.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        step: MigrationStep::Statements(&[CREATE_USERS]),
    },
    Migration {
        version: 2,
        name: "todos_owner",
        step: MigrationStep::TodosOwner,
    },
];

/// Version a fully migrated database reports.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
