//! Database schema migrations for dayplan.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    migrate_to(conn, CURRENT_VERSION)
}

/// Apply pending migrations up to and including `target`.
///
/// Opening a database at an older version leaves later migrations for an
/// explicit upgrade, which is how legacy schemas are reproduced in tests.
pub fn migrate_to(conn: &Connection, target: i32) -> SqliteResult<()> {
    // Ensure schema_version table exists
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn);

    // Apply migrations sequentially
    if current_version < 1 && target >= 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 && target >= 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!("failed to read schema_version: {e}");
        }
        0
    })
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: baseline schema.
///
/// Instances may only reference projects at this version; the named
/// `schedule_instance_source_type` check rejects anything else.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS windows (
            id               TEXT PRIMARY KEY,
            label            TEXT NOT NULL DEFAULT '',
            energy           TEXT,
            start_local      TEXT NOT NULL,
            end_local        TEXT NOT NULL,
            days             TEXT,
            location_context TEXT
        );

        CREATE TABLE IF NOT EXISTS projects (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            priority         TEXT NOT NULL DEFAULT '',
            stage            TEXT NOT NULL DEFAULT '',
            energy           TEXT,
            duration_minutes INTEGER,
            goal_id          TEXT
        );

        CREATE TABLE IF NOT EXISTS project_skills (
            project_id TEXT NOT NULL,
            skill_id   TEXT NOT NULL,
            PRIMARY KEY (project_id, skill_id)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            priority         TEXT NOT NULL DEFAULT '',
            stage            TEXT NOT NULL DEFAULT '',
            duration_minutes INTEGER,
            energy           TEXT,
            project_id       TEXT,
            skill_id         TEXT
        );

        CREATE TABLE IF NOT EXISTS habits (
            id                     TEXT PRIMARY KEY,
            name                   TEXT NOT NULL,
            duration_minutes       INTEGER,
            habit_type             TEXT NOT NULL DEFAULT 'HABIT',
            recurrence             TEXT,
            recurrence_days        TEXT,
            energy                 TEXT,
            window_id              TEXT,
            skill_id               TEXT,
            goal_id                TEXT,
            location_context       TEXT,
            daylight_preference    TEXT,
            window_edge_preference TEXT,
            last_completed_at      TEXT,
            created_at             TEXT,
            updated_at             TEXT
        );

        CREATE TABLE IF NOT EXISTS skills (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL DEFAULT '',
            monument_id TEXT
        );

        CREATE TABLE IF NOT EXISTS schedule_instances (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            source_type      TEXT NOT NULL
                CONSTRAINT schedule_instance_source_type CHECK (source_type IN ('PROJECT')),
            source_id        TEXT NOT NULL,
            window_id        TEXT,
            start_utc        TEXT NOT NULL,
            end_utc          TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            status           TEXT NOT NULL DEFAULT 'scheduled',
            weight_snapshot  REAL,
            energy_resolved  TEXT,
            completed_at     TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_instances_user_start
            ON schedule_instances(user_id, start_utc);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: accept HABIT instances.
///
/// SQLite cannot alter a check constraint in place, so the table is
/// rebuilt and its rows copied across.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE schedule_instances_v2 (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            source_type      TEXT NOT NULL
                CONSTRAINT schedule_instance_source_type CHECK (source_type IN ('PROJECT', 'HABIT')),
            source_id        TEXT NOT NULL,
            window_id        TEXT,
            start_utc        TEXT NOT NULL,
            end_utc          TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            status           TEXT NOT NULL DEFAULT 'scheduled',
            weight_snapshot  REAL,
            energy_resolved  TEXT,
            completed_at     TEXT
        );

        INSERT INTO schedule_instances_v2
            SELECT id, user_id, source_type, source_id, window_id, start_utc, end_utc,
                   duration_minutes, status, weight_snapshot, energy_resolved, completed_at
            FROM schedule_instances;

        DROP TABLE schedule_instances;
        ALTER TABLE schedule_instances_v2 RENAME TO schedule_instances;

        CREATE INDEX IF NOT EXISTS idx_instances_user_start
            ON schedule_instances(user_id, start_utc);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}
