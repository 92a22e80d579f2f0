//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use medibook_core::error::MedibookError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), MedibookError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MedibookError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MedibookError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: users, appointments, chat messages.
fn apply_v1(conn: &Connection) -> Result<(), MedibookError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            user_id     TEXT PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            state       TEXT NOT NULL DEFAULT 'idle',
            pending     TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS appointments (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            appointment_id  TEXT UNIQUE,
            user_id         TEXT NOT NULL,
            patient_name    TEXT NOT NULL,
            specialty       TEXT NOT NULL,
            date            TEXT NOT NULL,
            time            TEXT NOT NULL,
            status          TEXT NOT NULL
                            CHECK (status IN ('scheduled', 'confirmed')),
            created_at      INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(user_id)
        );

        -- One appointment per user and slot; also makes confirmation retries idempotent.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_user_slot
            ON appointments (user_id, date, time);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     TEXT NOT NULL,
            role        TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
            content     TEXT NOT NULL,
            timestamp   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_user
            ON chat_messages (user_id, id ASC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| MedibookError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}
