use rusqlite::Connection;
use tracing::info;

use crate::error::DomainError;

pub fn run(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            fullname    TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            role        TEXT NOT NULL DEFAULT 'user',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS events (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            title             TEXT NOT NULL,
            description       TEXT NOT NULL,
            event_date        TEXT NOT NULL,
            event_time        TEXT NOT NULL,
            location          TEXT NOT NULL,
            quota             INTEGER NOT NULL CHECK (quota >= 1),
            fee               REAL NOT NULL CHECK (fee >= 0),
            status            TEXT NOT NULL DEFAULT 'open',
            registered_count  INTEGER NOT NULL DEFAULT 0,
            created_by        INTEGER NOT NULL REFERENCES users(id),
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_events_status
            ON events(status, event_date);

        CREATE TABLE IF NOT EXISTS registrations (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id           INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            user_id            INTEGER NOT NULL REFERENCES users(id),
            status             TEXT NOT NULL DEFAULT 'pending',
            notes              TEXT NOT NULL DEFAULT '',
            registration_date  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_registrations_event
            ON registrations(event_id, status);

        CREATE INDEX IF NOT EXISTS idx_registrations_user
            ON registrations(user_id, status);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
