//! Versioned schema for the playlist database.
//!
//! Migrations are applied in order, tracked through `PRAGMA user_version`.

use anyhow::Result;
use rusqlite::Connection;

pub struct Migration {
    pub version: i64,
    pub sql: &'static str,
}

pub const PLAYLIST_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "
    CREATE TABLE playlists (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        prompt TEXT NOT NULL,
        spec TEXT NOT NULL,
        track_list TEXT NOT NULL,
        requested_count INTEGER NOT NULL,
        update_frequency TEXT NOT NULL,
        update_mode TEXT NOT NULL,
        next_run_at INTEGER,
        last_manual_run_at INTEGER,
        excluded_track_ids TEXT NOT NULL DEFAULT '[]',
        excluded_artists TEXT NOT NULL DEFAULT '[]',
        liked TEXT NOT NULL DEFAULT '[]',
        disliked TEXT NOT NULL DEFAULT '[]',
        preferred_hour INTEGER,
        timezone_offset_minutes INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX idx_playlists_owner ON playlists (owner_id);
    CREATE INDEX idx_playlists_next_run ON playlists (next_run_at);

    CREATE TABLE playlist_history (
        playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        signature TEXT NOT NULL,
        PRIMARY KEY (playlist_id, position)
    );
    ",
}];

/// Apply any pending migrations to the connection.
pub fn apply_migrations(conn: &Connection, migrations: &[Migration]) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for migration in migrations {
        if migration.version <= current {
            continue;
        }
        conn.execute_batch(migration.sql)?;
        conn.pragma_update(None, "user_version", migration.version)?;
    }
    Ok(())
}
