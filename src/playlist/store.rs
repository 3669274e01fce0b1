//! Playlist persistence.
//!
//! The core never touches storage directly, only through [`PlaylistStore`],
//! so tests can inject [`MemoryPlaylistStore`] and the binary wires up
//! [`SqlitePlaylistStore`].

use super::history::HistoryLedger;
use super::models::{Feedback, PlaylistRecord, UpdateFrequency, UpdateMode};
use super::schema::{apply_migrations, PLAYLIST_MIGRATIONS};
use super::signature::TrackSignature;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Trait for playlist storage backends.
pub trait PlaylistStore: Send + Sync {
    /// Playlists whose `next_run_at` is due at or before `now`.
    fn load_due(&self, now: DateTime<Utc>) -> Result<Vec<PlaylistRecord>>;

    /// Get a playlist by id.
    fn get(&self, id: &str) -> Result<Option<PlaylistRecord>>;

    /// Insert or update a playlist record (including ledger and schedule).
    fn save(&self, record: &PlaylistRecord) -> Result<()>;

    /// Delete a playlist. Cascades: ledger, feedback and schedule state go
    /// with the record.
    fn delete(&self, id: &str) -> Result<()>;

    /// All playlists owned by a user.
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<PlaylistRecord>>;
}

// =============================================================================
// SQLite implementation
// =============================================================================

pub struct SqlitePlaylistStore {
    conn: Mutex<Connection>,
}

impl SqlitePlaylistStore {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open playlist db at {:?}", db_path))?;
        apply_migrations(&conn, PLAYLIST_MIGRATIONS)?;
        info!("Opened playlist store at {:?}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn, PLAYLIST_MIGRATIONS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<PartialRecord> {
        Ok(PartialRecord {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            prompt: row.get("prompt")?,
            spec_json: row.get("spec")?,
            track_list_json: row.get("track_list")?,
            requested_count: row.get::<_, i64>("requested_count")? as usize,
            update_frequency: row.get("update_frequency")?,
            update_mode: row.get("update_mode")?,
            next_run_at: row.get("next_run_at")?,
            last_manual_run_at: row.get("last_manual_run_at")?,
            excluded_track_ids_json: row.get("excluded_track_ids")?,
            excluded_artists_json: row.get("excluded_artists")?,
            liked_json: row.get("liked")?,
            disliked_json: row.get("disliked")?,
            preferred_hour: row.get::<_, Option<i64>>("preferred_hour")?.map(|h| h as u32),
            timezone_offset_minutes: row
                .get::<_, Option<i64>>("timezone_offset_minutes")?
                .map(|m| m as i32),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn load_history(conn: &Connection, playlist_id: &str) -> Result<HistoryLedger> {
        let mut stmt = conn.prepare(
            "SELECT signature FROM playlist_history WHERE playlist_id = ?1 ORDER BY position",
        )?;
        let raw: Vec<String> = stmt
            .query_map(params![playlist_id], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        let entries = raw
            .iter()
            .filter_map(|s| TrackSignature::decode(s))
            .collect();
        Ok(HistoryLedger::from_entries(entries))
    }

    fn assemble(conn: &Connection, partial: PartialRecord) -> Result<PlaylistRecord> {
        let history = Self::load_history(conn, &partial.id)?;
        partial.into_record(history)
    }
}

struct PartialRecord {
    id: String,
    owner_id: String,
    name: String,
    description: String,
    prompt: String,
    spec_json: String,
    track_list_json: String,
    requested_count: usize,
    update_frequency: String,
    update_mode: String,
    next_run_at: Option<i64>,
    last_manual_run_at: Option<i64>,
    excluded_track_ids_json: String,
    excluded_artists_json: String,
    liked_json: String,
    disliked_json: String,
    preferred_hour: Option<u32>,
    timezone_offset_minutes: Option<i32>,
    created_at: i64,
    updated_at: i64,
}

impl PartialRecord {
    fn into_record(self, history: HistoryLedger) -> Result<PlaylistRecord> {
        Ok(PlaylistRecord {
            spec: serde_json::from_str(&self.spec_json)?,
            track_list: serde_json::from_str(&self.track_list_json)?,
            update_frequency: parse_frequency(&self.update_frequency)?,
            update_mode: parse_mode(&self.update_mode)?,
            next_run_at: self.next_run_at.map(ts_to_datetime),
            last_manual_run_at: self.last_manual_run_at.map(ts_to_datetime),
            excluded_track_ids: serde_json::from_str(&self.excluded_track_ids_json)?,
            excluded_artists: serde_json::from_str(&self.excluded_artists_json)?,
            feedback: Feedback {
                liked: serde_json::from_str(&self.liked_json)?,
                disliked: serde_json::from_str(&self.disliked_json)?,
            },
            history,
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            prompt: self.prompt,
            requested_count: self.requested_count,
            preferred_hour: self.preferred_hour,
            timezone_offset_minutes: self.timezone_offset_minutes,
            created_at: ts_to_datetime(self.created_at),
            updated_at: ts_to_datetime(self.updated_at),
        })
    }
}

fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

fn parse_frequency(raw: &str) -> Result<UpdateFrequency> {
    match raw {
        "never" => Ok(UpdateFrequency::Never),
        "daily" => Ok(UpdateFrequency::Daily),
        "weekly" => Ok(UpdateFrequency::Weekly),
        "monthly" => Ok(UpdateFrequency::Monthly),
        other => Err(anyhow!("Unknown update frequency: {}", other)),
    }
}

fn parse_mode(raw: &str) -> Result<UpdateMode> {
    match raw {
        "append" => Ok(UpdateMode::Append),
        "replace" => Ok(UpdateMode::Replace),
        other => Err(anyhow!("Unknown update mode: {}", other)),
    }
}

const SELECT_COLUMNS: &str = "id, owner_id, name, description, prompt, spec, track_list, \
     requested_count, update_frequency, update_mode, next_run_at, last_manual_run_at, \
     excluded_track_ids, excluded_artists, liked, disliked, preferred_hour, \
     timezone_offset_minutes, created_at, updated_at";

impl PlaylistStore for SqlitePlaylistStore {
    fn load_due(&self, now: DateTime<Utc>) -> Result<Vec<PlaylistRecord>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM playlists
             WHERE next_run_at IS NOT NULL AND next_run_at <= ?1
             ORDER BY next_run_at",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let partials: Vec<PartialRecord> = stmt
            .query_map(params![now.timestamp()], Self::row_to_record)?
            .collect::<rusqlite::Result<_>>()?;

        partials
            .into_iter()
            .map(|p| Self::assemble(&conn, p))
            .collect()
    }

    fn get(&self, id: &str) -> Result<Option<PlaylistRecord>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {} FROM playlists WHERE id = ?1", SELECT_COLUMNS);
        let partial = conn
            .query_row(&sql, params![id], Self::row_to_record)
            .optional()?;
        partial.map(|p| Self::assemble(&conn, p)).transpose()
    }

    fn save(&self, record: &PlaylistRecord) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO playlists (id, owner_id, name, description, prompt, spec, track_list,
                requested_count, update_frequency, update_mode, next_run_at, last_manual_run_at,
                excluded_track_ids, excluded_artists, liked, disliked, preferred_hour,
                timezone_offset_minutes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                description = excluded.description,
                prompt = excluded.prompt,
                spec = excluded.spec,
                track_list = excluded.track_list,
                requested_count = excluded.requested_count,
                update_frequency = excluded.update_frequency,
                update_mode = excluded.update_mode,
                next_run_at = excluded.next_run_at,
                last_manual_run_at = excluded.last_manual_run_at,
                excluded_track_ids = excluded.excluded_track_ids,
                excluded_artists = excluded.excluded_artists,
                liked = excluded.liked,
                disliked = excluded.disliked,
                preferred_hour = excluded.preferred_hour,
                timezone_offset_minutes = excluded.timezone_offset_minutes,
                updated_at = excluded.updated_at",
            params![
                record.id,
                record.owner_id,
                record.name,
                record.description,
                record.prompt,
                serde_json::to_string(&record.spec)?,
                serde_json::to_string(&record.track_list)?,
                record.requested_count as i64,
                record.update_frequency.to_string(),
                match record.update_mode {
                    UpdateMode::Append => "append",
                    UpdateMode::Replace => "replace",
                },
                record.next_run_at.map(|t| t.timestamp()),
                record.last_manual_run_at.map(|t| t.timestamp()),
                serde_json::to_string(&record.excluded_track_ids)?,
                serde_json::to_string(&record.excluded_artists)?,
                serde_json::to_string(&record.feedback.liked)?,
                serde_json::to_string(&record.feedback.disliked)?,
                record.preferred_hour.map(|h| h as i64),
                record.timezone_offset_minutes.map(|m| m as i64),
                record.created_at.timestamp(),
                record.updated_at.timestamp(),
            ],
        )?;

        // Rewrite the ledger rows wholesale; it is bounded at the cap.
        tx.execute(
            "DELETE FROM playlist_history WHERE playlist_id = ?1",
            params![record.id],
        )?;
        for (position, sig) in record.history.iter().enumerate() {
            tx.execute(
                "INSERT INTO playlist_history (playlist_id, position, signature)
                 VALUES (?1, ?2, ?3)",
                params![record.id, position as i64, sig.encode()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM playlists WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<PlaylistRecord>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM playlists WHERE owner_id = ?1 ORDER BY created_at",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let partials: Vec<PartialRecord> = stmt
            .query_map(params![owner_id], Self::row_to_record)?
            .collect::<rusqlite::Result<_>>()?;

        partials
            .into_iter()
            .map(|p| Self::assemble(&conn, p))
            .collect()
    }
}

// =============================================================================
// In-memory implementation (tests and previews)
// =============================================================================

#[derive(Default)]
pub struct MemoryPlaylistStore {
    records: Mutex<HashMap<String, PlaylistRecord>>,
}

impl MemoryPlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaylistStore for MemoryPlaylistStore {
    fn load_due(&self, now: DateTime<Utc>) -> Result<Vec<PlaylistRecord>> {
        let records = self.records.lock().unwrap();
        let mut due: Vec<PlaylistRecord> = records
            .values()
            .filter(|r| r.next_run_at.map(|t| t <= now).unwrap_or(false))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.next_run_at);
        Ok(due)
    }

    fn get(&self, id: &str) -> Result<Option<PlaylistRecord>> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    fn save(&self, record: &PlaylistRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.records.lock().unwrap().remove(id);
        Ok(())
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<PlaylistRecord>> {
        let records = self.records.lock().unwrap();
        let mut owned: Vec<PlaylistRecord> = records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|r| r.created_at);
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ConstraintSpec;
    use crate::playlist::models::TrackEntry;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn record(id: &str, next_run_at: Option<DateTime<Utc>>) -> PlaylistRecord {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        PlaylistRecord {
            id: id.into(),
            owner_id: "alice".into(),
            name: format!("Playlist {}", id),
            description: "desc".into(),
            track_list: vec![TrackEntry {
                track_id: "t1".into(),
                title: "Song".into(),
                artist: "Artist".into(),
                signature: TrackSignature::new("Artist", "Song"),
            }],
            prompt: "some prompt".into(),
            spec: ConstraintSpec::default(),
            requested_count: 20,
            update_frequency: UpdateFrequency::Daily,
            update_mode: UpdateMode::Replace,
            next_run_at,
            last_manual_run_at: None,
            history: HistoryLedger::new(),
            excluded_track_ids: HashSet::new(),
            excluded_artists: HashSet::new(),
            feedback: Feedback::default(),
            preferred_hour: Some(8),
            timezone_offset_minutes: Some(-300),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_sqlite_roundtrip() {
        let store = SqlitePlaylistStore::in_memory().unwrap();
        let mut original = record("p1", Some(Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap()));
        original
            .history
            .record(&[TrackSignature::new("Artist", "Old Song")]);

        store.save(&original).unwrap();
        let loaded = store.get("p1").unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_due_filters_by_time() {
        let store = SqlitePlaylistStore::in_memory().unwrap();
        let due_at = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();
        store.save(&record("due", Some(due_at))).unwrap();
        store
            .save(&record(
                "later",
                Some(Utc.with_ymd_and_hms(2025, 3, 9, 8, 0, 0).unwrap()),
            ))
            .unwrap();
        store.save(&record("manual", None)).unwrap();

        let due = store
            .load_due(Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap())
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "due");
    }

    #[test]
    fn test_delete_cascades_history() {
        let store = SqlitePlaylistStore::in_memory().unwrap();
        let mut rec = record("p1", None);
        rec.history.record(&[TrackSignature::new("a", "b")]);
        store.save(&rec).unwrap();

        store.delete("p1").unwrap();
        assert!(store.get("p1").unwrap().is_none());

        let conn = store.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM playlist_history", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_save_is_upsert() {
        let store = SqlitePlaylistStore::in_memory().unwrap();
        let mut rec = record("p1", None);
        store.save(&rec).unwrap();

        rec.name = "Renamed".into();
        store.save(&rec).unwrap();

        let loaded = store.get("p1").unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(store.list_by_owner("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_memory_store_due_ordering() {
        let store = MemoryPlaylistStore::new();
        let t1 = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
        store.save(&record("b", Some(t2))).unwrap();
        store.save(&record("a", Some(t1))).unwrap();

        let due = store.load_due(t2).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, "a");
    }
}
