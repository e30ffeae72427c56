// 🗄️ SQLite store for the API server
//
// Free functions over a borrowed rusqlite Connection, one submodule per
// resource. Conventions shared by every table:
// - timestamps are RFC 3339 text, dates are YYYY-MM-DD text
// - rows are soft-deleted (active = 0) and disappear from every read
// - every mutation appends an event to the audit trail

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod catalog;
pub mod movements;
pub mod persons;
pub mod users;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Input rejected by a store rule (HTTP 422)
    #[error("{0}")]
    Invalid(String),

    /// Clashes with existing data (HTTP 409)
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }
}

// ============================================================================
// SETUP
// ============================================================================

/// Open (or create) the database file and bring the schema up
pub fn open(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    // WAL for crash recovery; in-memory databases silently keep "memory"
    conn.pragma_update(None, "journal_mode", "WAL")?;
    setup_database(&conn)?;
    Ok(conn)
}

/// In-memory database with schema and seeds (tests, demos)
pub fn open_in_memory() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> StoreResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "
        -- ======================================================================
        -- Persons and their nested records
        -- ======================================================================
        CREATE TABLE IF NOT EXISTS persons (
            person_id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT NOT NULL,
            fantasy_name TEXT,
            birth_date TEXT,
            person_type TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS person_documents (
            person_document_id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES persons(person_id),
            document_type TEXT NOT NULL,
            document_value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS person_contacts (
            contact_id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES persons(person_id),
            contact_type TEXT NOT NULL,
            contact_value TEXT NOT NULL,
            contact_name TEXT
        );

        CREATE TABLE IF NOT EXISTS person_addresses (
            address_id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES persons(person_id),
            street TEXT NOT NULL,
            number TEXT NOT NULL,
            complement TEXT,
            neighborhood TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            country TEXT,
            reference TEXT,
            ibge INTEGER
        );

        -- ======================================================================
        -- Movement catalog
        -- ======================================================================
        CREATE TABLE IF NOT EXISTS movement_types (
            movement_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
            type_name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS movement_statuses (
            movement_status_id INTEGER PRIMARY KEY AUTOINCREMENT,
            status_name TEXT NOT NULL,
            description TEXT,
            display_order INTEGER NOT NULL DEFAULT 0,
            movement_type_id INTEGER REFERENCES movement_types(movement_type_id),
            is_final INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        );

        -- ======================================================================
        -- Movements
        -- ======================================================================
        CREATE TABLE IF NOT EXISTS movements (
            movement_id INTEGER PRIMARY KEY AUTOINCREMENT,
            movement_date TEXT NOT NULL,
            person_id INTEGER NOT NULL REFERENCES persons(person_id),
            total_amount REAL NOT NULL,
            discount REAL NOT NULL DEFAULT 0,
            addition REAL NOT NULL DEFAULT 0,
            total_items REAL NOT NULL DEFAULT 0,
            description TEXT,
            movement_type_id INTEGER NOT NULL REFERENCES movement_types(movement_type_id),
            movement_status_id INTEGER NOT NULL REFERENCES movement_statuses(movement_status_id),
            license_id INTEGER,
            is_template INTEGER NOT NULL DEFAULT 0,
            cancel_reason TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        -- ======================================================================
        -- Users and refresh tokens
        -- ======================================================================
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES persons(person_id),
            profile_id INTEGER,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            last_login TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS refresh_tokens (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(user_id),
            expires_at TEXT NOT NULL
        );

        -- ======================================================================
        -- Audit trail
        -- ======================================================================
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        );

        -- ======================================================================
        -- Indexes
        -- ======================================================================
        CREATE INDEX IF NOT EXISTS idx_documents_person ON person_documents(person_id);
        CREATE INDEX IF NOT EXISTS idx_documents_value ON person_documents(document_type, document_value);
        CREATE INDEX IF NOT EXISTS idx_contacts_person ON person_contacts(person_id);
        CREATE INDEX IF NOT EXISTS idx_addresses_person ON person_addresses(person_id);
        CREATE INDEX IF NOT EXISTS idx_movements_date ON movements(movement_date);
        CREATE INDEX IF NOT EXISTS idx_movements_person ON movements(person_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
        ",
    )?;

    catalog::seed_defaults(conn)?;

    Ok(())
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// One recorded change ("created", "updated", "deleted", "cancelled")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: i64,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Event {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn insert_event(conn: &Connection, event: &Event) -> StoreResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, entity_type, entity_id, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Shorthand used by the mutation functions
pub(crate) fn record(
    conn: &Connection,
    event_type: &str,
    entity_type: &str,
    entity_id: i64,
    data: serde_json::Value,
    actor: &str,
) -> StoreResult<()> {
    insert_event(conn, &Event::new(event_type, entity_type, entity_id, data, actor))
}

/// Events of one entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: i64,
) -> StoreResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id.to_string()], |row| {
            let data_json: String = row.get(5)?;
            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// HEALTH PROBE
// ============================================================================

/// SQLite library version, used by the health endpoints
pub fn sqlite_version(conn: &Connection) -> StoreResult<String> {
    Ok(conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?)
}

// ============================================================================
// ROW HELPERS
// ============================================================================

pub(crate) fn now_text() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn parse_optional_timestamp(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| {
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            })
    })
    .transpose()
}

pub(crate) fn parse_date(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_optional_date(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| {
        NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

pub(crate) fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `%term%` for LIKE, with LIKE wildcards in the term escaped (ESCAPE '\')
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        // Seeds are not duplicated by a second setup
        let types: i64 = conn
            .query_row("SELECT COUNT(*) FROM movement_types", [], |row| row.get(0))
            .unwrap();
        assert_eq!(types, 2);
    }

    #[test]
    fn test_events_round_trip() {
        let conn = open_in_memory().unwrap();

        record(&conn, "created", "person", 1, json!({ "full_name": "Ana" }), "admin").unwrap();
        record(&conn, "updated", "person", 1, json!({ "full_name": "Ana B" }), "admin").unwrap();
        record(&conn, "created", "person", 2, json!({}), "admin").unwrap();

        let events = get_events_for_entity(&conn, "person", 1).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "updated");
        assert_eq!(events[1].data["full_name"], "Ana");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ana"), "%ana%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_sqlite_version() {
        let conn = open_in_memory().unwrap();
        assert!(sqlite_version(&conn).unwrap().starts_with('3'));
    }
}
