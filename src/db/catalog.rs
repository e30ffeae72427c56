// Movement types and movement statuses

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

use super::{record, StoreError, StoreResult};
use crate::entities::{
    MovementStatus, MovementStatusInput, MovementType, MovementTypeCount, MovementTypeInput,
};

/// Name of the final status that cancellation moves a movement to
pub const CANCELLED_STATUS: &str = "Cancelled";

/// Seed the default catalog into an empty database
pub fn seed_defaults(conn: &Connection) -> StoreResult<()> {
    let types: i64 = conn.query_row("SELECT COUNT(*) FROM movement_types", [], |row| row.get(0))?;
    if types == 0 {
        for name in ["Sale", "Purchase"] {
            conn.execute("INSERT INTO movement_types (type_name) VALUES (?1)", params![name])?;
        }
    }

    let statuses: i64 =
        conn.query_row("SELECT COUNT(*) FROM movement_statuses", [], |row| row.get(0))?;
    if statuses == 0 {
        let defaults = [
            ("Pending", "Awaiting confirmation", 1, false),
            ("Confirmed", "Confirmed and settled", 2, false),
            (CANCELLED_STATUS, "Cancelled, no longer counts", 3, true),
        ];
        for (name, description, order, is_final) in defaults {
            conn.execute(
                "INSERT INTO movement_statuses (status_name, description, display_order, is_final)
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, description, order, is_final],
            )?;
        }
    }

    Ok(())
}

// ============================================================================
// MOVEMENT TYPES
// ============================================================================

const TYPE_COLUMNS: &str = "t.movement_type_id, t.type_name, t.active,
    (SELECT COUNT(*) FROM movements m WHERE m.movement_type_id = t.movement_type_id AND m.active = 1),
    (SELECT COUNT(*) FROM movement_statuses s WHERE s.movement_type_id = t.movement_type_id AND s.active = 1)";

fn type_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MovementType> {
    let movements: i64 = row.get(3)?;
    let movement_statuses: i64 = row.get(4)?;
    Ok(MovementType {
        movement_type_id: row.get(0)?,
        type_name: row.get(1)?,
        active: row.get(2)?,
        count: MovementTypeCount {
            movements: movements as u64,
            movement_statuses: movement_statuses as u64,
        },
    })
}

pub fn list_types(conn: &Connection) -> StoreResult<Vec<MovementType>> {
    let sql = format!(
        "SELECT {} FROM movement_types t WHERE t.active = 1 ORDER BY t.type_name",
        TYPE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let types = stmt
        .query_map([], type_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(types)
}

pub fn get_type(conn: &Connection, type_id: i64) -> StoreResult<MovementType> {
    let sql = format!(
        "SELECT {} FROM movement_types t WHERE t.movement_type_id = ?1 AND t.active = 1",
        TYPE_COLUMNS
    );
    conn.query_row(&sql, params![type_id], type_from_row)
        .optional()?
        .ok_or(StoreError::not_found("movement type", type_id))
}

fn checked_type_name(input: &MovementTypeInput) -> StoreResult<String> {
    let name = input.type_name.trim();
    if name.is_empty() {
        return Err(StoreError::Invalid("type_name is required".to_string()));
    }
    Ok(name.to_string())
}

fn ensure_unique_type_name(conn: &Connection, name: &str, except: Option<i64>) -> StoreResult<()> {
    let clash: Option<i64> = conn
        .query_row(
            "SELECT movement_type_id FROM movement_types
             WHERE active = 1 AND lower(type_name) = lower(?1) AND movement_type_id != ?2",
            params![name, except.unwrap_or(0)],
            |row| row.get(0),
        )
        .optional()?;
    match clash {
        Some(_) => Err(StoreError::Conflict(format!("movement type '{}' already exists", name))),
        None => Ok(()),
    }
}

pub fn create_type(conn: &Connection, input: &MovementTypeInput, actor: &str) -> StoreResult<MovementType> {
    let name = checked_type_name(input)?;
    ensure_unique_type_name(conn, &name, None)?;

    conn.execute("INSERT INTO movement_types (type_name) VALUES (?1)", params![name])?;
    let type_id = conn.last_insert_rowid();
    record(conn, "created", "movement_type", type_id, json!({ "type_name": name }), actor)?;

    get_type(conn, type_id)
}

pub fn update_type(
    conn: &Connection,
    type_id: i64,
    input: &MovementTypeInput,
    actor: &str,
) -> StoreResult<MovementType> {
    get_type(conn, type_id)?;
    let name = checked_type_name(input)?;
    ensure_unique_type_name(conn, &name, Some(type_id))?;

    conn.execute(
        "UPDATE movement_types SET type_name = ?1 WHERE movement_type_id = ?2",
        params![name, type_id],
    )?;
    record(conn, "updated", "movement_type", type_id, json!({ "type_name": name }), actor)?;

    get_type(conn, type_id)
}

/// Soft delete; refused while active movements use the type
pub fn delete_type(conn: &Connection, type_id: i64, actor: &str) -> StoreResult<()> {
    let kind = get_type(conn, type_id)?;
    if kind.is_in_use() {
        return Err(StoreError::Conflict(format!(
            "movement type '{}' is used by {} movement(s)",
            kind.type_name, kind.count.movements
        )));
    }

    conn.execute(
        "UPDATE movement_types SET active = 0 WHERE movement_type_id = ?1",
        params![type_id],
    )?;
    record(conn, "deleted", "movement_type", type_id, json!({}), actor)?;
    Ok(())
}

// ============================================================================
// MOVEMENT STATUSES
// ============================================================================

const STATUS_COLUMNS: &str = "movement_status_id, status_name, description, display_order,
    movement_type_id, is_final, active";

fn status_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MovementStatus> {
    Ok(MovementStatus {
        movement_status_id: row.get(0)?,
        status_name: row.get(1)?,
        description: row.get(2)?,
        display_order: row.get(3)?,
        movement_type_id: row.get(4)?,
        is_final: row.get(5)?,
        active: row.get(6)?,
    })
}

pub fn list_statuses(conn: &Connection) -> StoreResult<Vec<MovementStatus>> {
    let sql = format!(
        "SELECT {} FROM movement_statuses WHERE active = 1
         ORDER BY display_order, movement_status_id",
        STATUS_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let statuses = stmt
        .query_map([], status_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(statuses)
}

pub fn get_status(conn: &Connection, status_id: i64) -> StoreResult<MovementStatus> {
    let sql = format!(
        "SELECT {} FROM movement_statuses WHERE movement_status_id = ?1 AND active = 1",
        STATUS_COLUMNS
    );
    conn.query_row(&sql, params![status_id], status_from_row)
        .optional()?
        .ok_or(StoreError::not_found("movement status", status_id))
}

/// The final status used for cancellations
pub fn cancelled_status(conn: &Connection) -> StoreResult<MovementStatus> {
    let sql = format!(
        "SELECT {} FROM movement_statuses
         WHERE active = 1 AND is_final = 1
         ORDER BY (lower(status_name) = lower(?1)) DESC, display_order
         LIMIT 1",
        STATUS_COLUMNS
    );
    conn.query_row(&sql, params![CANCELLED_STATUS], status_from_row)
        .optional()?
        .ok_or_else(|| StoreError::Invalid("no final status is configured".to_string()))
}

fn check_status_type(conn: &Connection, movement_type_id: Option<i64>) -> StoreResult<()> {
    if let Some(type_id) = movement_type_id {
        get_type(conn, type_id).map_err(|_| {
            StoreError::Invalid(format!("movement type {} does not exist", type_id))
        })?;
    }
    Ok(())
}

pub fn create_status(
    conn: &Connection,
    input: &MovementStatusInput,
    actor: &str,
) -> StoreResult<MovementStatus> {
    let name = input
        .status_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| StoreError::Invalid("status_name is required".to_string()))?;
    check_status_type(conn, input.movement_type_id)?;

    let display_order = match input.display_order {
        Some(order) => order,
        None => conn.query_row(
            "SELECT COALESCE(MAX(display_order), 0) + 1 FROM movement_statuses WHERE active = 1",
            [],
            |row| row.get(0),
        )?,
    };

    conn.execute(
        "INSERT INTO movement_statuses (status_name, description, display_order, movement_type_id, is_final)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            name,
            input.description,
            display_order,
            input.movement_type_id,
            input.is_final.unwrap_or(false),
        ],
    )?;
    let status_id = conn.last_insert_rowid();
    record(conn, "created", "movement_status", status_id, serde_json::to_value(input)?, actor)?;

    get_status(conn, status_id)
}

/// Partial update: absent fields keep their value
pub fn update_status(
    conn: &Connection,
    status_id: i64,
    input: &MovementStatusInput,
    actor: &str,
) -> StoreResult<MovementStatus> {
    let current = get_status(conn, status_id)?;

    let status_name = match input.status_name.as_deref().map(str::trim) {
        Some("") => return Err(StoreError::Invalid("status_name cannot be blank".to_string())),
        Some(name) => name.to_string(),
        None => current.status_name,
    };
    let movement_type_id = input.movement_type_id.or(current.movement_type_id);
    check_status_type(conn, movement_type_id)?;

    conn.execute(
        "UPDATE movement_statuses
         SET status_name = ?1, description = ?2, display_order = ?3, movement_type_id = ?4, is_final = ?5
         WHERE movement_status_id = ?6",
        params![
            status_name,
            input.description.clone().or(current.description),
            input.display_order.unwrap_or(current.display_order),
            movement_type_id,
            input.is_final.unwrap_or(current.is_final),
            status_id,
        ],
    )?;
    record(conn, "updated", "movement_status", status_id, serde_json::to_value(input)?, actor)?;

    get_status(conn, status_id)
}

/// Soft delete; refused while active movements carry the status
pub fn delete_status(conn: &Connection, status_id: i64, actor: &str) -> StoreResult<()> {
    let status = get_status(conn, status_id)?;
    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM movements WHERE movement_status_id = ?1 AND active = 1",
        params![status_id],
        |row| row.get(0),
    )?;
    if in_use > 0 {
        return Err(StoreError::Conflict(format!(
            "movement status '{}' is used by {} movement(s)",
            status.status_name, in_use
        )));
    }

    conn.execute(
        "UPDATE movement_statuses SET active = 0 WHERE movement_status_id = ?1",
        params![status_id],
    )?;
    record(conn, "deleted", "movement_status", status_id, json!({}), actor)?;
    Ok(())
}
