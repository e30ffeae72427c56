// Movements, joined with person, type and status names for display

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::json;

use super::catalog::{cancelled_status, get_status, get_type};
use super::persons::get_person;
use super::{
    date_text, like_pattern, now_text, parse_date, parse_timestamp, record, StoreError,
    StoreResult,
};
use crate::entities::{Movement, MovementFilter, MovementInput, Page, PageMeta};

const MOVEMENT_SELECT: &str = "
    SELECT m.movement_id, m.movement_date, m.person_id, m.total_amount, m.discount, m.addition,
           m.total_items, m.description, m.movement_type_id, m.movement_status_id, m.license_id,
           m.is_template, m.created_at, m.cancel_reason,
           p.full_name, t.type_name, s.status_name
    FROM movements m
    JOIN persons p ON p.person_id = m.person_id
    JOIN movement_types t ON t.movement_type_id = m.movement_type_id
    JOIN movement_statuses s ON s.movement_status_id = m.movement_status_id";

const MOVEMENT_COUNT: &str = "
    SELECT COUNT(*)
    FROM movements m
    JOIN persons p ON p.person_id = m.person_id
    JOIN movement_types t ON t.movement_type_id = m.movement_type_id
    JOIN movement_statuses s ON s.movement_status_id = m.movement_status_id";

fn movement_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Movement> {
    Ok(Movement {
        movement_id: row.get(0)?,
        movement_date: parse_date(row, 1)?,
        person_id: row.get(2)?,
        total_amount: row.get(3)?,
        discount: row.get(4)?,
        addition: row.get(5)?,
        total_items: row.get(6)?,
        description: row.get(7)?,
        movement_type_id: row.get(8)?,
        movement_status_id: row.get(9)?,
        license_id: row.get(10)?,
        is_template: row.get(11)?,
        created_at: parse_timestamp(row, 12)?,
        cancel_reason: row.get(13)?,
        person_name: row.get(14)?,
        movement_type_name: row.get(15)?,
        movement_status_name: row.get(16)?,
    })
}

/// WHERE clause and its bound values for a list filter
fn filter_clause(filter: &MovementFilter) -> (String, Vec<SqlValue>) {
    let mut conditions = vec!["m.active = 1".to_string()];
    let mut values: Vec<SqlValue> = Vec::new();

    if let Some(search) = &filter.search {
        values.push(SqlValue::Text(like_pattern(search)));
        let idx = values.len();
        conditions.push(format!(
            "(m.description LIKE ?{idx} ESCAPE '\\' OR p.full_name LIKE ?{idx} ESCAPE '\\' OR p.fantasy_name LIKE ?{idx} ESCAPE '\\')"
        ));
    }
    if let Some(start) = filter.start_date {
        values.push(SqlValue::Text(date_text(start)));
        conditions.push(format!("m.movement_date >= ?{}", values.len()));
    }
    if let Some(end) = filter.end_date {
        values.push(SqlValue::Text(date_text(end)));
        conditions.push(format!("m.movement_date <= ?{}", values.len()));
    }
    if let Some(status) = &filter.status {
        values.push(SqlValue::Text(status.clone()));
        conditions.push(format!("lower(s.status_name) = lower(?{})", values.len()));
    }
    if let Some(type_id) = filter.movement_type_id {
        values.push(SqlValue::Integer(type_id));
        conditions.push(format!("m.movement_type_id = ?{}", values.len()));
    }
    if let Some(status_id) = filter.movement_status_id {
        values.push(SqlValue::Integer(status_id));
        conditions.push(format!("m.movement_status_id = ?{}", values.len()));
    }

    (conditions.join(" AND "), values)
}

/// Newest first
pub fn list_movements(conn: &Connection, filter: &MovementFilter) -> StoreResult<Page<Movement>> {
    let (clause, mut values) = filter_clause(filter);

    let total: i64 = conn.query_row(
        &format!("{} WHERE {}", MOVEMENT_COUNT, clause),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;
    let meta = PageMeta::new(total as u64, filter.page, filter.limit);

    values.push(SqlValue::Integer(meta.per_page as i64));
    values.push(SqlValue::Integer(meta.offset() as i64));
    let sql = format!(
        "{} WHERE {} ORDER BY m.movement_date DESC, m.movement_id DESC LIMIT ?{} OFFSET ?{}",
        MOVEMENT_SELECT,
        clause,
        values.len() - 1,
        values.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let movements = stmt
        .query_map(params_from_iter(values.iter()), movement_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(movements, meta))
}

pub fn get_movement(conn: &Connection, movement_id: i64) -> StoreResult<Movement> {
    let sql = format!("{} WHERE m.movement_id = ?1 AND m.active = 1", MOVEMENT_SELECT);
    conn.query_row(&sql, params![movement_id], movement_from_row)
        .optional()?
        .ok_or(StoreError::not_found("movement", movement_id))
}

/// Amounts must be non-negative and every reference must exist
fn check_input(conn: &Connection, input: &MovementInput) -> StoreResult<()> {
    let amounts = [
        ("total_amount", input.total_amount),
        ("discount", input.discount),
        ("addition", input.addition),
        ("total_items", input.total_items),
    ];
    for (field, amount) in amounts {
        if !amount.is_finite() || amount < 0.0 {
            return Err(StoreError::Invalid(format!("{} must be a non-negative number", field)));
        }
    }

    get_person(conn, input.person_id)
        .map_err(|_| StoreError::Invalid(format!("person {} does not exist", input.person_id)))?;
    get_type(conn, input.movement_type_id).map_err(|_| {
        StoreError::Invalid(format!("movement type {} does not exist", input.movement_type_id))
    })?;
    let status = get_status(conn, input.movement_status_id).map_err(|_| {
        StoreError::Invalid(format!("movement status {} does not exist", input.movement_status_id))
    })?;

    if let Some(restricted_to) = status.movement_type_id {
        if restricted_to != input.movement_type_id {
            return Err(StoreError::Invalid(format!(
                "status '{}' does not apply to movement type {}",
                status.status_name, input.movement_type_id
            )));
        }
    }

    Ok(())
}

pub fn create_movement(conn: &Connection, input: &MovementInput, actor: &str) -> StoreResult<Movement> {
    check_input(conn, input)?;

    conn.execute(
        "INSERT INTO movements (movement_date, person_id, total_amount, discount, addition, total_items,
                                description, movement_type_id, movement_status_id, license_id,
                                is_template, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            date_text(input.movement_date),
            input.person_id,
            input.total_amount,
            input.discount,
            input.addition,
            input.total_items,
            input.description,
            input.movement_type_id,
            input.movement_status_id,
            input.license_id,
            input.is_template,
            now_text(),
        ],
    )?;
    let movement_id = conn.last_insert_rowid();
    record(conn, "created", "movement", movement_id, serde_json::to_value(input)?, actor)?;

    get_movement(conn, movement_id)
}

pub fn update_movement(
    conn: &Connection,
    movement_id: i64,
    input: &MovementInput,
    actor: &str,
) -> StoreResult<Movement> {
    let current = get_movement(conn, movement_id)?;
    if current.is_cancelled() {
        return Err(StoreError::Conflict(format!(
            "movement {} is cancelled and cannot be changed",
            movement_id
        )));
    }
    check_input(conn, input)?;

    conn.execute(
        "UPDATE movements
         SET movement_date = ?1, person_id = ?2, total_amount = ?3, discount = ?4, addition = ?5,
             total_items = ?6, description = ?7, movement_type_id = ?8, movement_status_id = ?9,
             license_id = ?10, is_template = ?11
         WHERE movement_id = ?12",
        params![
            date_text(input.movement_date),
            input.person_id,
            input.total_amount,
            input.discount,
            input.addition,
            input.total_items,
            input.description,
            input.movement_type_id,
            input.movement_status_id,
            input.license_id,
            input.is_template,
            movement_id,
        ],
    )?;
    record(conn, "updated", "movement", movement_id, serde_json::to_value(input)?, actor)?;

    get_movement(conn, movement_id)
}

pub fn delete_movement(conn: &Connection, movement_id: i64, actor: &str) -> StoreResult<()> {
    get_movement(conn, movement_id)?;
    conn.execute(
        "UPDATE movements SET active = 0 WHERE movement_id = ?1",
        params![movement_id],
    )?;
    record(conn, "deleted", "movement", movement_id, json!({}), actor)?;
    Ok(())
}

/// Move to the final cancelled status, keeping the reason
pub fn cancel_movement(
    conn: &Connection,
    movement_id: i64,
    reason: &str,
    actor: &str,
) -> StoreResult<Movement> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(StoreError::Invalid("reason is required".to_string()));
    }

    let movement = get_movement(conn, movement_id)?;
    if movement.is_cancelled() {
        return Err(StoreError::Conflict(format!("movement {} is already cancelled", movement_id)));
    }

    let cancelled = cancelled_status(conn)?;
    conn.execute(
        "UPDATE movements SET movement_status_id = ?1, cancel_reason = ?2 WHERE movement_id = ?3",
        params![cancelled.movement_status_id, reason, movement_id],
    )?;
    record(conn, "cancelled", "movement", movement_id, json!({ "reason": reason }), actor)?;

    get_movement(conn, movement_id)
}
