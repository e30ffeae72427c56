// Users and their refresh tokens

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

use super::{
    like_pattern, now_text, parse_optional_timestamp, parse_timestamp, record, StoreError,
    StoreResult,
};
use crate::entities::{Page, PageMeta, PageQuery, User};

const USER_SELECT: &str = "
    SELECT u.user_id, u.person_id, u.profile_id, u.username, u.last_login, u.active,
           u.created_at, u.updated_at, p.full_name
    FROM users u
    JOIN persons p ON p.person_id = u.person_id";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        person_id: row.get(1)?,
        profile_id: row.get(2)?,
        username: row.get(3)?,
        last_login: parse_optional_timestamp(row, 4)?,
        active: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
        updated_at: parse_timestamp(row, 7)?,
        person_name: row.get(8)?,
    })
}

/// Rows in the users table, soft-deleted accounts included
pub fn count_users(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

pub fn list_users(conn: &Connection, query: &PageQuery) -> StoreResult<Page<User>> {
    let pattern = query.search.as_deref().map(like_pattern);
    let filter = "u.active = 1 AND (?1 IS NULL OR u.username LIKE ?1 ESCAPE '\\' OR p.full_name LIKE ?1 ESCAPE '\\')";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM users u JOIN persons p ON p.person_id = u.person_id WHERE {}", filter),
        params![pattern],
        |row| row.get(0),
    )?;
    let meta = PageMeta::new(total as u64, query.page, query.limit);

    let sql = format!("{} WHERE {} ORDER BY u.username LIMIT ?2 OFFSET ?3", USER_SELECT, filter);
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(params![pattern, meta.per_page, meta.offset() as i64], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(users, meta))
}

pub fn get_user(conn: &Connection, user_id: i64) -> StoreResult<User> {
    let sql = format!("{} WHERE u.user_id = ?1 AND u.active = 1", USER_SELECT);
    conn.query_row(&sql, params![user_id], user_from_row)
        .optional()?
        .ok_or(StoreError::not_found("user", user_id))
}

/// Active user and stored password hash for a login attempt
pub fn find_credentials(conn: &Connection, username: &str) -> StoreResult<Option<(User, String)>> {
    let sql = format!(
        "{} WHERE u.username = ?1 AND u.active = 1",
        USER_SELECT.replace("p.full_name", "p.full_name, u.password_hash")
    );
    Ok(conn
        .query_row(&sql, params![username], |row| {
            Ok((user_from_row(row)?, row.get::<_, String>(9)?))
        })
        .optional()?)
}

pub fn create_user(
    conn: &Connection,
    person_id: i64,
    username: &str,
    password_hash: &str,
    profile_id: Option<i64>,
    actor: &str,
) -> StoreResult<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(StoreError::Invalid("username is required".to_string()));
    }
    let taken: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(StoreError::Conflict(format!("username '{}' is taken", username)));
    }

    let now = now_text();
    conn.execute(
        "INSERT INTO users (person_id, profile_id, username, password_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![person_id, profile_id, username, password_hash, now],
    )?;
    let user_id = conn.last_insert_rowid();
    record(conn, "created", "user", user_id, json!({ "username": username }), actor)?;

    get_user(conn, user_id)
}

pub fn touch_last_login(conn: &Connection, user_id: i64) -> StoreResult<()> {
    conn.execute(
        "UPDATE users SET last_login = ?1 WHERE user_id = ?2",
        params![now_text(), user_id],
    )?;
    Ok(())
}

/// Soft delete; the user's refresh tokens are revoked with it
pub fn delete_user(conn: &Connection, user_id: i64, actor: &str) -> StoreResult<()> {
    get_user(conn, user_id)?;
    conn.execute(
        "UPDATE users SET active = 0, updated_at = ?1 WHERE user_id = ?2",
        params![now_text(), user_id],
    )?;
    conn.execute("DELETE FROM refresh_tokens WHERE user_id = ?1", params![user_id])?;
    record(conn, "deleted", "user", user_id, json!({}), actor)?;
    Ok(())
}

// ============================================================================
// REFRESH TOKENS
// ============================================================================

pub fn store_refresh_token(
    conn: &Connection,
    token: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token, user_id, expires_at.to_rfc3339()],
    )?;
    Ok(())
}

/// Consume a refresh token: it is deleted whether or not it is still valid
///
/// Returns the owning user id when the token existed and had not expired.
pub fn take_refresh_token(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> StoreResult<Option<i64>> {
    let found: Option<(i64, DateTime<Utc>)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM refresh_tokens WHERE token = ?1",
            params![token],
            |row| Ok((row.get(0)?, parse_timestamp(row, 1)?)),
        )
        .optional()?;

    conn.execute("DELETE FROM refresh_tokens WHERE token = ?1", params![token])?;

    Ok(found
        .filter(|(_, expires_at)| *expires_at > now)
        .map(|(user_id, _)| user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::db::persons::create_person;
    use crate::entities::PersonInput;
    use chrono::Duration;

    fn setup() -> (Connection, User) {
        let conn = open_in_memory().unwrap();
        let person = create_person(&conn, &PersonInput::new("Maria Lima", None), "system").unwrap();
        let user = create_user(&conn, person.person_id, "maria", "hash", Some(1), "system").unwrap();
        (conn, user)
    }

    #[test]
    fn test_create_and_find() {
        let (conn, user) = setup();

        assert_eq!(user.person_name, "Maria Lima");
        assert_eq!(user.last_login, None);

        let (found, hash) = find_credentials(&conn, "maria").unwrap().unwrap();
        assert_eq!(found.user_id, user.user_id);
        assert_eq!(hash, "hash");

        assert!(find_credentials(&conn, "nobody").unwrap().is_none());

        let duplicate = create_user(&conn, user.person_id, "maria", "x", None, "system");
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_list_and_delete() {
        let (conn, user) = setup();

        let page = list_users(&conn, &PageQuery::new(1, 10, Some("lima"))).unwrap();
        assert_eq!(page.meta.total, 1);

        delete_user(&conn, user.user_id, "system").unwrap();
        assert!(find_credentials(&conn, "maria").unwrap().is_none());
        assert_eq!(list_users(&conn, &PageQuery::default()).unwrap().meta.total, 0);
        // The row stays behind and keeps its username
        assert_eq!(count_users(&conn).unwrap(), 1);
    }

    #[test]
    fn test_refresh_tokens_are_single_use() {
        let (conn, user) = setup();
        let now = Utc::now();

        store_refresh_token(&conn, "t1", user.user_id, now + Duration::hours(1)).unwrap();
        assert_eq!(take_refresh_token(&conn, "t1", now).unwrap(), Some(user.user_id));
        assert_eq!(take_refresh_token(&conn, "t1", now).unwrap(), None);

        store_refresh_token(&conn, "t2", user.user_id, now - Duration::seconds(1)).unwrap();
        assert_eq!(take_refresh_token(&conn, "t2", now).unwrap(), None);
    }

    #[test]
    fn test_touch_last_login() {
        let (conn, user) = setup();
        touch_last_login(&conn, user.user_id).unwrap();
        assert!(get_user(&conn, user.user_id).unwrap().last_login.is_some());
    }
}
