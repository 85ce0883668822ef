//! 用户账户表

use std::fmt;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

/// 已认证用户的不透明标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// 待插入的用户（密码已哈希）
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

const USER_COLUMNS: &str = "id, username, email, password_hash";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
    })
}

pub fn insert(conn: &Connection, new_user: &NewUser<'_>) -> rusqlite::Result<User> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            new_user.username,
            new_user.email,
            new_user.password_hash,
            Utc::now()
        ],
    )?;
    Ok(User {
        id: UserId(conn.last_insert_rowid()),
        username: new_user.username.to_string(),
        email: new_user.email.to_string(),
        password_hash: new_user.password_hash.to_string(),
    })
}

pub fn find_by_id(conn: &Connection, id: UserId) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id.0],
        map_user,
    )
    .optional()
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        [username],
        map_user,
    )
    .optional()
}

pub fn username_exists(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )
}
