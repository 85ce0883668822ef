//! 聊天记录保留策略
//!
//! 每次成功生成追加一条 (question, answer)，随后裁剪到最近 `limit` 条。
//! 排序以 `created_at` 倒序为主，时间相同时按 `id` 倒序（插入顺序）。

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use serde::Serialize;

use super::users::UserId;

/// 默认保留条数
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// 一条问答记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRecord {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub owner: UserId,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<ChatRecord> {
    Ok(ChatRecord {
        id: row.get(0)?,
        owner: UserId(row.get(1)?),
        question: row.get(2)?,
        answer: row.get(3)?,
        created_at: row.get(4)?,
    })
}

// SQLite 的 LIMIT/OFFSET 为 i64，负数 OFFSET 会被当作 0，超出范围时饱和
fn to_sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// 按用户限制聊天记录条数
#[derive(Debug, Clone, Copy)]
pub struct HistoryRetention {
    limit: usize,
}

impl Default for HistoryRetention {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryRetention {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// 配置的保留条数
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 以当前时间追加一条记录，插入时不做数量限制
    pub fn append(
        &self,
        conn: &Connection,
        owner: UserId,
        question: &str,
        answer: &str,
    ) -> rusqlite::Result<ChatRecord> {
        self.append_at(conn, owner, question, answer, Utc::now())
    }

    pub(crate) fn append_at(
        &self,
        conn: &Connection,
        owner: UserId,
        question: &str,
        answer: &str,
        created_at: DateTime<Utc>,
    ) -> rusqlite::Result<ChatRecord> {
        conn.execute(
            "INSERT INTO chat_records (owner_id, question, answer, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![owner.0, question, answer, created_at],
        )?;
        Ok(ChatRecord {
            id: conn.last_insert_rowid(),
            owner,
            question: question.to_string(),
            answer: answer.to_string(),
            created_at,
        })
    }

    /// 删除最近 `limit` 条之外的所有记录，返回删除条数
    ///
    /// 单条语句内完成定位和删除，应在调用方的 IMMEDIATE 事务中执行。
    pub fn prune(&self, conn: &Connection, owner: UserId, limit: usize) -> rusqlite::Result<usize> {
        let removed = conn.execute(
            "DELETE FROM chat_records WHERE id IN (
                SELECT id FROM chat_records
                WHERE owner_id = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT -1 OFFSET ?2
            )",
            params![owner.0, to_sql_limit(limit)],
        )?;
        if removed > 0 {
            tracing::debug!(user_id = %owner, removed, limit, "已裁剪聊天记录");
        }
        Ok(removed)
    }

    /// 按配置的保留条数裁剪
    pub fn enforce(&self, conn: &Connection, owner: UserId) -> rusqlite::Result<usize> {
        self.prune(conn, owner, self.limit)
    }

    /// 最近的至多 `limit` 条记录（新的在前），只读
    pub fn recent(
        &self,
        conn: &Connection,
        owner: UserId,
        limit: usize,
    ) -> rusqlite::Result<Vec<ChatRecord>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, owner_id, question, answer, created_at FROM chat_records
             WHERE owner_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let records = stmt
            .query_map(params![owner.0, to_sql_limit(limit)], map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}
