//! 按用户累计的 Token 用量

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::users::UserId;

/// 单次生成产生的用量增量，缺失字段视为 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsageDelta {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsageDelta {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }

    /// 信任上游返回的 total；上游未给出 total 时用 prompt + completion 补齐
    pub fn normalized(self) -> Self {
        if self.total_tokens == 0 {
            Self {
                total_tokens: self.prompt_tokens.saturating_add(self.completion_tokens),
                ..self
            }
        } else {
            self
        }
    }
}

/// 用户累计用量，只增不减
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// SQLite INTEGER 为 i64，计数超出范围时饱和
fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn map_usage(row: &Row<'_>) -> rusqlite::Result<TokenUsage> {
    Ok(TokenUsage {
        prompt_tokens: from_sql_count(row.get(0)?),
        completion_tokens: from_sql_count(row.get(1)?),
        total_tokens: from_sql_count(row.get(2)?),
    })
}

/// Token 用量累加器
pub struct UsageTracker;

impl UsageTracker {
    /// 把增量累加到用户记录上，记录不存在时创建
    ///
    /// 单条 upsert 语句完成 get-or-create 与累加，`owner_id` 为主键，
    /// 并发的首次调用也只会产生一行。重复提交同一增量会被重复计入。
    pub fn record(
        conn: &Connection,
        owner: UserId,
        delta: TokenUsageDelta,
    ) -> rusqlite::Result<TokenUsage> {
        conn.query_row(
            "INSERT INTO token_usage (owner_id, prompt_tokens, completion_tokens, total_tokens)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
                prompt_tokens = prompt_tokens + excluded.prompt_tokens,
                completion_tokens = completion_tokens + excluded.completion_tokens,
                total_tokens = total_tokens + excluded.total_tokens
             RETURNING prompt_tokens, completion_tokens, total_tokens",
            params![
                owner.0,
                to_sql_count(delta.prompt_tokens),
                to_sql_count(delta.completion_tokens),
                to_sql_count(delta.total_tokens)
            ],
            map_usage,
        )
    }

    /// 读取用户累计用量，没有记录时返回全 0（不会创建记录）
    pub fn get(conn: &Connection, owner: UserId) -> rusqlite::Result<TokenUsage> {
        let usage = conn
            .query_row(
                "SELECT prompt_tokens, completion_tokens, total_tokens FROM token_usage WHERE owner_id = ?1",
                [owner.0],
                map_usage,
            )
            .optional()?;
        Ok(usage.unwrap_or_default())
    }
}
