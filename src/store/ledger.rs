//! 生成结果记账
//!
//! 一次成功生成对应一个事务：累加用量 → 追加记录 → 裁剪历史。
//! 任一步失败整体回滚。

use rusqlite::Connection;

use super::history::{ChatRecord, HistoryRetention};
use super::usage::{TokenUsage, TokenUsageDelta, UsageTracker};
use super::users::UserId;
use super::{Database, StoreResult, in_transaction};

/// 记账结果
#[derive(Debug, Clone)]
pub struct RecordedGeneration {
    pub record: ChatRecord,
    pub usage: TokenUsage,
    pub pruned: usize,
}

/// 用量和聊天记录的统一写入入口
#[derive(Clone)]
pub struct GenerationLedger {
    db: Database,
    retention: HistoryRetention,
}

impl GenerationLedger {
    pub fn new(db: Database, retention: HistoryRetention) -> Self {
        Self { db, retention }
    }

    /// 在单个 IMMEDIATE 事务中写入一次生成
    pub fn record_in(
        conn: &mut Connection,
        retention: HistoryRetention,
        owner: UserId,
        question: &str,
        answer: &str,
        usage: TokenUsageDelta,
    ) -> rusqlite::Result<RecordedGeneration> {
        in_transaction(conn, |tx| {
            let usage = UsageTracker::record(tx, owner, usage)?;
            let record = retention.append(tx, owner, question, answer)?;
            let pruned = retention.enforce(tx, owner)?;
            Ok(RecordedGeneration {
                record,
                usage,
                pruned,
            })
        })
    }

    pub async fn record_generation(
        &self,
        owner: UserId,
        question: String,
        answer: String,
        usage: TokenUsageDelta,
    ) -> StoreResult<RecordedGeneration> {
        let retention = self.retention;
        self.db
            .run(move |conn| Self::record_in(conn, retention, owner, &question, &answer, usage))
            .await
    }

    /// 最近的聊天记录，条数为配置的保留上限
    pub async fn recent(&self, owner: UserId) -> StoreResult<Vec<ChatRecord>> {
        let retention = self.retention;
        self.db
            .run(move |conn| retention.recent(conn, owner, retention.limit()))
            .await
    }
}
