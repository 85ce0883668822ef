//! SQLite 持久化层
//!
//! Input: 数据库路径
//! Output: 用户、聊天记录、Token 用量的读写
//! Pos: 所有持久化状态的唯一入口
//!
//! 同步的 rusqlite 连接放在 Mutex 后面，异步调用方通过 [`Database::run`]
//! 在 `spawn_blocking` 中执行。

pub mod history;
pub mod ledger;
pub mod usage;
pub mod users;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};

pub use history::{ChatRecord, HistoryRetention};
pub use ledger::GenerationLedger;
pub use usage::{TokenUsage, TokenUsageDelta, UsageTracker};
pub use users::{NewUser, UserId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chat_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_owner_created
    ON chat_records(owner_id, created_at DESC, id DESC);
CREATE TABLE IF NOT EXISTS token_usage (
    owner_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    prompt_tokens INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    total_tokens INTEGER NOT NULL DEFAULT 0
);
";

/// 存储层错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("数据库任务异常退出: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// 是否为唯一约束冲突
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 共享数据库句柄
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// 打开（或创建）数据库文件并初始化表结构
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        // journal_mode 会返回一行结果，不能用 execute
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        Self::init(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在当前线程上持锁执行
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<T> {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    /// 在阻塞线程池中执行数据库操作
    pub async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        let value = tokio::task::spawn_blocking(move || db.with_conn(f)).await??;
        Ok(value)
    }
}

/// 以 `BEGIN IMMEDIATE` 开启事务执行 `f`，成功则提交，失败时回滚
///
/// IMMEDIATE 事务在开始时即获取写锁，读-删之间不会有其他写入插入。
pub fn in_transaction<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
