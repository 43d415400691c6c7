//! SQLite 持久化会话
//!
//! 单表 turns(session_id, ord, role, content, created_at)，同一文件可容纳多个会话；
//! 以相同 id 重新打开即可恢复历史。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::core::SessionStoreError;
use crate::session::store::{check_role, new_session_id};
use crate::session::{Message, Role, SessionStore, Turn};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS turns (
    session_id TEXT NOT NULL,
    ord INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (session_id, ord)
)";

/// SQLite 会话存储；所有查询在 spawn_blocking 中执行
pub struct SqliteSession {
    id: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSession {
    /// 打开（或创建）数据库文件；session_id 为 None 时新建会话
    pub fn open(path: impl AsRef<Path>, session_id: Option<String>) -> Result<Self, SessionStoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SessionStoreError::Backend(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, session_id)
    }

    pub fn open_in_memory(session_id: Option<String>) -> Result<Self, SessionStoreError> {
        Self::from_connection(Connection::open_in_memory()?, session_id)
    }

    fn from_connection(conn: Connection, session_id: Option<String>) -> Result<Self, SessionStoreError> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            id: session_id.unwrap_or_else(new_session_id),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在 blocking 线程上持锁执行 f（参数为连接与会话 id）
    async fn with_conn<T, F>(&self, f: F) -> Result<T, SessionStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let id = self.id.clone();
        tokio::task::spawn_blocking(move || -> Result<T, SessionStoreError> {
            let mut conn = conn.lock().map_err(|_| SessionStoreError::LockPoisoned)?;
            Ok(f(&mut *conn, &id)?)
        })
        .await
        .map_err(|e| SessionStoreError::Backend(e.to_string()))?
    }
}

fn next_order(conn: &Connection, id: &str) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(MAX(ord) + 1, 0) FROM turns WHERE session_id = ?1",
        params![id],
        |row| row.get(0),
    )
}

fn insert_turn(conn: &Connection, id: &str, turn: &Turn) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO turns (session_id, ord, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, turn.order as i64, turn.role.as_str(), turn.content, turn.created_at],
    )?;
    Ok(())
}

#[async_trait]
impl SessionStore for SqliteSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn append(&self, message: Message) -> Result<Turn, SessionStoreError> {
        check_role(&message)?;
        self.with_conn(move |conn, id| {
            let turn = Turn::new(next_order(conn, id)? as u64, message);
            insert_turn(conn, id, &turn)?;
            Ok(turn)
        })
        .await
    }

    async fn append_all(&self, messages: Vec<Message>) -> Result<Vec<Turn>, SessionStoreError> {
        for message in &messages {
            check_role(message)?;
        }
        self.with_conn(move |conn, id| {
            // 单个事务：任一 INSERT 失败则整批回滚
            let tx = conn.transaction()?;
            let mut order = next_order(&tx, id)? as u64;
            let mut turns = Vec::with_capacity(messages.len());
            for message in messages {
                let turn = Turn::new(order, message);
                insert_turn(&tx, id, &turn)?;
                order += 1;
                turns.push(turn);
            }
            tx.commit()?;
            Ok(turns)
        })
        .await
    }

    async fn get_items(&self, limit: Option<usize>) -> Result<Vec<Turn>, SessionStoreError> {
        let rows = self
            .with_conn(move |conn, id| {
                // 先倒序取最近 limit 条，再翻转为插入顺序
                let limit = limit.map(|n| n as i64).unwrap_or(-1);
                let mut stmt = conn.prepare(
                    "SELECT ord, role, content, created_at FROM turns WHERE session_id = ?1 ORDER BY ord DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![id, limit], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let mut turns = Vec::with_capacity(rows.len());
        for (order, role, content, created_at) in rows.into_iter().rev() {
            let role: Role = role.parse().map_err(SessionStoreError::Backend)?;
            turns.push(Turn {
                order: order as u64,
                role,
                content,
                created_at,
            });
        }
        Ok(turns)
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        self.with_conn(|conn, id| {
            conn.execute("DELETE FROM turns WHERE session_id = ?1", params![id])?;
            Ok(())
        })
        .await
    }
}
