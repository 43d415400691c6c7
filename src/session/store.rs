//! 会话存储抽象层
//!
//! 定义统一的会话接口，支持内存和 SQLite 持久化两种实现。
//! 约束：get_items 只读；append / append_all 与 clear 是仅有的写操作；clear 失败必须返回错误，
//! 不能在同一 id 下悄悄换成新会话。只接受 user / assistant / tool 三种角色。

use async_trait::async_trait;

use crate::core::SessionStoreError;
use crate::session::{Message, Role, Turn};

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 会话标识
    fn session_id(&self) -> &str;

    /// 追加一条消息，返回分配了 order 的 Turn
    async fn append(&self, message: Message) -> Result<Turn, SessionStoreError>;

    /// 批量追加：全部写入或全部不写入（一次运行的提交）
    async fn append_all(&self, messages: Vec<Message>) -> Result<Vec<Turn>, SessionStoreError>;

    /// 按插入顺序返回条目（最新在最后）；limit 为 Some(n) 时只返回最近 n 条
    async fn get_items(&self, limit: Option<usize>) -> Result<Vec<Turn>, SessionStoreError>;

    /// 清空会话，order 计数从 0 重新开始
    async fn clear(&self) -> Result<(), SessionStoreError>;
}

/// 生成新的会话 id：session-xxxxxxxx
pub fn new_session_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("session-{}", &hex[..8])
}

/// system 指令只发给后端，不进入会话
pub(crate) fn check_role(message: &Message) -> Result<(), SessionStoreError> {
    match message.role {
        Role::System => Err(SessionStoreError::UnsupportedRole(Role::System)),
        Role::User | Role::Assistant | Role::Tool => Ok(()),
    }
}

/// 取最近 limit 条，保持相对顺序
pub(crate) fn tail<T: Clone>(items: &[T], limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(n) => items[items.len().saturating_sub(n)..].to_vec(),
        None => items.to_vec(),
    }
}
