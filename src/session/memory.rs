//! 内存会话：进程内的追加日志

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::SessionStoreError;
use crate::session::store::{check_role, new_session_id, tail};
use crate::session::{Message, SessionStore, Turn};

#[derive(Debug, Default)]
struct Inner {
    turns: Vec<Turn>,
    next_order: u64,
}

/// 内存会话存储；clear 不会失败
#[derive(Debug)]
pub struct InMemorySession {
    id: String,
    inner: RwLock<Inner>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::with_id(new_session_id())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn append(&self, message: Message) -> Result<Turn, SessionStoreError> {
        check_role(&message)?;
        let mut inner = self.inner.write().await;
        let turn = Turn::new(inner.next_order, message);
        inner.next_order += 1;
        inner.turns.push(turn.clone());
        Ok(turn)
    }

    async fn append_all(&self, messages: Vec<Message>) -> Result<Vec<Turn>, SessionStoreError> {
        for message in &messages {
            check_role(message)?;
        }
        // 持锁期间没有 await，整批写入不会被打断
        let mut inner = self.inner.write().await;
        let mut turns = Vec::with_capacity(messages.len());
        for message in messages {
            let turn = Turn::new(inner.next_order, message);
            inner.next_order += 1;
            inner.turns.push(turn.clone());
            turns.push(turn);
        }
        Ok(turns)
    }

    async fn get_items(&self, limit: Option<usize>) -> Result<Vec<Turn>, SessionStoreError> {
        let inner = self.inner.read().await;
        Ok(tail(&inner.turns, limit))
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[tokio::test]
    async fn test_history_slicing() {
        let session = InMemorySession::new();
        for c in ["A", "B", "C"] {
            session.append(Message::user(c)).await.unwrap();
        }
        let items = session.get_items(Some(2)).await.unwrap();
        let contents: Vec<&str> = items.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["B", "C"]);
        assert_eq!(session.get_items(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_monotonic_and_reset() {
        let session = InMemorySession::new();
        let mut last_len = 0;
        for i in 0..5 {
            let turn = session.append(Message::user(format!("m{i}"))).await.unwrap();
            assert_eq!(turn.order, i);
            let len = session.get_items(None).await.unwrap().len();
            assert!(len > last_len);
            last_len = len;
        }

        session.clear().await.unwrap();
        assert!(session.get_items(None).await.unwrap().is_empty());

        // 新会话从 0 重新编号
        let turn = session.append(Message::assistant("fresh")).await.unwrap();
        assert_eq!(turn.order, 0);
    }

    #[tokio::test]
    async fn test_append_all_assigns_consecutive_orders() {
        let session = InMemorySession::new();
        session.append(Message::user("earlier")).await.unwrap();
        let turns = session
            .append_all(vec![Message::user("q"), Message::tool("[b] B"), Message::assistant("R")])
            .await
            .unwrap();
        let orders: Vec<u64> = turns.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(session.get_items(None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_system_role_is_rejected() {
        let session = InMemorySession::new();
        let err = session.append(Message::system("instructions")).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::UnsupportedRole(Role::System)));

        // 批量中含 system 时整批都不写入
        let err = session
            .append_all(vec![Message::user("q"), Message::system("instructions")])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionStoreError::UnsupportedRole(_)));
        assert!(session.get_items(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_items_is_read_only() {
        let session = InMemorySession::with_id("session-test");
        session.append(Message::user("hello")).await.unwrap();
        let _ = session.get_items(Some(1)).await.unwrap();
        let _ = session.get_items(None).await.unwrap();
        assert_eq!(session.get_items(None).await.unwrap().len(), 1);
        assert_eq!(session.session_id(), "session-test");
    }
}
