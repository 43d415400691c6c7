//! 会话层：有序、仅追加的对话日志（内存 / SQLite），支持按后缀读取与显式清空

pub mod memory;
pub mod sqlite;
pub mod store;
pub mod turn;

pub use memory::InMemorySession;
pub use sqlite::SqliteSession;
pub use store::{new_session_id, SessionStore};
pub use turn::{Message, Role, Turn};
