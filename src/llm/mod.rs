//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）与后端解析

pub mod mock;
pub mod openai;
pub mod providers;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use providers::{resolve_backend, BackendSettings, Provider};
pub use traits::{LlmClient, TextStream};
