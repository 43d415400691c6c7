//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式片段）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::session::Message;

/// 流式文本片段
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>;

/// LLM 客户端 trait：非流式完成与流式完成（返回文本片段流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 流式完成，返回片段流
    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, String>;
}
