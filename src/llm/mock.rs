//! Mock LLM 客户端（离线运行与测试，无需 API）
//!
//! 取 system 指令首行作为身份、最后一条 User 消息作为输入，返回确定性的文本；
//! 流式版本按空白切分为片段，拼接后与非流式结果完全一致。

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{LlmClient, TextStream};
use crate::session::{Message, Role};

/// 输入回显的最大字符数
const ECHO_CHARS: usize = 120;

/// Mock 客户端：确定性回复
#[derive(Debug, Default)]
pub struct MockLlmClient;

impl MockLlmClient {
    fn reply(messages: &[Message]) -> String {
        let persona = messages
            .iter()
            .find(|m| m.role == Role::System)
            .and_then(|m| m.content.lines().map(str::trim).find(|l| !l.is_empty()))
            .unwrap_or("Assistant");
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.trim())
            .unwrap_or("(no input)");
        let echo: String = last_user.chars().take(ECHO_CHARS).collect();
        let ellipsis = if last_user.chars().count() > ECHO_CHARS { "…" } else { "" };

        format!(
            "[mock] {} (offline, no API key configured) received: {}{}",
            persona, echo, ellipsis
        )
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        Ok(Self::reply(messages))
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, String> {
        let content = Self::reply(messages);
        let fragments: Vec<Result<String, String>> = content
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}
