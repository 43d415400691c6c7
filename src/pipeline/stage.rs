//! 阶段工具
//!
//! 每个阶段实现 StageTool（name / title / description / invoke），对 Session 无副作用、
//! 调用之间无共享可变状态，可重复、并发调用。LlmStage 是基于 LlmClient 的标准实现。

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{LlmClient, TextStream};
use crate::pipeline::prompts;
use crate::session::{Message, Role, Turn};

/// 阶段工具 trait
#[async_trait]
pub trait StageTool: Send + Sync {
    /// 工具名（计划内唯一，ToolInvoked / ToolCompleted 使用）
    fn name(&self) -> &str;

    /// 展示名（StageChanged 使用）
    fn title(&self) -> &str {
        self.name()
    }

    /// 工具描述
    fn description(&self) -> &str;

    /// 执行阶段：input 为组合后的阶段输入，context 为会话中最近的条目
    async fn invoke(&self, input: &str, context: &[Turn]) -> Result<String, String>;

    /// 流式执行；默认把 invoke 的结果作为单个片段
    async fn invoke_stream(&self, input: &str, context: &[Turn]) -> Result<TextStream, String> {
        let output = self.invoke(input, context).await?;
        Ok(Box::pin(stream::iter(vec![Ok(output)])))
    }
}

/// 固定流水线中的三个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Behavior,
    Profitability,
    Recommendation,
}

impl StageKind {
    /// 计划顺序
    pub const ALL: [StageKind; 3] = [
        StageKind::Behavior,
        StageKind::Profitability,
        StageKind::Recommendation,
    ];

    pub fn tool_name(&self) -> &'static str {
        match self {
            StageKind::Behavior => "user_behavior_agent",
            StageKind::Profitability => "profitability_model_agent",
            StageKind::Recommendation => "recommendation_agent",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StageKind::Behavior => "User Behavior Agent",
            StageKind::Profitability => "Profitability Model Agent",
            StageKind::Recommendation => "Recommendation Agent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StageKind::Behavior => "Simulates customer behavior (conversion, churn, willingness to pay) for each candidate pricing model.",
            StageKind::Profitability => "Projects MRR, gross margin, LTV, CAC payback and breakeven for each pricing model from the behavior estimates.",
            StageKind::Recommendation => "Synthesizes insights from customer behavior and financial projections to recommend the most effective pricing strategy for the SaaS business.",
        }
    }

    /// 配置键与 prompt 文件名
    pub fn key(&self) -> &'static str {
        match self {
            StageKind::Behavior => "behavior",
            StageKind::Profitability => "profitability",
            StageKind::Recommendation => "recommendation",
        }
    }

    pub fn default_instruction(&self) -> &'static str {
        match self {
            StageKind::Behavior => prompts::BEHAVIOR_INSTRUCTION,
            StageKind::Profitability => prompts::PROFITABILITY_INSTRUCTION,
            StageKind::Recommendation => prompts::RECOMMENDATION_INSTRUCTION,
        }
    }
}

/// 基于 LLM 的阶段：system 指令 + 会话上下文 + 阶段输入
pub struct LlmStage {
    name: String,
    title: String,
    description: String,
    instruction: String,
    llm: Arc<dyn LlmClient>,
}

impl LlmStage {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        instruction: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
            instruction: instruction.into(),
            llm,
        }
    }

    /// 按阶段类型创建，instruction 由调用方给出（可能来自 prompt 文件）
    pub fn for_kind(kind: StageKind, instruction: impl Into<String>, llm: Arc<dyn LlmClient>) -> Self {
        Self::new(kind.tool_name(), kind.title(), kind.description(), instruction, llm)
    }

    fn build_messages(&self, input: &str, context: &[Turn]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(context.len() + 2);
        messages.push(Message::system(self.instruction.clone()));
        // 只回放用户与最终回复，中间阶段输出已包含在 input 中
        messages.extend(
            context
                .iter()
                .filter(|t| matches!(t.role, Role::User | Role::Assistant))
                .map(Turn::to_message),
        );
        messages.push(Message::user(input));
        messages
    }
}

#[async_trait]
impl StageTool for LlmStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: &str, context: &[Turn]) -> Result<String, String> {
        let messages = self.build_messages(input, context);
        self.llm.complete(&messages).await
    }

    async fn invoke_stream(&self, input: &str, context: &[Turn]) -> Result<TextStream, String> {
        let messages = self.build_messages(input, context);
        self.llm.complete_stream(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_stage_kind_metadata() {
        let names: Vec<&str> = StageKind::ALL.iter().map(|k| k.tool_name()).collect();
        assert_eq!(
            names,
            vec!["user_behavior_agent", "profitability_model_agent", "recommendation_agent"]
        );
        assert_eq!(StageKind::Profitability.key(), "profitability");
    }

    #[test]
    fn test_build_messages_filters_tool_turns() {
        let stage = LlmStage::for_kind(StageKind::Behavior, "instr", Arc::new(MockLlmClient));
        let context = vec![
            Turn::new(0, Message::user("earlier question")),
            Turn::new(1, Message::tool("[user_behavior_agent] old")),
            Turn::new(2, Message::assistant("earlier answer")),
        ];
        let messages = stage.build_messages("new input", &context);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages.last().unwrap().content, "new input");
    }

    #[tokio::test]
    async fn test_llm_stage_invoke_uses_instruction() {
        let stage = LlmStage::for_kind(
            StageKind::Recommendation,
            StageKind::Recommendation.default_instruction(),
            Arc::new(MockLlmClient),
        );
        let out = stage.invoke("Freemium vs Tiered", &[]).await.unwrap();
        assert!(out.contains("Recommendation Agent"));
        assert_eq!(stage.title(), "Recommendation Agent");
    }
}
