//! 流水线过程事件：供流式输出展示阶段切换、工具调用与最终回复片段

use std::pin::Pin;

use futures_util::Stream;
use serde::Serialize;

use crate::core::PipelineError;

/// 单个流式事件（可序列化为 JSON 供其他前端使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// 最终回复的一小段
    TextDelta { text: String },
    /// 当前活动阶段切换（阶段展示名）
    StageChanged { name: String },
    /// 开始调用阶段工具
    ToolInvoked { name: String },
    /// 阶段工具返回
    ToolCompleted { name: String, output: String },
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamEvent::TextDelta { text: text.into() }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, StreamEvent::TextDelta { .. })
    }
}

/// run_streamed 返回的惰性事件流；失败时产出一个 Err 后结束
pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamEvent, PipelineError>> + Send + 'a>>;
