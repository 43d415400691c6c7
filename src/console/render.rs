//! 流式输出复用器
//!
//! 消费 EventStream：TextDelta 原样连续写出（不插入分隔符），StageChanged / ToolInvoked /
//! ToolCompleted 以独立注释行写在发生位置。写出失败后停止写，但继续拉取直到流结束；
//! 只有取消时才提前丢弃流。

use std::io::{self, Write};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::core::PipelineError;
use crate::pipeline::{EventStream, StreamEvent};

/// 一次渲染的结果
#[derive(Debug, Default)]
pub struct RenderOutcome {
    /// 所有 TextDelta 的拼接
    pub text: String,
    /// 收到的事件数（不含错误）
    pub events: usize,
    /// 流中的流水线错误
    pub error: Option<PipelineError>,
    /// 第一个写出错误
    pub write_error: Option<io::Error>,
    /// 是否因取消提前结束
    pub cancelled: bool,
}

/// 事件渲染器
#[derive(Debug, Clone)]
pub struct StreamMultiplexer {
    /// Tool output 注释的最大字符数，0 表示不截断
    preview_chars: usize,
}

impl Default for StreamMultiplexer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl StreamMultiplexer {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    /// 把单个事件格式化为要写出的文本
    pub fn format(&self, event: &StreamEvent) -> String {
        match event {
            StreamEvent::TextDelta { text } => text.clone(),
            StreamEvent::StageChanged { name } => format!("\n\n[Stage changed: {}]\n", name),
            StreamEvent::ToolInvoked { name } => format!("\n-- Tool called: {}\n", name),
            StreamEvent::ToolCompleted { name, output } => {
                format!("\n-- Tool output ({}): {}\n", name, self.preview(output))
            }
        }
    }

    fn preview(&self, output: &str) -> String {
        if self.preview_chars == 0 || output.chars().count() <= self.preview_chars {
            return output.to_string();
        }
        let head: String = output.chars().take(self.preview_chars).collect();
        format!("{}…", head)
    }

    /// 渲染整条事件流
    pub async fn render<W: Write + ?Sized>(
        &self,
        mut events: EventStream<'_>,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> RenderOutcome {
        let mut outcome = RenderOutcome::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                next = events.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    tracing::warn!("Pipeline error in stream: {}", e);
                    outcome.error.get_or_insert(e);
                    continue;
                }
                None => break,
            };

            outcome.events += 1;
            if let StreamEvent::TextDelta { text } = &event {
                outcome.text.push_str(text);
            }

            if outcome.write_error.is_none() {
                let chunk = self.format(&event);
                if let Err(e) = out.write_all(chunk.as_bytes()).and_then(|_| out.flush()) {
                    tracing::warn!("Output write failed ({}), draining remaining events", e);
                    outcome.write_error = Some(e);
                }
            }
        }

        outcome
    }
}

/// 便捷函数：默认选项渲染
pub async fn render_stream<W: Write + ?Sized>(
    events: EventStream<'_>,
    out: &mut W,
    cancel: &CancellationToken,
) -> RenderOutcome {
    StreamMultiplexer::default().render(events, out, cancel).await
}
