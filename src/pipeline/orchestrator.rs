//! 流水线编排器
//!
//! 按计划顺序依次调用阶段：输入 = 原始输入 ⊕ 之前各阶段输出；任一阶段失败即中止，
//! 不调用下游阶段、不自动重试，返回带阶段名的 InvocationError。
//! run 只返回最终文本；run_streamed 返回惰性事件流，消费者不拉取时生产者挂起。
//! 成功后把本轮（user、各阶段 tool、最终 assistant）一次性写入 Session；失败不写入任何条目。

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::time::timeout;

use crate::core::{InvocationError, PipelineError};
use crate::llm::TextStream;
use crate::pipeline::{compose_input, EventStream, PipelinePlan, StageOutput, StageTool, StreamEvent};
use crate::session::{Message, SessionStore, Turn};

/// 审计日志中输入预览的最大字符数
const INPUT_PREVIEW_CHARS: usize = 200;
const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONTEXT_TURNS: usize = 20;

/// 编排器：持有计划、单阶段超时与上下文条数
pub struct Orchestrator {
    plan: PipelinePlan,
    stage_timeout: Duration,
    context_turns: usize,
}

impl Orchestrator {
    pub fn new(plan: PipelinePlan) -> Self {
        Self {
            plan,
            stage_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
            context_turns: DEFAULT_CONTEXT_TURNS,
        }
    }

    /// 单阶段调用超时（流式时为相邻片段之间的最长等待）
    pub fn with_stage_timeout(mut self, secs: u64) -> Self {
        self.stage_timeout = Duration::from_secs(secs);
        self
    }

    /// 交给阶段的会话上下文条数，0 表示不带上下文
    pub fn with_context_turns(mut self, turns: usize) -> Self {
        self.context_turns = turns;
        self
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// 非流式运行：返回最后一个阶段的输出
    pub async fn run(&self, input: &str, session: &dyn SessionStore) -> Result<String, PipelineError> {
        tracing::debug!(session = session.session_id(), policy = %self.plan.policy(), "pipeline run");
        let context = self.load_context(session).await;
        let mut prior: Vec<StageOutput> = Vec::with_capacity(self.plan.len());

        for stage in self.plan.stages() {
            let stage_input = compose_input(input, &prior);
            let output = self.invoke_stage(stage.as_ref(), &stage_input, &context).await?;
            prior.push(StageOutput::new(stage.name(), output));
        }

        let result = prior.last().map(|o| o.output.clone()).unwrap_or_default();
        commit(session, input, &prior, &result).await?;
        Ok(result)
    }

    /// 流式运行：每个阶段依次产出 StageChanged、ToolInvoked、(终阶段的 TextDelta...)、ToolCompleted。
    /// TextDelta 拼接后等于 run 的返回值。
    pub fn run_streamed<'a>(&'a self, input: &'a str, session: &'a dyn SessionStore) -> EventStream<'a> {
        Box::pin(async_stream::stream! {
            tracing::debug!(session = session.session_id(), policy = %self.plan.policy(), "pipeline run (streamed)");
            let context = self.load_context(session).await;
            let mut prior: Vec<StageOutput> = Vec::with_capacity(self.plan.len());
            let terminal = self.plan.len().saturating_sub(1);

            for (idx, stage) in self.plan.stages().iter().enumerate() {
                let stage_input = compose_input(input, &prior);
                yield Ok(StreamEvent::StageChanged { name: stage.title().to_string() });
                yield Ok(StreamEvent::ToolInvoked { name: stage.name().to_string() });

                let output = if idx == terminal {
                    let start = Instant::now();
                    let mut fragments = match self.open_stream(stage.as_ref(), &stage_input, &context).await {
                        Ok(s) => s,
                        Err(e) => {
                            audit(stage.name(), "error", start, &stage_input);
                            yield Err(PipelineError::from(e));
                            return;
                        }
                    };
                    let mut text = String::new();
                    loop {
                        match timeout(self.stage_timeout, fragments.next()).await {
                            Ok(Some(Ok(fragment))) => {
                                if fragment.is_empty() {
                                    continue;
                                }
                                text.push_str(&fragment);
                                yield Ok(StreamEvent::TextDelta { text: fragment });
                            }
                            Ok(Some(Err(cause))) => {
                                audit(stage.name(), "error", start, &stage_input);
                                yield Err(PipelineError::from(InvocationError::new(stage.name(), cause)));
                                return;
                            }
                            Ok(None) => break,
                            Err(_) => {
                                audit(stage.name(), "timeout", start, &stage_input);
                                yield Err(PipelineError::from(InvocationError::timeout(stage.name())));
                                return;
                            }
                        }
                    }
                    audit(stage.name(), "ok", start, &stage_input);
                    text
                } else {
                    match self.invoke_stage(stage.as_ref(), &stage_input, &context).await {
                        Ok(o) => o,
                        Err(e) => {
                            yield Err(PipelineError::from(e));
                            return;
                        }
                    }
                };

                yield Ok(StreamEvent::ToolCompleted {
                    name: stage.name().to_string(),
                    output: output.clone(),
                });
                prior.push(StageOutput::new(stage.name(), output));
            }

            let result = prior.last().map(|o| o.output.clone()).unwrap_or_default();
            if let Err(e) = commit(session, input, &prior, &result).await {
                yield Err(e);
            }
        })
    }

    /// 读取最近的会话条目作为上下文；读取失败时不中止运行
    async fn load_context(&self, session: &dyn SessionStore) -> Vec<Turn> {
        if self.context_turns == 0 {
            return Vec::new();
        }
        match session.get_items(Some(self.context_turns)).await {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!("Failed to load session context ({}), continuing without it", e);
                Vec::new()
            }
        }
    }

    /// 带超时调用单个阶段，并输出 JSON 审计日志
    async fn invoke_stage(
        &self,
        stage: &dyn StageTool,
        input: &str,
        context: &[Turn],
    ) -> Result<String, InvocationError> {
        let start = Instant::now();
        let result = timeout(self.stage_timeout, stage.invoke(input, context)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        audit(stage.name(), outcome, start, input);

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(cause)) => Err(InvocationError::new(stage.name(), cause)),
            Err(_) => Err(InvocationError::timeout(stage.name())),
        }
    }

    async fn open_stream(
        &self,
        stage: &dyn StageTool,
        input: &str,
        context: &[Turn],
    ) -> Result<TextStream, InvocationError> {
        match timeout(self.stage_timeout, stage.invoke_stream(input, context)).await {
            Ok(Ok(s)) => Ok(s),
            Ok(Err(cause)) => Err(InvocationError::new(stage.name(), cause)),
            Err(_) => Err(InvocationError::timeout(stage.name())),
        }
    }
}

/// 一次性写入本轮：user、各阶段输出（tool）、最终结果（assistant，恰好一次）
async fn commit(
    session: &dyn SessionStore,
    input: &str,
    prior: &[StageOutput],
    result: &str,
) -> Result<(), PipelineError> {
    let mut messages = Vec::with_capacity(prior.len() + 2);
    messages.push(Message::user(input));
    messages.extend(
        prior
            .iter()
            .map(|out| Message::tool(format!("[{}] {}", out.stage, out.output))),
    );
    messages.push(Message::assistant(result));
    session.append_all(messages).await?;
    Ok(())
}

fn audit(stage: &str, outcome: &str, start: Instant, input: &str) {
    let duration_ms = start.elapsed().as_millis() as u64;
    let preview: String = input.chars().take(INPUT_PREVIEW_CHARS).collect();
    let record = serde_json::json!({
        "event": "stage_audit",
        "stage": stage,
        "ok": outcome == "ok",
        "outcome": outcome,
        "duration_ms": duration_ms,
        "input_preview": preview,
    });
    tracing::info!(audit = %record, "stage");
}
