//! 运行时装配
//!
//! 从配置构建各阶段 LLM、定价流水线与会话存储；交互入口与一次性入口共用。

use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
use crate::llm::{resolve_backend, LlmClient, MockLlmClient, OpenAiClient, Provider};
use crate::pipeline::prompts::{load_prompt, MANAGER_PLAN};
use crate::pipeline::{LlmStage, Orchestrator, PipelinePlan, StageKind, StageTool};
use crate::session::{InMemorySession, SessionStore, SqliteSession};

/// 为单个阶段创建 LLM 客户端；没有 Key 或 provider 为 mock 时回退到 Mock
pub fn create_llm_for_stage(cfg: &AppConfig, kind: StageKind) -> Arc<dyn LlmClient> {
    let stage_cfg = match kind {
        StageKind::Behavior => &cfg.stages.behavior,
        StageKind::Profitability => &cfg.stages.profitability,
        StageKind::Recommendation => &cfg.stages.recommendation,
    };
    let backend = resolve_backend(&cfg.llm, stage_cfg, |k: &str| std::env::var(k).ok());

    match (backend.provider, backend.api_key) {
        (Provider::Mock, _) => {
            tracing::info!(stage = kind.key(), "Using Mock LLM");
            Arc::new(MockLlmClient)
        }
        (provider, Some(key)) => {
            tracing::info!(
                stage = kind.key(),
                "Using {:?} LLM ({}) at {}",
                provider,
                backend.model,
                backend.base_url.as_deref().unwrap_or("default endpoint")
            );
            Arc::new(OpenAiClient::new(backend.base_url.as_deref(), &backend.model, &key))
        }
        (provider, None) => {
            tracing::warn!(stage = kind.key(), "No API key set for {:?}, using Mock LLM", provider);
            Arc::new(MockLlmClient)
        }
    }
}

/// 构建定价流水线编排器
pub fn build_orchestrator(cfg: &AppConfig) -> anyhow::Result<Orchestrator> {
    let mut stages: Vec<Arc<dyn StageTool>> = Vec::with_capacity(StageKind::ALL.len());
    for kind in StageKind::ALL {
        let instruction = load_prompt(kind.key(), kind.default_instruction());
        let llm = create_llm_for_stage(cfg, kind);
        stages.push(Arc::new(LlmStage::for_kind(kind, instruction, llm)));
    }

    let plan = PipelinePlan::new(stages)
        .context("Failed to build pricing plan")?
        .with_policy(load_prompt("manager", MANAGER_PLAN));
    tracing::debug!("Pipeline plan:\n{}", plan.describe());

    Ok(Orchestrator::new(plan)
        .with_stage_timeout(cfg.llm.timeouts.request)
        .with_context_turns(cfg.app.max_context_turns))
}

/// 按 [session] 段创建会话存储
pub fn create_session(cfg: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match cfg.session.backend.to_lowercase().as_str() {
        "sqlite" => {
            let store = SqliteSession::open(&cfg.session.path, cfg.session.id.clone())
                .with_context(|| format!("Failed to open session store {}", cfg.session.path.display()))?;
            tracing::info!(session = store.session_id(), "Using SQLite session store");
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(match &cfg.session.id {
            Some(id) => InMemorySession::with_id(id.clone()),
            None => InMemorySession::new(),
        })),
        other => {
            tracing::warn!("Unknown session backend '{}', using memory", other);
            Ok(Arc::new(InMemorySession::new()))
        }
    }
}

/// 非流式跑一次流水线，返回最终文本
pub async fn run_once(cfg: &AppConfig, input: &str) -> anyhow::Result<String> {
    let orchestrator = build_orchestrator(cfg)?;
    let session = create_session(cfg)?;
    let output = orchestrator
        .run(input, session.as_ref())
        .await
        .context("Pipeline run failed")?;
    Ok(output)
}
