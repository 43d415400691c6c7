//! 流水线计划
//!
//! 静态声明的阶段顺序：第 k 个阶段只能在 1..k-1 全部产出后调用，
//! 输入为原始用户输入加上之前每个阶段的输出；最后一个阶段的输出即运行结果。

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::prompts::MANAGER_PLAN;
use crate::pipeline::StageTool;

/// 计划构建错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Pipeline plan has no stages")]
    Empty,

    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),
}

/// 已完成阶段的输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub stage: String,
    pub output: String,
}

impl StageOutput {
    pub fn new(stage: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            output: output.into(),
        }
    }
}

/// 有序的阶段列表 + 自然语言控制计划
#[derive(Clone)]
pub struct PipelinePlan {
    stages: Vec<Arc<dyn StageTool>>,
    policy: String,
}

impl PipelinePlan {
    /// 按给定顺序创建计划；至少一个阶段且名称唯一
    pub fn new(stages: Vec<Arc<dyn StageTool>>) -> Result<Self, PlanError> {
        if stages.is_empty() {
            return Err(PlanError::Empty);
        }
        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.name().to_string()) {
                return Err(PlanError::DuplicateStage(stage.name().to_string()));
            }
        }
        Ok(Self {
            stages,
            policy: MANAGER_PLAN.to_string(),
        })
    }

    /// 定价流水线：Behavior → Profitability → Recommendation
    pub fn pricing(
        behavior: Arc<dyn StageTool>,
        profitability: Arc<dyn StageTool>,
        recommendation: Arc<dyn StageTool>,
    ) -> Result<Self, PlanError> {
        Self::new(vec![behavior, profitability, recommendation])
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = policy.into();
        self
    }

    pub fn stages(&self) -> &[Arc<dyn StageTool>] {
        &self.stages
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// 列出计划：每行「序号. 工具名 - 描述」
    pub fn describe(&self) -> String {
        self.stages
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {} - {}", i + 1, s.name(), s.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 组合阶段输入：原始输入 + 之前所有阶段的输出（逐字）
pub fn compose_input(original: &str, prior: &[StageOutput]) -> String {
    let mut input = original.to_string();
    for out in prior {
        input.push_str("\n\n--- Output of ");
        input.push_str(&out.stage);
        input.push_str(" ---\n");
        input.push_str(&out.output);
    }
    input
}
