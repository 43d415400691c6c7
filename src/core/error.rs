//! 错误类型
//!
//! - InvocationError：阶段后端失败（网络、鉴权、响应异常、超时），中止剩余阶段，不自动重试
//! - SessionStoreError：会话存储读写失败；/reset 时由命令循环降级为新的本地会话
//! - InputError：命令参数非法，命令按默认参数执行
//! - PipelineError：Orchestrator 对外的统一错误

use thiserror::Error;

use crate::session::Role;

/// 某个阶段调用失败：记录阶段名与底层原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Stage '{stage}' failed: {cause}")]
pub struct InvocationError {
    pub stage: String,
    pub cause: String,
}

impl InvocationError {
    pub fn new(stage: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            cause: cause.into(),
        }
    }

    pub fn timeout(stage: impl Into<String>) -> Self {
        Self::new(stage, "timeout")
    }
}

/// 会话存储错误
#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("Session backend error: {0}")]
    Backend(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Session store lock poisoned")]
    LockPoisoned,

    #[error("Role '{0}' cannot be stored in a session")]
    UnsupportedRole(Role),
}

/// 命令参数错误（不终止循环）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid count '{value}' for {command}, using default")]
    InvalidCount { command: String, value: String },
}

/// 一次流水线运行的错误
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Session(#[from] SessionStoreError),
}

impl PipelineError {
    /// 失败阶段名（仅 Invocation）
    pub fn failed_stage(&self) -> Option<&str> {
        match self {
            PipelineError::Invocation(e) => Some(e.stage.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_error_display() {
        let err = InvocationError::new("user_behavior_agent", "connection refused");
        assert_eq!(
            err.to_string(),
            "Stage 'user_behavior_agent' failed: connection refused"
        );
    }

    #[test]
    fn test_pipeline_error_failed_stage() {
        let err: PipelineError = InvocationError::timeout("recommendation_agent").into();
        assert_eq!(err.failed_stage(), Some("recommendation_agent"));
        assert!(err.to_string().contains("timeout"));
    }
}
