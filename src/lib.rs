//! Pricer - Micro-SaaS 定价优化流水线
//!
//! 模块划分：
//! - **agent**: 运行时装配（各阶段 LLM、编排器、会话存储）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **console**: 命令解析、流式事件渲染、交互循环
//! - **core**: 错误类型与优雅关闭
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）与后端解析
//! - **observability**: tracing 初始化
//! - **pipeline**: 阶段工具、静态计划、编排器与流式事件
//! - **session**: 有序、仅追加的会话存储（内存 / SQLite）

pub mod agent;
pub mod config;
pub mod console;
pub mod core;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod session;
