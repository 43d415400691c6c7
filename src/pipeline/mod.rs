//! 流水线层：阶段工具、静态计划、编排器与流式事件

pub mod events;
pub mod orchestrator;
pub mod plan;
pub mod prompts;
pub mod stage;

pub use events::{EventStream, StreamEvent};
pub use orchestrator::Orchestrator;
pub use plan::{compose_input, PipelinePlan, PlanError, StageOutput};
pub use stage::{LlmStage, StageKind, StageTool};
