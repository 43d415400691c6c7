//! 终端层：命令解析、流式事件渲染与交互循环

pub mod commands;
pub mod render;
pub mod repl;

pub use commands::{parse_command, Command, HELP};
pub use render::{render_stream, RenderOutcome, StreamMultiplexer};
pub use repl::{CommandLoop, ExitReason, LineReader, LoopControl, Mode, StdinReader};
