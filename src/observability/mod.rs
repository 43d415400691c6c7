//! 可观测性：tracing 订阅器初始化
//!
//! 日志写到 stderr，避免与 stdout 上的流式输出交错。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化日志：RUST_LOG 优先，否则使用 default_level（如 [app].log_level）
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
