//! Pricer - 交互式定价优化
//!
//! 入口：加载 .env 与配置、初始化日志、构建流水线与会话，然后运行命令循环。

use std::sync::Arc;

use anyhow::Context;
use pricer::agent::{build_orchestrator, create_session};
use pricer::config::{load_config, AppConfig};
use pricer::console::{CommandLoop, ExitReason, StdinReader, StreamMultiplexer};
use pricer::core::ShutdownManager;
use pricer::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let (cfg, config_error) = match load_config(None) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    observability::init(&cfg.app.log_level);
    if let Some(e) = config_error {
        tracing::warn!("Failed to load config ({}), using defaults", e);
    }

    let orchestrator = Arc::new(build_orchestrator(&cfg)?);
    let session = create_session(&cfg)?;
    tracing::info!(session = session.session_id(), "Session ready");

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();
    let mut shutdown_reason = shutdown.subscribe();

    let mut command_loop = CommandLoop::new(orchestrator, session, std::io::stdout())
        .with_cancel_token(shutdown.token())
        .with_multiplexer(StreamMultiplexer::new(cfg.app.tool_output_preview_chars))
        .with_history_preview_chars(cfg.app.history_preview_chars)
        .with_clear_on_exit(cfg.app.clear_session_on_exit);

    let mut reader = StdinReader::new();
    let reason = command_loop
        .run(&mut reader)
        .await
        .context("Command loop failed")?;

    // 阻塞在 stdin 上的读取线程不会自行结束，中断时直接退出进程
    if reason == ExitReason::Interrupted {
        if let Ok(r) = shutdown_reason.try_recv() {
            tracing::info!("Exiting on {:?}", r);
        }
        std::process::exit(130);
    }
    Ok(())
}
