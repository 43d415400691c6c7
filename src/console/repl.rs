//! 交互式命令循环
//!
//! 状态：mode（流式 / 非流式，初始流式）+ 当前会话。每次只存在一个未完成的输入读取或一次流水线运行；
//! 阻塞的终端输入放到 blocking 线程读取。外部中断（CancellationToken）等同于 /quit。

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::console::commands::{parse_command, Command, HELP};
use crate::console::render::StreamMultiplexer;
use crate::pipeline::prompts::EXAMPLE_INPUT;
use crate::pipeline::Orchestrator;
use crate::session::{InMemorySession, SessionStore};

/// 退出时清空会话的最长等待
const EXIT_CLEAR_TIMEOUT_SECS: u64 = 3;
const PROMPT: &str = "You> ";

/// 行输入源
#[async_trait]
pub trait LineReader: Send {
    /// 读取一行；None 表示输入结束
    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// 标准输入：在 blocking 线程中读取，保持运行时空闲
#[derive(Debug, Default)]
pub struct StdinReader;

impl StdinReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LineReader for StdinReader {
    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
            let mut line = String::new();
            match io::stdin().read_line(&mut line)? {
                0 => Ok(None),
                _ => Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
            }
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Streamed,
    NonStreamed,
}

/// 处理一行后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
    Interrupted,
}

/// 循环结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    Interrupted,
    EndOfInput,
}

/// 命令循环：独占会话，驱动 Orchestrator
pub struct CommandLoop<W: Write + Send> {
    orchestrator: Arc<Orchestrator>,
    session: Arc<dyn SessionStore>,
    mode: Mode,
    out: W,
    multiplexer: StreamMultiplexer,
    example_input: String,
    history_preview_chars: usize,
    clear_on_exit: bool,
    cancel: CancellationToken,
}

impl<W: Write + Send> CommandLoop<W> {
    pub fn new(orchestrator: Arc<Orchestrator>, session: Arc<dyn SessionStore>, out: W) -> Self {
        Self {
            orchestrator,
            session,
            mode: Mode::Streamed,
            out,
            multiplexer: StreamMultiplexer::default(),
            example_input: EXAMPLE_INPUT.to_string(),
            history_preview_chars: 300,
            clear_on_exit: true,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_multiplexer(mut self, multiplexer: StreamMultiplexer) -> Self {
        self.multiplexer = multiplexer;
        self
    }

    pub fn with_example_input(mut self, input: impl Into<String>) -> Self {
        self.example_input = input.into();
        self
    }

    pub fn with_history_preview_chars(mut self, chars: usize) -> Self {
        self.history_preview_chars = chars;
        self
    }

    pub fn with_clear_on_exit(mut self, clear: bool) -> Self {
        self.clear_on_exit = clear;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// 主循环：打印帮助后逐行处理，直到 /quit、中断或输入结束
    pub async fn run<R: LineReader>(&mut self, reader: &mut R) -> io::Result<ExitReason> {
        self.out.write_all(HELP.as_bytes())?;
        writeln!(self.out)?;
        let cancel = self.cancel.clone();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                line = reader.read_line(PROMPT) => Some(line?),
            };

            let control = match line {
                None => LoopControl::Interrupted,
                Some(None) => {
                    self.finish().await;
                    return Ok(ExitReason::EndOfInput);
                }
                Some(Some(line)) => self.handle_line(&line).await?,
            };

            match control {
                LoopControl::Continue => {}
                LoopControl::Quit => {
                    writeln!(self.out, "Quitting - session will be cleared now.")?;
                    self.finish().await;
                    return Ok(ExitReason::Quit);
                }
                LoopControl::Interrupted => {
                    writeln!(self.out, "\nInterrupted - exiting. Session clear was attempted.")?;
                    self.finish().await;
                    return Ok(ExitReason::Interrupted);
                }
            }
        }
    }

    /// 处理一行输入（状态机的一次转移）
    pub async fn handle_line(&mut self, line: &str) -> io::Result<LoopControl> {
        let (command, input_error) = parse_command(line);
        if let Some(e) = input_error {
            writeln!(self.out, "[{}]", e)?;
        }

        match command {
            Command::Empty => Ok(LoopControl::Continue),
            Command::Quit => Ok(LoopControl::Quit),
            Command::Stream => {
                self.mode = Mode::Streamed;
                writeln!(self.out, "[Switched to streamed mode]")?;
                Ok(LoopControl::Continue)
            }
            Command::Once => {
                self.mode = Mode::NonStreamed;
                writeln!(self.out, "[Switched to non-streamed mode]")?;
                Ok(LoopControl::Continue)
            }
            Command::History(limit) => {
                self.print_history(limit).await?;
                Ok(LoopControl::Continue)
            }
            Command::Latest(n) => {
                self.print_latest(n).await?;
                Ok(LoopControl::Continue)
            }
            Command::Reset => {
                self.reset().await?;
                Ok(LoopControl::Continue)
            }
            Command::Example => {
                let input = self.example_input.clone();
                self.run_pipeline(&input).await
            }
            Command::Input(input) => self.run_pipeline(&input).await,
        }
    }

    async fn run_pipeline(&mut self, input: &str) -> io::Result<LoopControl> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let session = Arc::clone(&self.session);
        let cancel = self.cancel.clone();

        match self.mode {
            Mode::Streamed => {
                writeln!(self.out, "\n=== Streamed run starting ===\n")?;
                let events = orchestrator.run_streamed(input, session.as_ref());
                let outcome = self.multiplexer.render(events, &mut self.out, &cancel).await;
                if outcome.cancelled {
                    return Ok(LoopControl::Interrupted);
                }
                if let Some(e) = outcome.write_error {
                    return Err(e);
                }
                if let Some(e) = outcome.error {
                    writeln!(self.out, "\n[Pipeline failed] {}", e)?;
                }
                writeln!(self.out, "\n\n=== Streamed run complete ===\n")?;
            }
            Mode::NonStreamed => {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(LoopControl::Interrupted),
                    r = orchestrator.run(input, session.as_ref()) => r,
                };
                match result {
                    Ok(text) => {
                        writeln!(self.out, "\n=== Non-streamed final output ===\n")?;
                        writeln!(self.out, "{}", text)?;
                        writeln!(self.out, "\n=== End ===\n")?;
                    }
                    Err(e) => writeln!(self.out, "\n[Pipeline failed] {}\n", e)?,
                }
            }
        }
        Ok(LoopControl::Continue)
    }

    async fn print_history(&mut self, limit: Option<usize>) -> io::Result<()> {
        let items = match self.session.get_items(limit).await {
            Ok(items) => items,
            Err(e) => {
                writeln!(self.out, "[History unavailable] {}", e)?;
                return Ok(());
            }
        };
        writeln!(self.out, "\n--- Session history (most recent last) ---")?;
        for (idx, turn) in items.iter().enumerate() {
            let summary = summarize(&turn.content, self.history_preview_chars);
            writeln!(self.out, "{}. {}: {}", idx + 1, turn.role, summary)?;
        }
        writeln!(self.out, "--- end history ---\n")
    }

    async fn print_latest(&mut self, n: usize) -> io::Result<()> {
        let items = match self.session.get_items(Some(n)).await {
            Ok(items) => items,
            Err(e) => {
                writeln!(self.out, "[History unavailable] {}", e)?;
                return Ok(());
            }
        };
        writeln!(self.out, "\n--- Latest {} items raw ---", n)?;
        for (idx, turn) in items.iter().enumerate() {
            writeln!(self.out, "{}. role={} content={}\n", idx + 1, turn.role, turn.content)?;
        }
        Ok(())
    }

    /// /reset：清空失败时换成新的本地会话，旧历史丢失
    async fn reset(&mut self) -> io::Result<()> {
        match self.session.clear().await {
            Ok(()) => writeln!(self.out, "[Session cleared]"),
            Err(e) => {
                tracing::warn!(session = self.session.session_id(), "Session clear failed: {}", e);
                let fresh = InMemorySession::new();
                writeln!(
                    self.out,
                    "[Session clear failed ({}); previous history is lost. Created new local session object with id {}]",
                    e,
                    fresh.session_id()
                )?;
                self.session = Arc::new(fresh);
                Ok(())
            }
        }
    }

    /// 退出时尽力清空会话，不保证成功
    async fn finish(&mut self) {
        if !self.clear_on_exit {
            return;
        }
        let timeout = Duration::from_secs(EXIT_CLEAR_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, self.session.clear()).await {
            Ok(Ok(())) => tracing::info!(session = self.session.session_id(), "Session cleared on exit"),
            Ok(Err(e)) => tracing::warn!("Session clear on exit failed: {}", e),
            Err(_) => tracing::warn!("Session clear on exit timed out after {}s", EXIT_CLEAR_TIMEOUT_SECS),
        }
    }
}

fn summarize(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let head: String = content.chars().take(max_chars).collect();
    format!("{}…", head)
}
