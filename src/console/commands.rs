//! 交互命令解析
//!
//! 命令不区分大小写；非法的数量参数不会终止循环，按默认值执行并附带 InputError 提示。

use crate::core::InputError;

/// 一行输入解析后的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// 切到流式模式
    Stream,
    /// 切到非流式模式
    Once,
    /// 最近 N 条历史，None 表示全部（/history 0 同样表示全部）
    History(Option<usize>),
    /// 最近 N 条原始条目
    Latest(usize),
    Reset,
    /// 使用示例输入运行
    Example,
    /// 作为流水线输入
    Input(String),
    Empty,
}

/// 命令帮助
pub const HELP: &str = "\
Commands:
  /example     - run example prompt
  /stream      - switch to streamed mode
  /once        - switch to non-streamed mode
  /history N   - show latest N items (omit N for all)
  /latest N    - raw latest N items (default 1)
  /reset       - clear session
  /quit        - quit and clear session
";

/// 解析一行输入；第二个返回值为参数错误（命令仍按默认参数执行）
pub fn parse_command(line: &str) -> (Command, Option<InputError>) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return (Command::Empty, None);
    }

    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    match head.as_str() {
        "/quit" => (Command::Quit, None),
        "/stream" => (Command::Stream, None),
        "/once" => (Command::Once, None),
        "/reset" => (Command::Reset, None),
        "/example" => (Command::Example, None),
        "/history" => match parse_count("/history", arg) {
            Ok(n) => (Command::History(n.filter(|&n| n > 0)), None),
            Err(e) => (Command::History(None), Some(e)),
        },
        "/latest" => match parse_count("/latest", arg) {
            Ok(n) => (Command::Latest(n.unwrap_or(1)), None),
            Err(e) => (Command::Latest(1), Some(e)),
        },
        _ => (Command::Input(line.trim_end_matches(['\r', '\n']).to_string()), None),
    }
}

fn parse_count(command: &str, arg: Option<&str>) -> Result<Option<usize>, InputError> {
    match arg {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| InputError::InvalidCount {
                command: command.to_string(),
                value: raw.to_string(),
            }),
    }
}
