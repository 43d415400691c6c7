//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PRICER__*` 覆盖（双下划线表示嵌套，如 `PRICER__LLM__PROVIDER=gemini`）。
//! 凭据与端点另由 `API_KEY` / `BASE_URL` / `MODEL_ID` 直接覆盖，见 [`crate::llm::resolve_backend`]。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub stages: StagesSection,
    pub session: SessionSection,
}

/// [app] 段：应用名、日志级别、历史展示与上下文轮数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 默认日志级别（RUST_LOG 优先）
    pub log_level: String,
    /// /history 每条内容的最大展示字符数
    pub history_preview_chars: usize,
    /// 流式模式下 Tool output 注释的最大字符数，0 表示不截断
    pub tool_output_preview_chars: usize,
    /// 交给各阶段作为上下文的最近会话条数
    pub max_context_turns: usize,
    /// 退出时是否尝试清空会话（尽力而为）
    pub clear_session_on_exit: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            log_level: "warn".to_string(),
            history_preview_chars: 300,
            tool_output_preview_chars: 400,
            max_context_turns: 20,
            clear_session_on_exit: true,
        }
    }
}

/// [llm] 段：默认后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / gemini / openai / mock
    pub provider: String,
    /// 未设置时使用 provider 的默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: None,
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单个阶段调用（或流式两段之间）的超时秒数
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [stages.*] 段：按阶段覆盖后端
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StagesSection {
    pub behavior: StageOverride,
    pub profitability: StageOverride,
    pub recommendation: StageOverride,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StageOverride {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// [session] 段：会话存储后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// memory / sqlite
    pub backend: String,
    /// sqlite 文件路径
    pub path: PathBuf,
    /// 恢复已有会话（仅 sqlite 有意义）；未设置时新建
    pub id: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            path: PathBuf::from("data/sessions.db"),
            id: None,
        }
    }
}

/// 从 config 目录加载配置，环境变量 PRICER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PRICER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PRICER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "deepseek");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.app.max_context_turns, 20);
        assert_eq!(cfg.session.backend, "memory");
        assert!(cfg.app.clear_session_on_exit);
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"gemini\"\n\n[stages.profitability]\nprovider = \"deepseek\"\nmodel = \"deepseek-chat\"\n\n[session]\nbackend = \"sqlite\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.stages.profitability.provider.as_deref(), Some("deepseek"));
        assert_eq!(cfg.stages.profitability.model.as_deref(), Some("deepseek-chat"));
        assert!(cfg.stages.behavior.provider.is_none());
        assert_eq!(cfg.session.backend, "sqlite");
        // 未出现的段保持默认
        assert_eq!(cfg.app.history_preview_chars, 300);
    }
}
