//! 后端预设与解析（OpenAI 兼容格式）
//!
//! - DeepSeek: https://api.deepseek.com/v1, deepseek-chat
//! - Gemini:   https://generativelanguage.googleapis.com/v1beta/openai/, gemini-2.0-flash
//! - OpenAI:   默认端点, gpt-4o-mini
//!
//! 优先级：环境变量 API_KEY / BASE_URL / MODEL_ID > [stages.*] > [llm] > provider 预设。

use crate::config::{LlmSection, StageOverride};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH: &str = "gemini-2.0-flash";
pub const OPENAI_MINI: &str = "gpt-4o-mini";

/// 后端提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    DeepSeek,
    Gemini,
    OpenAi,
    Mock,
}

impl Provider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "deepseek" => Some(Provider::DeepSeek),
            "gemini" | "google" => Some(Provider::Gemini),
            "openai" => Some(Provider::OpenAi),
            "mock" => Some(Provider::Mock),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::DeepSeek => Some(DEEPSEEK_BASE_URL),
            Provider::Gemini => Some(GEMINI_BASE_URL),
            Provider::OpenAi | Provider::Mock => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::DeepSeek => DEEPSEEK_CHAT,
            Provider::Gemini => GEMINI_FLASH,
            Provider::OpenAi => OPENAI_MINI,
            Provider::Mock => "mock",
        }
    }

    /// provider 专属的 Key 环境变量（API_KEY 缺省时回退）
    pub fn key_env(&self) -> Option<&'static str> {
        match self {
            Provider::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Mock => None,
        }
    }
}

/// 某个阶段最终使用的后端
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub provider: Provider,
    pub model: String,
    pub base_url: Option<String>,
    /// None 时调用方回退到 Mock
    pub api_key: Option<String>,
}

/// 解析单个阶段的后端；env 用于读取环境变量（测试时可注入）
pub fn resolve_backend(
    llm: &LlmSection,
    stage: &StageOverride,
    env: impl Fn(&str) -> Option<String>,
) -> BackendSettings {
    let provider_name = stage.provider.as_deref().unwrap_or(&llm.provider);
    let provider = Provider::parse(provider_name).unwrap_or_else(|| {
        tracing::warn!("Unknown provider '{}', using mock", provider_name);
        Provider::Mock
    });

    if provider == Provider::Mock {
        return BackendSettings {
            provider,
            model: provider.default_model().to_string(),
            base_url: None,
            api_key: None,
        };
    }

    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let api_key = non_empty(env("API_KEY"))
        .or_else(|| provider.key_env().and_then(|k| non_empty(env(k))));
    let base_url = non_empty(env("BASE_URL"))
        .or_else(|| stage.base_url.clone())
        .or_else(|| llm.base_url.clone())
        .or_else(|| provider.default_base_url().map(String::from));
    let model = non_empty(env("MODEL_ID"))
        .or_else(|| stage.model.clone())
        .or_else(|| llm.model.clone())
        .unwrap_or_else(|| provider.default_model().to_string());

    BackendSettings {
        provider,
        model,
        base_url,
        api_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_provider_presets() {
        let llm = LlmSection::default();
        let stage = StageOverride {
            provider: Some("gemini".to_string()),
            ..Default::default()
        };
        let b = resolve_backend(&llm, &stage, env_of(&[("GEMINI_API_KEY", "g-key")]));
        assert_eq!(b.provider, Provider::Gemini);
        assert_eq!(b.model, GEMINI_FLASH);
        assert_eq!(b.base_url.as_deref(), Some(GEMINI_BASE_URL));
        assert_eq!(b.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_env_takes_precedence() {
        let llm = LlmSection {
            model: Some("from-config".to_string()),
            ..Default::default()
        };
        let stage = StageOverride::default();
        let b = resolve_backend(
            &llm,
            &stage,
            env_of(&[
                ("API_KEY", "k"),
                ("DEEPSEEK_API_KEY", "ignored"),
                ("BASE_URL", "http://localhost:8080/v1"),
                ("MODEL_ID", "local-model"),
            ]),
        );
        assert_eq!(b.provider, Provider::DeepSeek);
        assert_eq!(b.api_key.as_deref(), Some("k"));
        assert_eq!(b.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(b.model, "local-model");
    }

    #[test]
    fn test_missing_key_and_unknown_provider() {
        let llm = LlmSection::default();
        let b = resolve_backend(&llm, &StageOverride::default(), env_of(&[]));
        assert_eq!(b.provider, Provider::DeepSeek);
        assert!(b.api_key.is_none());

        let stage = StageOverride {
            provider: Some("nonsense".to_string()),
            ..Default::default()
        };
        let b = resolve_backend(&llm, &stage, env_of(&[("API_KEY", "k")]));
        assert_eq!(b.provider, Provider::Mock);
        assert!(b.api_key.is_none());
    }
}
