//! 代理配置
//!
//! 每个代理在启动时构建一次，之后只读。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 模型参数：原样透传给服务商，不做任何校验
pub type ModelParams = BTreeMap<String, serde_json::Value>;

/// LLM 服务商
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    OpenAI,
    OpenRouter,
    Gemini,
}

impl ProviderKind {
    /// 读取 API key 的环境变量名
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    /// 默认 API 地址
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个代理的配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    pub provider: ProviderKind,
    /// 模型名，如 "gpt-4o-mini"、"google/gemini-2.5-flash"
    pub model: String,
    #[serde(default)]
    pub params: ModelParams,
    /// 系统提示（原样发送）
    pub system_prompt: String,
    /// 每步的提示模板，支持 `{role}`、`{board}` 等占位符
    pub step_wise_prompt: String,
}

impl AgentConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            params: ModelParams::new(),
            system_prompt: String::new(),
            step_wise_prompt: String::new(),
        }
    }

    pub fn with_prompts(
        mut self,
        system_prompt: impl Into<String>,
        step_wise_prompt: impl Into<String>,
    ) -> Self {
        self.system_prompt = system_prompt.into();
        self.step_wise_prompt = step_wise_prompt.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// 日志与记录中使用的显示名
    pub fn display_name(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_kind_serde_names() {
        let kind: ProviderKind = serde_json::from_str("\"OpenRouter\"").unwrap();
        assert_eq!(kind, ProviderKind::OpenRouter);
        assert!(serde_json::from_str::<ProviderKind>("\"Ollama\"").is_err());
    }

    #[test]
    fn test_agent_config_builder() {
        let config = AgentConfig::new(ProviderKind::OpenAI, "gpt-4o-mini")
            .with_prompts("You are a chess player.", "Play as {role}")
            .with_param("temperature", json!(0.6));

        assert_eq!(config.params.get("temperature"), Some(&json!(0.6)));
        assert_eq!(config.display_name(), "OpenAI:gpt-4o-mini");
        assert_eq!(config.provider.api_key_env(), "OPENAI_API_KEY");
    }
}
