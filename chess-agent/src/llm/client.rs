//! LLM 服务商客户端
//!
//! 把不同服务商的调用约定统一为 `complete(system, user, params) -> text`：
//! - OpenAI / OpenRouter：chat completions，参数平铺在请求体顶层
//! - Gemini：generateContent，参数嵌套在 `generationConfig` 中
//!
//! 服务商分支只存在于本模块内。

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use protocol::TokenUsage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{AgentConfig, ModelParams, ProviderKind};

/// 默认请求超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// 错误响应体在错误信息中保留的最大字符数
const ERROR_BODY_PREVIEW: usize = 500;

/// 服务商调用错误
#[derive(Error, Debug)]
pub enum ProviderError {
    /// 未配置 API key
    #[error("Missing API key: set the {var} environment variable")]
    MissingApiKey { var: String },

    /// 网络错误或超时
    #[error("Network error: {0}")]
    Network(String),

    /// 认证失败
    #[error("Authentication failed (HTTP {status})")]
    Auth { status: u16 },

    /// 其他非成功状态码
    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 响应体无法解析或缺少内容
    #[error("Malformed provider response: {0}")]
    Malformed(String),

    /// 预置响应已用完
    #[error("Scripted provider has no responses left")]
    Exhausted,

    /// 未启用 llm feature
    #[error("LLM feature not enabled. Compile with --features llm")]
    Disabled,
}

/// 一次补全的结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// 统一的补全接口
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 发送一次补全请求
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &ModelParams,
    ) -> Result<Completion, ProviderError>;

    /// 日志中使用的描述
    fn describe(&self) -> String;
}

/// 服务商公共设置（来自配置文件的 `providers` 段）
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// 单次请求超时（秒），这是系统中唯一的时间上限
    pub timeout_secs: u64,
    pub openai_base_url: Option<String>,
    pub openrouter_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            openai_base_url: None,
            openrouter_base_url: None,
            gemini_base_url: None,
        }
    }
}

impl ProviderSettings {
    fn base_url_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAI => self.openai_base_url.as_deref(),
            ProviderKind::OpenRouter => self.openrouter_base_url.as_deref(),
            ProviderKind::Gemini => self.gemini_base_url.as_deref(),
        }
    }
}

/// 单个客户端的连接配置
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// 使用默认地址，API key 从环境变量读取
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            base_url: kind.default_base_url().to_string(),
            api_key: std::env::var(kind.api_key_env())
                .ok()
                .filter(|key| !key.trim().is_empty()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// 根据代理配置与公共设置构建
    pub fn for_agent(agent: &AgentConfig, settings: &ProviderSettings) -> Self {
        let mut config = Self::new(agent.provider, agent.model.clone());
        if let Some(url) = settings.base_url_for(agent.provider) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        config.timeout_secs = settings.timeout_secs;
        config
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn require_api_key(&self) -> Result<String, ProviderError> {
        self.api_key.clone().ok_or_else(|| ProviderError::MissingApiKey {
            var: self.kind.api_key_env().to_string(),
        })
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ============================================================================
// OpenAI 风格（OpenAI / OpenRouter）
// ============================================================================

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// OpenAI 风格客户端
pub struct OpenAiStyleClient {
    config: ProviderConfig,
    api_key: String,
    #[cfg(feature = "llm")]
    http: reqwest::Client,
}

impl OpenAiStyleClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config.require_api_key()?;
        Ok(Self {
            #[cfg(feature = "llm")]
            http: build_http_client(config.timeout_secs)?,
            config,
            api_key,
        })
    }

    /// 构建请求体：参数平铺在顶层，`model` 与 `messages` 不允许被覆盖
    pub fn request_body(&self, system_prompt: &str, user_prompt: &str, params: &ModelParams) -> Value {
        let mut body: Map<String, Value> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": user_prompt }));

        body.insert("model".to_string(), json!(self.config.model));
        body.insert("messages".to_string(), Value::Array(messages));
        Value::Object(body)
    }

    /// 解析响应体
    pub fn parse_response(body: &str) -> Result<Completion, ProviderError> {
        let resp: ChatResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::Malformed(format!("invalid JSON: {}", e)))?;

        if let Some(error) = resp.error {
            return Err(ProviderError::Malformed(format!("error object in response: {}", error)));
        }

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Malformed("no message content in choices".to_string()))?;

        let usage = resp
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    #[cfg(feature = "llm")]
    async fn send(&self, body: &Value) -> Result<String, ProviderError> {
        let request = self.http.post(self.endpoint()).bearer_auth(&self.api_key);
        send_json(request, body).await
    }

    #[cfg(not(feature = "llm"))]
    async fn send(&self, _body: &Value) -> Result<String, ProviderError> {
        let _ = (self.endpoint(), &self.api_key);
        Err(ProviderError::Disabled)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiStyleClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &ModelParams,
    ) -> Result<Completion, ProviderError> {
        let body = self.request_body(system_prompt, user_prompt, params);
        debug!(
            "Sending request to {}: model={}, prompt_len={}",
            self.config.kind,
            self.config.model,
            user_prompt.len()
        );
        let text = self.send(&body).await?;
        let completion = Self::parse_response(&text)?;
        info!(
            "{} response: tokens={}",
            self.config.kind, completion.usage.total_tokens
        );
        Ok(completion)
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.config.kind, self.config.model)
    }
}

// ============================================================================
// Gemini 风格
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

/// Gemini 客户端
pub struct GeminiClient {
    config: ProviderConfig,
    api_key: String,
    #[cfg(feature = "llm")]
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config.require_api_key()?;
        Ok(Self {
            #[cfg(feature = "llm")]
            http: build_http_client(config.timeout_secs)?,
            config,
            api_key,
        })
    }

    /// 构建请求体：参数整体作为 `generationConfig`，为空时省略
    pub fn request_body(&self, system_prompt: &str, user_prompt: &str, params: &ModelParams) -> Value {
        let mut body = Map::new();
        if !system_prompt.is_empty() {
            body.insert(
                "systemInstruction".to_string(),
                json!({ "parts": [{ "text": system_prompt }] }),
            );
        }
        body.insert(
            "contents".to_string(),
            json!([{ "role": "user", "parts": [{ "text": user_prompt }] }]),
        );
        if !params.is_empty() {
            let generation_config: Map<String, Value> = params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            body.insert("generationConfig".to_string(), Value::Object(generation_config));
        }
        Value::Object(body)
    }

    /// 解析响应体，拼接首个候选的全部文本片段
    pub fn parse_response(body: &str) -> Result<Completion, ProviderError> {
        let resp: GeminiResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::Malformed(format!("invalid JSON: {}", e)))?;

        let parts = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .ok_or_else(|| ProviderError::Malformed("no candidates in response".to_string()))?;

        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            return Err(ProviderError::Malformed("candidate has no text parts".to_string()));
        }

        let usage = resp
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.config.base_url, self.config.model)
    }

    #[cfg(feature = "llm")]
    async fn send(&self, body: &Value) -> Result<String, ProviderError> {
        let request = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);
        send_json(request, body).await
    }

    #[cfg(not(feature = "llm"))]
    async fn send(&self, _body: &Value) -> Result<String, ProviderError> {
        let _ = (self.endpoint(), &self.api_key);
        Err(ProviderError::Disabled)
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &ModelParams,
    ) -> Result<Completion, ProviderError> {
        let body = self.request_body(system_prompt, user_prompt, params);
        debug!(
            "Sending request to Gemini: model={}, prompt_len={}",
            self.config.model,
            user_prompt.len()
        );
        let text = self.send(&body).await?;
        let completion = Self::parse_response(&text)?;
        info!("Gemini response: tokens={}", completion.usage.total_tokens);
        Ok(completion)
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.config.kind, self.config.model)
    }
}

#[cfg(feature = "llm")]
fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {}", e)))
}

#[cfg(feature = "llm")]
async fn send_json(request: reqwest::RequestBuilder, body: &Value) -> Result<String, ProviderError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::Network(format!("failed to read response body: {}", e)))?;

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ProviderError::Auth {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
            body: text.chars().take(ERROR_BODY_PREVIEW).collect(),
        });
    }

    // 安全截取（避免切到多字节字符中间）
    let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
    debug!("Raw provider response: {}", preview);

    Ok(text)
}

// ============================================================================
// 统一入口
// ============================================================================

/// 服务商客户端：按调用约定分为两类
pub enum ProviderClient {
    /// OpenAI / OpenRouter
    OpenAiStyle(OpenAiStyleClient),
    /// Gemini
    Gemini(GeminiClient),
}

impl ProviderClient {
    /// 根据服务商类型创建客户端
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        match config.kind {
            ProviderKind::OpenAI | ProviderKind::OpenRouter => {
                Ok(Self::OpenAiStyle(OpenAiStyleClient::new(config)?))
            }
            ProviderKind::Gemini => Ok(Self::Gemini(GeminiClient::new(config)?)),
        }
    }

    /// 为代理创建客户端
    pub fn for_agent(agent: &AgentConfig, settings: &ProviderSettings) -> Result<Self, ProviderError> {
        Self::new(ProviderConfig::for_agent(agent, settings))
    }
}

#[async_trait]
impl CompletionProvider for ProviderClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &ModelParams,
    ) -> Result<Completion, ProviderError> {
        match self {
            Self::OpenAiStyle(client) => client.complete(system_prompt, user_prompt, params).await,
            Self::Gemini(client) => client.complete(system_prompt, user_prompt, params).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::OpenAiStyle(client) => client.describe(),
            Self::Gemini(client) => client.describe(),
        }
    }
}

// ============================================================================
// 预置响应（离线运行与测试）
// ============================================================================

/// 一次被记录的调用
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptedCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub params: ModelParams,
}

/// 按顺序返回预置响应的服务商
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    /// 预置响应用完后重复返回的文本
    repeat: Option<String>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedProvider {
    pub fn new(responses: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            name: "scripted".to_string(),
            script: Mutex::new(responses.into_iter().collect()),
            repeat: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 全部为成功响应
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(t.into())))
    }

    /// 永远返回同一段文本
    pub fn repeating(text: impl Into<String>) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(text.into());
        provider
    }

    /// 已记录的调用
    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &ModelParams,
    ) -> Result<Completion, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ScriptedCall {
                system_prompt: system_prompt.to_string(),
                user_prompt: user_prompt.to_string(),
                params: params.clone(),
            });

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(result) => result.map(Completion::new),
            None => self
                .repeat
                .clone()
                .map(Completion::new)
                .ok_or(ProviderError::Exhausted),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ModelParams {
        let mut params = ModelParams::new();
        params.insert("temperature".to_string(), json!(0.7));
        params.insert("max_tokens".to_string(), json!(512));
        params
    }

    fn openai_client() -> OpenAiStyleClient {
        let config = ProviderConfig::new(ProviderKind::OpenAI, "gpt-4o-mini").with_api_key("sk-test");
        OpenAiStyleClient::new(config).unwrap()
    }

    fn gemini_client() -> GeminiClient {
        let config = ProviderConfig::new(ProviderKind::Gemini, "gemini-2.5-flash").with_api_key("g-test");
        GeminiClient::new(config).unwrap()
    }

    #[test]
    fn test_openai_body_flattens_params() {
        let body = openai_client().request_body("sys", "user", &params());

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
    }

    #[test]
    fn test_openai_body_params_cannot_override_model() {
        let mut params = params();
        params.insert("model".to_string(), json!("other"));
        let body = openai_client().request_body("", "user", &params);

        assert_eq!(body["model"], "gpt-4o-mini");
        // 系统提示为空时只发送用户消息
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_gemini_body_nests_generation_config() {
        let body = gemini_client().request_body("sys", "user", &params());

        assert_eq!(body["generationConfig"]["temperature"], 0.7);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "user");

        let body = gemini_client().request_body("sys", "user", &ModelParams::new());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_openai_parse_response() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "I'll play [e2e4]."}}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 8, "total_tokens": 108}
        }"#;
        let completion = OpenAiStyleClient::parse_response(body).unwrap();
        assert_eq!(completion.text, "I'll play [e2e4].");
        assert_eq!(completion.usage.total_tokens, 108);
    }

    #[test]
    fn test_openai_parse_errors() {
        assert!(matches!(
            OpenAiStyleClient::parse_response("not json"),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            OpenAiStyleClient::parse_response(r#"{"choices": []}"#),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            OpenAiStyleClient::parse_response(r#"{"error": {"message": "rate limited"}}"#),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            OpenAiStyleClient::parse_response(r#"{"choices": [{"message": {"content": null}}]}"#),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_gemini_parse_response() {
        let body = r#"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Thinking... "}, {"text": "[d2d4]"}]}}],
            "usageMetadata": {"promptTokenCount": 50, "candidatesTokenCount": 5, "totalTokenCount": 55}
        }"#;
        let completion = GeminiClient::parse_response(body).unwrap();
        assert_eq!(completion.text, "Thinking... [d2d4]");
        assert_eq!(completion.usage.input_tokens, 50);

        assert!(GeminiClient::parse_response(r#"{"candidates": []}"#).is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = ProviderConfig::new(ProviderKind::OpenRouter, "x-ai/grok-4-fast");
        config.api_key = None;
        let result = ProviderClient::new(config);
        assert!(matches!(
            result,
            Err(ProviderError::MissingApiKey { ref var }) if var == "OPENROUTER_API_KEY"
        ));
    }

    #[test]
    fn test_client_dispatch_and_base_url_override() {
        let agent = AgentConfig::new(ProviderKind::OpenRouter, "deepseek/deepseek-chat-v3.1");
        let settings = ProviderSettings {
            openrouter_base_url: Some("http://localhost:8080/v1/".to_string()),
            ..ProviderSettings::default()
        };
        let config = ProviderConfig::for_agent(&agent, &settings).with_api_key("k");
        assert_eq!(config.base_url, "http://localhost:8080/v1");

        let client = ProviderClient::new(config).unwrap();
        assert!(matches!(client, ProviderClient::OpenAiStyle(_)));
        assert_eq!(client.describe(), "OpenRouter:deepseek/deepseek-chat-v3.1");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::new(ProviderKind::OpenAI, "gpt-4o-mini").with_api_key("sk-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_scripted_provider_sequence() {
        let provider = ScriptedProvider::new(vec![
            Ok("[e2e4]".to_string()),
            Err(ProviderError::Network("timeout".to_string())),
        ]);

        let first = provider.complete("s", "u1", &params()).await.unwrap();
        assert_eq!(first.text, "[e2e4]");
        assert!(provider.complete("s", "u2", &params()).await.is_err());
        assert!(matches!(
            provider.complete("s", "u3", &params()).await,
            Err(ProviderError::Exhausted)
        ));

        let calls = provider.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].user_prompt, "u2");
        assert_eq!(calls[0].params, params());
    }

    #[tokio::test]
    async fn test_scripted_provider_repeating() {
        let provider = ScriptedProvider::repeating("[z9z9]");
        for _ in 0..3 {
            let completion = provider.complete("", "u", &ModelParams::new()).await.unwrap();
            assert_eq!(completion.text, "[z9z9]");
        }
        assert_eq!(provider.call_count(), 3);
    }
}
