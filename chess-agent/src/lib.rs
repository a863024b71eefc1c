//! 国际象棋 LLM 代理
//!
//! 包含:
//! - 代理配置 (AgentConfig)
//! - 多服务商适配 (OpenAI / OpenRouter / Gemini)
//! - 提示模板渲染
//! - 走法解析
//! - 回合决议：重试与随机兜底

mod config;
pub mod llm;

pub use config::{AgentConfig, ModelParams, ProviderKind};
pub use llm::{
    Completion, CompletionProvider, LlmAgent, MoveCandidate, MoveParser, ParseFailure,
    PlaceholderPolicy, PromptContext, PromptRenderer, ProviderClient, ProviderConfig,
    ProviderError, ProviderSettings, RenderError, ResolveError, RetryPolicy, ScriptedProvider,
    TurnOutcome, TurnRequest, TurnResolver,
};
