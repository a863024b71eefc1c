//! LLM 集成模块
//!
//! 数据流：提示渲染 → 服务商调用 → 走法解析 → 回合决议（校验 / 重试 / 兜底）。

mod client;
mod engine;
mod parser;
mod prompt;

pub use client::{
    Completion, CompletionProvider, GeminiClient, OpenAiStyleClient, ProviderClient,
    ProviderConfig, ProviderError, ProviderSettings, ScriptedCall, ScriptedProvider,
    DEFAULT_TIMEOUT_SECS,
};
pub use engine::{LlmAgent, ResolveError, RetryPolicy, TurnOutcome, TurnRequest, TurnResolver};
pub use parser::{MoveCandidate, MoveParser, ParseFailure};
pub use prompt::{
    board_with_coords, format_valid_moves, piece_positions, recent_moves, PlaceholderPolicy,
    PromptContext, PromptRenderer, RenderError, PLACEHOLDERS,
};
