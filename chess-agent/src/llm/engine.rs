//! 回合决议引擎
//!
//! 状态机：`Requesting → Validating → {Applied | Retrying | Fallback}`。
//! - 每次尝试：渲染提示、调用服务商、解析、与合法走法集合精确比对
//! - 失败（服务商错误、解析失败、非法走法）且未超过重试上限时，附加纠正说明后立即重试
//! - 重试耗尽后从合法走法中均匀随机选取，保证每个回合必然结束

use std::time::{Duration, Instant};

use protocol::{
    AttemptVerdict, GameState, ResolvedMove, Side, TurnAttempt, DEFAULT_MAX_RETRIES,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::{
    Completion, CompletionProvider, ProviderClient, ProviderError, ProviderSettings,
};
use super::parser::MoveParser;
use super::prompt::{PromptContext, PromptRenderer, RenderError};
use crate::config::{AgentConfig, ModelParams};

/// 日志中原始响应的预览长度
const RESPONSE_PREVIEW: usize = 500;

/// 重试策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 首次请求之外的最大重试次数，0 表示首次失败即兜底
    pub max_retries: u32,
    /// 是否把纠正说明同时追加到系统提示
    pub augment_system_prompt: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            augment_system_prompt: false,
        }
    }
}

/// 回合决议中无法通过重试恢复的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// 当前局面没有合法走法，调用方应先检查终局
    #[error("No legal moves available for {side}")]
    NoLegalMoves { side: Side },

    /// 模板渲染失败
    #[error("Failed to render step-wise prompt: {0}")]
    Render(#[from] RenderError),
}

/// 参赛代理：配置 + 服务商
pub struct LlmAgent {
    config: AgentConfig,
    provider: Box<dyn CompletionProvider>,
}

impl LlmAgent {
    pub fn new(config: AgentConfig, provider: Box<dyn CompletionProvider>) -> Self {
        Self { config, provider }
    }

    /// 按配置创建真实服务商客户端
    pub fn from_config(
        config: AgentConfig,
        settings: &ProviderSettings,
    ) -> Result<Self, ProviderError> {
        let client = ProviderClient::for_agent(&config, settings)?;
        Ok(Self::new(config, Box::new(client)))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// 单次尝试的请求
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest<'a> {
    pub system_prompt: String,
    pub user_prompt: String,
    pub params: &'a ModelParams,
}

/// 回合决议结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub resolved: ResolvedMove,
    /// 全部尝试记录（按顺序）
    pub attempts: Vec<TurnAttempt>,
    pub elapsed: Duration,
}

impl TurnOutcome {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// 状态机阶段
enum Phase<'a> {
    Requesting {
        attempt: u32,
        notice: Option<String>,
    },
    Validating {
        attempt: u32,
        request: TurnRequest<'a>,
        response: Result<Completion, ProviderError>,
        latency: Duration,
    },
    Retrying {
        attempt: u32,
        reason: String,
    },
    Fallback,
    Applied(ResolvedMove),
}

/// 回合决议器
pub struct TurnResolver {
    renderer: PromptRenderer,
    policy: RetryPolicy,
    rng: ChaCha8Rng,
}

impl TurnResolver {
    /// 兜底随机数使用随机种子
    pub fn new(policy: RetryPolicy, renderer: PromptRenderer) -> Self {
        Self::with_seed(policy, renderer, rand::random())
    }

    /// 固定种子，便于复现对局
    pub fn with_seed(policy: RetryPolicy, renderer: PromptRenderer, seed: u64) -> Self {
        Self {
            renderer,
            policy,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 为当前走子方决议一个走法
    pub async fn resolve(
        &mut self,
        agent: &LlmAgent,
        state: &GameState,
    ) -> Result<TurnOutcome, ResolveError> {
        let started = Instant::now();
        let side = state.side_to_move();
        let legal = state.legal_moves();
        if legal.is_empty() {
            return Err(ResolveError::NoLegalMoves { side });
        }

        let context = PromptContext::from_state(state);
        let base_prompt = self.renderer.render(&agent.config.step_wise_prompt, &context)?;
        debug!("Step-wise prompt length: {} chars", base_prompt.len());

        let mut attempts: Vec<TurnAttempt> = Vec::new();
        let mut phase = Phase::Requesting {
            attempt: 1,
            notice: None,
        };

        let resolved = loop {
            phase = match phase {
                Phase::Requesting { attempt, notice } => {
                    info!(
                        "{} ({}) move attempt {}/{}",
                        side,
                        agent.provider.describe(),
                        attempt,
                        self.policy.max_retries + 1
                    );
                    let request = self.build_request(agent, &base_prompt, notice.as_deref());
                    let sent = Instant::now();
                    let response = agent
                        .provider
                        .complete(&request.system_prompt, &request.user_prompt, request.params)
                        .await;
                    Phase::Validating {
                        attempt,
                        request,
                        response,
                        latency: sent.elapsed(),
                    }
                }

                Phase::Validating {
                    attempt,
                    request,
                    response,
                    latency,
                } => {
                    let record = Self::validate(attempt, request, response, latency, &legal);
                    let next = match (&record.verdict, &record.candidate) {
                        (AttemptVerdict::Accepted, Some(candidate)) => {
                            info!("{} played {} on attempt {}", side, candidate, attempt);
                            Phase::Applied(ResolvedMove::from_model(candidate.clone()))
                        }
                        (verdict, _) => {
                            let reason = failure_reason(verdict);
                            warn!("{} attempt {} failed: {}", side, attempt, reason);
                            if attempt <= self.policy.max_retries {
                                Phase::Retrying { attempt, reason }
                            } else {
                                Phase::Fallback
                            }
                        }
                    };
                    attempts.push(record);
                    next
                }

                Phase::Retrying { attempt, reason } => {
                    let notice = PromptRenderer::corrective_notice(
                        attempt,
                        side.name(),
                        &reason,
                        &context.valid_moves,
                    );
                    Phase::Requesting {
                        attempt: attempt + 1,
                        notice: Some(notice),
                    }
                }

                Phase::Fallback => {
                    let choice = legal
                        .choose(&mut self.rng)
                        .cloned()
                        .ok_or(ResolveError::NoLegalMoves { side })?;
                    warn!(
                        "{} exhausted {} attempts, random fallback move selected: {}",
                        side,
                        attempts.len(),
                        choice
                    );
                    Phase::Applied(ResolvedMove::fallback(choice))
                }

                Phase::Applied(resolved) => break resolved,
            };
        };

        Ok(TurnOutcome {
            resolved,
            attempts,
            elapsed: started.elapsed(),
        })
    }

    fn build_request<'a>(
        &self,
        agent: &'a LlmAgent,
        base_prompt: &str,
        notice: Option<&str>,
    ) -> TurnRequest<'a> {
        let system = &agent.config.system_prompt;
        let (system_prompt, user_prompt) = match notice {
            None => (system.clone(), base_prompt.to_string()),
            Some(notice) => {
                let system_prompt = if self.policy.augment_system_prompt {
                    format!("{}{}", system, notice)
                } else {
                    system.clone()
                };
                (system_prompt, format!("{}{}", base_prompt, notice))
            }
        };

        TurnRequest {
            system_prompt,
            user_prompt,
            params: &agent.config.params,
        }
    }

    /// 校验一次响应，生成尝试记录
    fn validate(
        attempt: u32,
        request: TurnRequest<'_>,
        response: Result<Completion, ProviderError>,
        latency: Duration,
        legal: &[String],
    ) -> TurnAttempt {
        let latency_ms = latency.as_millis() as u64;

        let completion = match response {
            Ok(completion) => completion,
            Err(e) => {
                return TurnAttempt {
                    attempt,
                    prompt: request.user_prompt,
                    raw_response: None,
                    candidate: None,
                    verdict: AttemptVerdict::ProviderError {
                        message: e.to_string(),
                    },
                    latency_ms,
                    usage: Default::default(),
                };
            }
        };

        // 安全截取（避免切到多字节字符中间）
        let preview: String = completion.text.chars().take(RESPONSE_PREVIEW).collect();
        debug!("LLM raw response: {}", preview);

        let (candidate, verdict) = match MoveParser::parse(&completion.text) {
            Err(_) => (None, AttemptVerdict::ParseFailure),
            Ok(candidate) => {
                let uci = candidate.into_string();
                let verdict = if legal.iter().any(|m| *m == uci) {
                    AttemptVerdict::Accepted
                } else {
                    AttemptVerdict::IllegalMove {
                        candidate: uci.clone(),
                    }
                };
                (Some(uci), verdict)
            }
        };

        TurnAttempt {
            attempt,
            prompt: request.user_prompt,
            raw_response: Some(completion.text),
            candidate,
            verdict,
            latency_ms,
            usage: completion.usage,
        }
    }
}

/// 写入纠正说明的失败原因
fn failure_reason(verdict: &AttemptVerdict) -> String {
    match verdict {
        AttemptVerdict::ProviderError { .. } => "the model request failed".to_string(),
        AttemptVerdict::ParseFailure => "no move in the format [UCI_MOVE] was found".to_string(),
        AttemptVerdict::IllegalMove { candidate } => {
            format!("{} is not a valid move", MoveParser::bracket(candidate))
        }
        AttemptVerdict::Accepted => "the move was accepted".to_string(),
    }
}
