//! 对局控制
//!
//! 两个代理轮流走子，直到规则引擎判定终局或达到步数上限。
//! 单局严格串行：任何时刻最多一个未完成的服务商请求。

use std::time::Instant;

use chess_agent::llm::board_with_coords;
use chess_agent::{LlmAgent, ResolveError, TurnResolver};
use chrono::Utc;
use protocol::{
    ChessError, Fen, GameResult, GameState, MatchMetadata, MatchRecord, ResolvedMove, Side,
    TurnRecord,
};
use thiserror::Error;
use tracing::{debug, error, info};

/// 对局中不可恢复的错误
#[derive(Error, Debug)]
pub enum MatchError {
    /// 已通过校验的走法被规则引擎拒绝
    #[error("Rules engine rejected validated move {uci}: {source}")]
    RulesEngineInconsistency {
        uci: String,
        #[source]
        source: ChessError,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// 对局结果报告
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub result: GameResult,
    /// 按顺序应用的全部走法
    pub history: Vec<ResolvedMove>,
    /// 完整记录（含每回合的尝试）
    pub record: MatchRecord,
}

impl MatchReport {
    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    /// 某方随机兜底的次数
    pub fn fallback_count(&self, side: Side) -> usize {
        self.record.fallback_count(side)
    }
}

/// 对局运行器
pub struct MatchRunner {
    white: LlmAgent,
    black: LlmAgent,
    resolver: TurnResolver,
    state: GameState,
    max_plies: usize,
    match_id: String,
    game_label: String,
}

impl MatchRunner {
    pub fn new(
        white: LlmAgent,
        black: LlmAgent,
        resolver: TurnResolver,
        state: GameState,
        max_plies: usize,
    ) -> Self {
        Self {
            white,
            black,
            resolver,
            state,
            max_plies,
            match_id: uuid::Uuid::new_v4().to_string(),
            game_label: "game".to_string(),
        }
    }

    /// 设置比赛 ID 与对局标签（结果目录名）
    pub fn with_labels(mut self, match_id: impl Into<String>, game_label: impl Into<String>) -> Self {
        self.match_id = match_id.into();
        self.game_label = game_label.into();
        self
    }

    fn metadata(&self) -> MatchMetadata {
        let white = self.white.config();
        let black = self.black.config();
        MatchMetadata {
            match_id: self.match_id.clone(),
            game_label: self.game_label.clone(),
            white_player: white.model.clone(),
            black_player: black.model.clone(),
            white_provider: white.provider.to_string(),
            black_provider: black.provider.to_string(),
            max_plies: self.max_plies,
            max_retries: self.resolver.policy().max_retries,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// 运行整局
    pub async fn run(mut self) -> Result<MatchReport, MatchError> {
        let mut record = MatchRecord::new(self.metadata(), Fen::to_string(&self.state));
        let mut history = Vec::new();

        info!(
            "Match {} / {}: White {} vs Black {}",
            self.match_id,
            self.game_label,
            self.white.config().display_name(),
            self.black.config().display_name()
        );

        let result = loop {
            if let Some(result) = self.state.outcome() {
                break result;
            }
            if self.state.ply_count() >= self.max_plies {
                info!("Ply ceiling {} reached", self.max_plies);
                break GameResult::Undecided;
            }

            let side = self.state.side_to_move();
            let agent = match side {
                Side::White => &self.white,
                Side::Black => &self.black,
            };
            let ply = self.state.ply_count() + 1;
            let board_before = board_with_coords(&self.state);
            debug!("Ply {} ({}), board before move:\n{}", ply, side, board_before);

            let started = Instant::now();
            let outcome = self.resolver.resolve(agent, &self.state).await?;
            apply_resolved(&mut self.state, &outcome.resolved, ply)?;

            info!(
                "Ply {} | {} -> {} ({} attempt(s){})",
                ply,
                side,
                outcome.resolved.uci,
                outcome.attempts.len(),
                if outcome.resolved.is_fallback() { ", random fallback" } else { "" }
            );

            history.push(outcome.resolved.clone());
            record.add_turn(TurnRecord {
                ply,
                side,
                board_before,
                resolved: outcome.resolved,
                attempts: outcome.attempts,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        };

        info!(
            "Match {} / {} finished after {} plies: {}",
            self.match_id,
            self.game_label,
            history.len(),
            result
        );
        record.set_result(result.clone());

        Ok(MatchReport {
            result,
            history,
            record,
        })
    }
}

/// 把决议出的走法交给规则引擎；被拒绝说明校验与规则不一致，对局中止
fn apply_resolved(state: &mut GameState, mv: &ResolvedMove, ply: usize) -> Result<(), MatchError> {
    state.apply(&mv.uci).map_err(|source| {
        error!("Rules engine rejected {} at ply {}: {}", mv.uci, ply, source);
        MatchError::RulesEngineInconsistency {
            uci: mv.uci.clone(),
            source,
        }
    })
}
