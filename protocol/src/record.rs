//! 对局记录格式
//!
//! 每个回合保留全部尝试（提示、原始输出、判定、耗时），便于事后分析模型表现。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::RECORD_VERSION;
use crate::moves::{Provenance, ResolvedMove};
use crate::outcome::GameResult;
use crate::piece::Side;

/// Token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// 单次尝试的判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptVerdict {
    /// 解析成功且走法合法
    Accepted,
    /// 服务商调用失败
    ProviderError { message: String },
    /// 输出中没有 `[uci]` 格式的走法
    ParseFailure,
    /// 解析出的走法不在合法走法集合中
    IllegalMove { candidate: String },
}

/// 单次尝试记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAttempt {
    /// 尝试序号，从 1 开始
    pub attempt: u32,
    /// 本次发送的步骤提示
    pub prompt: String,
    /// 模型原始输出（服务商出错时为空）
    pub raw_response: Option<String>,
    /// 解析出的候选走法
    pub candidate: Option<String>,
    pub verdict: AttemptVerdict,
    pub latency_ms: u64,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// 单个回合记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 半回合序号，从 1 开始
    pub ply: usize,
    pub side: Side,
    /// 走子前的棋盘（模型看到的局面）
    pub board_before: String,
    pub resolved: ResolvedMove,
    pub attempts: Vec<TurnAttempt>,
    pub elapsed_ms: u64,
}

/// 走法记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub ply: usize,
    pub side: Side,
    pub uci: String,
    pub provenance: Provenance,
}

/// 对局元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchMetadata {
    /// 同一组对局共享的 ID
    pub match_id: String,
    /// 本局标签，如 "white_player_agent0"
    pub game_label: String,
    /// 白方模型名
    pub white_player: String,
    /// 黑方模型名
    pub black_player: String,
    pub white_provider: String,
    pub black_provider: String,
    pub max_plies: usize,
    pub max_retries: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// 完整的对局记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub version: String,
    pub metadata: MatchMetadata,
    /// 初始局面 FEN
    pub initial_fen: String,
    pub result: Option<GameResult>,
    pub moves: Vec<MoveRecord>,
    pub turns: Vec<TurnRecord>,
}

impl MatchRecord {
    /// 创建新的对局记录
    pub fn new(metadata: MatchMetadata, initial_fen: String) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            metadata,
            initial_fen,
            result: None,
            moves: Vec::new(),
            turns: Vec::new(),
        }
    }

    /// 添加回合（同时追加走法记录）
    pub fn add_turn(&mut self, turn: TurnRecord) {
        self.moves.push(MoveRecord {
            ply: turn.ply,
            side: turn.side,
            uci: turn.resolved.uci.clone(),
            provenance: turn.resolved.provenance,
        });
        self.turns.push(turn);
    }

    /// 设置对局结果
    pub fn set_result(&mut self, result: GameResult) {
        self.result = Some(result);
        self.metadata.finished_at = Some(Utc::now());
    }

    /// 某一方随机兜底的次数
    pub fn fallback_count(&self, side: Side) -> usize {
        self.moves
            .iter()
            .filter(|m| m.side == side && m.provenance == Provenance::FallbackRandom)
            .count()
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 文本摘要
    pub fn summary(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} ({}) vs {} ({})\n",
            self.metadata.white_player,
            self.metadata.white_provider,
            self.metadata.black_player,
            self.metadata.black_provider
        ));

        // 回合数从起始局面的 FEN 开始计，黑方先走时首行写作 `N... uci`
        let mut number = fullmove_number(&self.initial_fen);
        let mut line_open = false;
        for mv in &self.moves {
            let marker = if mv.provenance == Provenance::FallbackRandom { "*" } else { "" };
            match mv.side {
                Side::White => {
                    output.push_str(&format!("{}. {}{}", number, mv.uci, marker));
                    line_open = true;
                }
                Side::Black => {
                    if line_open {
                        output.push_str(&format!(" {}{}\n", mv.uci, marker));
                    } else {
                        output.push_str(&format!("{}... {}{}\n", number, mv.uci, marker));
                    }
                    line_open = false;
                    number += 1;
                }
            }
        }
        if line_open {
            output.push('\n');
        }

        if let Some(ref result) = self.result {
            output.push_str(&format!("Result: {}\n", result));
        }
        output.push_str(&format!(
            "Fallback moves: White {}, Black {}\n",
            self.fallback_count(Side::White),
            self.fallback_count(Side::Black)
        ));

        output
    }
}

/// FEN 第六个字段（回合数），缺失或无法解析时为 1
fn fullmove_number(fen: &str) -> u32 {
    fen.split_whitespace()
        .nth(5)
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}
