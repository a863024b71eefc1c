//! FEN 格式解析和生成
//!
//! 标准国际象棋 FEN：
//! `<棋盘> <走子方> <易位权> <吃过路兵格> <无吃子步数> <回合数>`

use shakmaty::fen::Fen as RawFen;
use shakmaty::{CastlingMode, Chess, EnPassantMode};

use crate::board::GameState;
use crate::error::ChessError;

/// 初始局面 FEN
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FEN 格式处理
pub struct Fen;

impl Fen {
    /// 解析 FEN 字符串为对局状态（历史为空）
    pub fn parse(fen: &str) -> Result<GameState, ChessError> {
        let raw: RawFen = fen.trim().parse().map_err(|e| ChessError::InvalidFen {
            reason: format!("{}", e),
        })?;
        let position: Chess = raw
            .into_position(CastlingMode::Standard)
            .map_err(|e| ChessError::InvalidFen {
                reason: format!("{}", e),
            })?;
        Ok(GameState::from_position(position))
    }

    /// 生成当前局面的 FEN 字符串
    pub fn to_string(state: &GameState) -> String {
        Self::from_chess(state.position())
    }

    pub(crate) fn from_chess(position: &Chess) -> String {
        RawFen::from_position(position.clone(), EnPassantMode::Legal).to_string()
    }

    /// 重复局面判定用的键：只保留棋盘、走子方、易位权与过路兵格
    pub(crate) fn position_key(position: &Chess) -> String {
        Self::from_chess(position)
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
