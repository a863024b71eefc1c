//! 错误类型定义

use thiserror::Error;

/// 国际象棋规则错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    /// 不是合法的 UCI 字符串
    #[error("Invalid UCI move: {uci}")]
    InvalidUci { uci: String },

    /// 格式正确但在当前局面不合法
    #[error("Illegal move in current position: {uci}")]
    IllegalMove { uci: String },

    /// 无效的 FEN 字符串
    #[error("Invalid FEN string: {reason}")]
    InvalidFen { reason: String },

    /// 游戏已结束
    #[error("Game is already over")]
    GameOver,
}

/// 规则操作结果类型
pub type Result<T> = std::result::Result<T, ChessError>;
