//! 对局结果

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::piece::Side;

/// 对局结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// 白方胜
    WhiteWin(WinReason),
    /// 黑方胜
    BlackWin(WinReason),
    /// 和棋
    Draw(DrawReason),
    /// 达到半回合上限仍未分出结果
    Undecided,
}

/// 胜利原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinReason {
    /// 将死
    Checkmate,
}

/// 和棋原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawReason {
    /// 无子可动（逼和）
    Stalemate,
    /// 子力不足
    InsufficientMaterial,
    /// 同一局面出现五次
    FivefoldRepetition,
    /// 七十五回合无吃子无动兵
    SeventyFiveMoves,
}

impl GameResult {
    pub fn win(side: Side, reason: WinReason) -> Self {
        match side {
            Side::White => GameResult::WhiteWin(reason),
            Side::Black => GameResult::BlackWin(reason),
        }
    }

    /// 胜方（和棋或未决返回 None）
    pub fn winner(&self) -> Option<Side> {
        match self {
            GameResult::WhiteWin(_) => Some(Side::White),
            GameResult::BlackWin(_) => Some(Side::Black),
            GameResult::Draw(_) | GameResult::Undecided => None,
        }
    }

    pub fn is_undecided(&self) -> bool {
        matches!(self, GameResult::Undecided)
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::WhiteWin(reason) => write!(f, "White wins ({:?})", reason),
            GameResult::BlackWin(reason) => write!(f, "Black wins ({:?})", reason),
            GameResult::Draw(reason) => write!(f, "Draw ({:?})", reason),
            GameResult::Undecided => write!(f, "Undecided (ply ceiling reached)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner() {
        assert_eq!(GameResult::win(Side::Black, WinReason::Checkmate).winner(), Some(Side::Black));
        assert_eq!(GameResult::Draw(DrawReason::Stalemate).winner(), None);
        assert!(GameResult::Undecided.is_undecided());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            GameResult::WhiteWin(WinReason::Checkmate).to_string(),
            "White wins (Checkmate)"
        );
        assert!(GameResult::Undecided.to_string().contains("ceiling"));
    }
}
