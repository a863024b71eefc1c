//! 对局状态
//!
//! 对 shakmaty 规则引擎的薄封装：合法走法集合、落子、终局判定，
//! 并额外维护走法历史与重复局面计数。

use std::collections::HashMap;

use shakmaty::uci::Uci;
use shakmaty::{CastlingMode, Chess, Position, Square};
use tracing::debug;

use crate::constants::{BOARD_SIZE, REPETITION_DRAW_COUNT, SEVENTY_FIVE_MOVE_HALFMOVES};
use crate::error::ChessError;
use crate::fen::Fen;
use crate::outcome::{DrawReason, GameResult, WinReason};
use crate::piece::{Piece, Side};

/// 对局状态
#[derive(Debug, Clone)]
pub struct GameState {
    position: Chess,
    /// 已走过的 UCI 走法（按时间顺序）
    history: Vec<String>,
    /// 局面键 -> 出现次数
    repetitions: HashMap<String, u32>,
}

impl GameState {
    /// 标准初始局面
    pub fn initial() -> Self {
        Self::from_position(Chess::default())
    }

    /// 从任意局面开始（历史为空）
    pub fn from_position(position: Chess) -> Self {
        let mut repetitions = HashMap::new();
        repetitions.insert(Fen::position_key(&position), 1);
        Self {
            position,
            history: Vec::new(),
            repetitions,
        }
    }

    /// 底层规则引擎局面
    pub fn position(&self) -> &Chess {
        &self.position
    }

    /// 当前走子方
    pub fn side_to_move(&self) -> Side {
        self.position.turn().into()
    }

    /// 已走半回合数
    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    /// 完整走法历史
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// 上一步走法
    pub fn last_move(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    /// 当前局面所有合法走法（UCI，按引擎生成顺序）
    pub fn legal_moves(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .iter()
            .map(|m| m.to_uci(CastlingMode::Standard).to_string())
            .collect()
    }

    /// 检查走法是否在当前合法走法集合中（大小写敏感）
    pub fn is_legal(&self, uci: &str) -> bool {
        self.legal_moves().iter().any(|m| m == uci)
    }

    /// 落子：只接受合法走法集合中的规范 UCI 写法
    pub fn apply(&mut self, uci: &str) -> Result<(), ChessError> {
        if self.is_terminal() {
            return Err(ChessError::GameOver);
        }

        let parsed: Uci = uci.parse().map_err(|_| ChessError::InvalidUci {
            uci: uci.to_string(),
        })?;
        let mv = parsed
            .to_move(&self.position)
            .map_err(|_| ChessError::IllegalMove {
                uci: uci.to_string(),
            })?;
        // shakmaty 也接受王吃车式易位（e1h1），这里只认标准写法
        if !self.is_legal(uci) {
            return Err(ChessError::IllegalMove {
                uci: uci.to_string(),
            });
        }

        self.position.play_unchecked(&mv);
        self.history.push(uci.to_string());
        *self
            .repetitions
            .entry(Fen::position_key(&self.position))
            .or_insert(0) += 1;

        debug!("Applied move {} (ply {})", uci, self.history.len());
        Ok(())
    }

    /// 规则引擎给出的终局结果（未结束返回 None）
    pub fn outcome(&self) -> Option<GameResult> {
        if self.position.is_checkmate() {
            let winner = self.side_to_move().opponent();
            return Some(GameResult::win(winner, WinReason::Checkmate));
        }
        if self.position.is_stalemate() {
            return Some(GameResult::Draw(DrawReason::Stalemate));
        }
        if self.position.is_insufficient_material() {
            return Some(GameResult::Draw(DrawReason::InsufficientMaterial));
        }
        if self.position.halfmoves() >= SEVENTY_FIVE_MOVE_HALFMOVES {
            return Some(GameResult::Draw(DrawReason::SeventyFiveMoves));
        }
        let key = Fen::position_key(&self.position);
        if self.repetitions.get(&key).copied().unwrap_or(0) >= REPETITION_DRAW_COUNT {
            return Some(GameResult::Draw(DrawReason::FivefoldRepetition));
        }
        None
    }

    /// 是否已终局
    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    /// 获取指定格子的棋子（file/rank 均为 0..8，a1 = (0, 0)）
    pub fn piece_at(&self, file: u8, rank: u8) -> Option<Piece> {
        if file >= BOARD_SIZE || rank >= BOARD_SIZE {
            return None;
        }
        let square = Square::new(u32::from(rank) * u32::from(BOARD_SIZE) + u32::from(file));
        self.position.board().piece_at(square).map(Piece::from)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::PieceKind;

    #[test]
    fn test_initial_state() {
        let state = GameState::initial();
        assert_eq!(state.side_to_move(), Side::White);
        assert_eq!(state.ply_count(), 0);
        assert_eq!(state.legal_moves().len(), 20);
        assert!(state.is_legal("e2e4"));
        assert!(!state.is_legal("E2E4"));
        assert!(state.outcome().is_none());
    }

    #[test]
    fn test_apply_updates_history() {
        let mut state = GameState::initial();
        state.apply("e2e4").unwrap();
        state.apply("e7e5").unwrap();

        assert_eq!(state.history(), &["e2e4".to_string(), "e7e5".to_string()]);
        assert_eq!(state.last_move(), Some("e7e5"));
        assert_eq!(state.side_to_move(), Side::White);
    }

    #[test]
    fn test_apply_rejects_bad_moves() {
        let mut state = GameState::initial();
        assert_eq!(
            state.apply("z9z9"),
            Err(ChessError::InvalidUci { uci: "z9z9".to_string() })
        );
        assert_eq!(
            state.apply("e2e5"),
            Err(ChessError::IllegalMove { uci: "e2e5".to_string() })
        );
        assert_eq!(state.ply_count(), 0);
    }

    #[test]
    fn test_apply_rejects_king_takes_rook_castling() {
        let mut state = Fen::parse("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert!(!state.is_legal("e1h1"));
        assert_eq!(
            state.apply("e1h1"),
            Err(ChessError::IllegalMove { uci: "e1h1".to_string() })
        );
        assert_eq!(state.ply_count(), 0);
        assert_eq!(state.side_to_move(), Side::White);

        // 标准写法的易位照常可走
        state.apply("e1g1").unwrap();
        state.apply("e8c8").unwrap();
        assert_eq!(state.history(), &["e1g1".to_string(), "e8c8".to_string()]);
    }

    #[test]
    fn test_every_legal_move_applies() {
        let state = Fen::parse("r3k2r/pPpp1ppp/8/4pP2/8/8/PPPP2PP/R3K2R w KQkq e6 0 1").unwrap();
        for mv in state.legal_moves() {
            let mut next = state.clone();
            next.apply(&mv).unwrap();
            assert_eq!(next.last_move(), Some(mv.as_str()));
        }
    }

    #[test]
    fn test_checkmate_fools_mate() {
        let mut state = GameState::initial();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            state.apply(mv).unwrap();
        }
        assert_eq!(
            state.outcome(),
            Some(GameResult::BlackWin(WinReason::Checkmate))
        );
        assert!(state.legal_moves().is_empty());
        assert!(state.is_terminal());
        assert_eq!(state.apply("a2a3"), Err(ChessError::GameOver));
    }

    #[test]
    fn test_stalemate() {
        let state = Fen::parse("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(state.outcome(), Some(GameResult::Draw(DrawReason::Stalemate)));
    }

    #[test]
    fn test_insufficient_material() {
        let state = Fen::parse("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(
            state.outcome(),
            Some(GameResult::Draw(DrawReason::InsufficientMaterial))
        );
    }

    #[test]
    fn test_fivefold_repetition() {
        let mut state = GameState::initial();
        // 马来回跳四个循环，初始局面第五次出现
        for _ in 0..4 {
            for mv in ["g1f3", "g8f6", "f3g1", "f6g8"] {
                state.apply(mv).unwrap();
            }
        }
        assert_eq!(
            state.outcome(),
            Some(GameResult::Draw(DrawReason::FivefoldRepetition))
        );
    }

    #[test]
    fn test_promotion_and_castling_uci() {
        let state = Fen::parse("4k3/P7/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let moves = state.legal_moves();
        assert!(moves.contains(&"a7a8q".to_string()));
        assert!(moves.contains(&"a7a8n".to_string()));
        assert!(moves.contains(&"e1g1".to_string()));
    }

    #[test]
    fn test_piece_at() {
        let state = GameState::initial();
        assert_eq!(state.piece_at(4, 0), Some(Piece::new(PieceKind::King, Side::White)));
        assert_eq!(state.piece_at(3, 7), Some(Piece::new(PieceKind::Queen, Side::Black)));
        assert_eq!(state.piece_at(4, 4), None);
        assert_eq!(state.piece_at(8, 0), None);
    }
}
