//! 国际象棋对局共享协议库
//!
//! 包含:
//! - 规则引擎封装 (GameState，基于 shakmaty)
//! - 阵营、棋子等核心数据结构
//! - UCI 走法与来源标记 (ResolvedMove, Provenance)
//! - 对局结果 (GameResult)
//! - 对局记录格式 (JSON)

mod board;
mod constants;
mod error;
mod fen;
mod moves;
mod outcome;
mod piece;
mod record;

pub use board::GameState;
pub use constants::*;
pub use error::{ChessError, Result};
pub use fen::{Fen, INITIAL_FEN};
pub use moves::{Provenance, ResolvedMove};
pub use outcome::{DrawReason, GameResult, WinReason};
pub use piece::{Piece, PieceKind, Side};
pub use record::{
    AttemptVerdict, MatchMetadata, MatchRecord, MoveRecord, TokenUsage, TurnAttempt, TurnRecord,
};
