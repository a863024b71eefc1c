//! 协议常量定义

/// 对局记录格式版本
pub const RECORD_VERSION: &str = "1.0";

/// 棋盘边长
pub const BOARD_SIZE: u8 = 8;

/// 对局人数（固定双方）
pub const NUM_PLAYERS: usize = 2;

/// 默认最大半回合数（达到后以未决结束）
pub const DEFAULT_MAX_PLIES: usize = 100;

/// 默认重试次数（不含首次请求）
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// 提示中展示的最近走法数量
pub const RECENT_MOVES_WINDOW: usize = 5;

/// 同一局面出现该次数即判和（五次重复）
pub const REPETITION_DRAW_COUNT: u32 = 5;

/// 七十五回合规则对应的半回合计数
pub const SEVENTY_FIVE_MOVE_HALFMOVES: u32 = 150;
