//! LLM 国际象棋对战平台
//!
//! 包含:
//! - 对战配置 (YAML)
//! - 对局控制
//! - 多局调度
//! - 结果存储

pub mod config;
pub mod game;
pub mod schedule;
pub mod storage;

pub use config::{AgentSection, ArenaConfig, GameSettings, ModelSection, PromptSection};
pub use game::{MatchError, MatchReport, MatchRunner};
pub use schedule::{plan_games, play_game, run_all, GamePlan, ScheduleOptions};
pub use storage::{ResultStore, SavedMatchInfo};
