//! 多局调度
//!
//! 每局完全独立：各自的局面、代理与随机数。多局可以并发运行，
//! 并发数由信号量限制。

use std::sync::Arc;

use anyhow::{Context, Result};
use chess_agent::{LlmAgent, TurnResolver};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::ArenaConfig;
use crate::game::{MatchReport, MatchRunner};

/// 单局安排
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePlan {
    /// 局序号（从 0 开始）
    pub index: usize,
    /// 执白的代理编号（0 / 1）
    pub white_agent: usize,
    /// 结果目录中的对局标签
    pub label: String,
}

impl GamePlan {
    pub fn black_agent(&self) -> usize {
        1 - self.white_agent
    }
}

/// 生成对局安排；`swap_colors` 时双方轮流执白
pub fn plan_games(games: usize, swap_colors: bool) -> Vec<GamePlan> {
    (0..games)
        .map(|index| {
            let white_agent = if swap_colors { index % 2 } else { 0 };
            let label = if games == 1 {
                format!("white_player_agent{}", white_agent)
            } else {
                format!("game{}_white_player_agent{}", index + 1, white_agent)
            };
            GamePlan {
                index,
                white_agent,
                label,
            }
        })
        .collect()
}

/// 运行参数
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    pub match_id: String,
    pub max_plies: usize,
    pub concurrency: usize,
}

/// 单局：创建代理与决议器后运行
pub async fn play_game(
    config: &ArenaConfig,
    plan: &GamePlan,
    options: &ScheduleOptions,
) -> Result<MatchReport> {
    let white_config = config.agent(plan.white_agent)?;
    let black_config = config.agent(plan.black_agent())?;

    let white = LlmAgent::from_config(white_config, &config.providers)
        .with_context(|| format!("Failed to create provider for agent{}", plan.white_agent))?;
    let black = LlmAgent::from_config(black_config, &config.providers)
        .with_context(|| format!("Failed to create provider for agent{}", plan.black_agent()))?;

    // 固定种子时每局偏移，保证各局不同且可复现
    let resolver = match config.game.seed {
        Some(seed) => TurnResolver::with_seed(
            config.retry_policy(),
            config.renderer(),
            seed.wrapping_add(plan.index as u64),
        ),
        None => TurnResolver::new(config.retry_policy(), config.renderer()),
    };

    let runner = MatchRunner::new(white, black, resolver, config.initial_state()?, options.max_plies)
        .with_labels(options.match_id.clone(), plan.label.clone());

    let report = runner
        .run()
        .await
        .with_context(|| format!("Game {} aborted", plan.label))?;
    Ok(report)
}

/// 运行全部对局，按完成顺序返回结果
pub async fn run_all(
    config: Arc<ArenaConfig>,
    plans: Vec<GamePlan>,
    options: ScheduleOptions,
) -> Vec<(GamePlan, Result<MatchReport>)> {
    let limiter = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let options = Arc::new(options);
    let mut tasks = JoinSet::new();

    for plan in plans {
        let config = Arc::clone(&config);
        let options = Arc::clone(&options);
        let limiter = Arc::clone(&limiter);
        tasks.spawn(async move {
            let result = match limiter.acquire_owned().await {
                Ok(_permit) => play_game(&config, &plan, &options).await,
                Err(e) => Err(anyhow::Error::new(e).context("Game scheduler closed")),
            };
            (plan, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((plan, result)) => {
                match &result {
                    Ok(report) => info!("Game {} finished: {}", plan.label, report.result),
                    Err(e) => error!("Game {} failed: {:#}", plan.label, e),
                }
                results.push((plan, result));
            }
            Err(e) => error!("Game task panicked: {}", e),
        }
    }
    results
}
