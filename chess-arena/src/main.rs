use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chess_arena::{plan_games, run_all, ArenaConfig, ResultStore, ScheduleOptions};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 两个 LLM 代理之间的国际象棋对战
#[derive(Parser, Debug)]
#[command(name = "chess-arena")]
#[command(about = "Run chess games between two LLM agents")]
#[command(version)]
struct Cli {
    /// 配置文件
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// 结果目录
    #[arg(short, long, default_value = "Results")]
    results_dir: PathBuf,

    /// 对局数
    #[arg(short = 'n', long, default_value_t = 1)]
    games: usize,

    /// 双方轮流执白
    #[arg(long)]
    swap_colors: bool,

    /// 同时进行的对局数
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// 覆盖配置中的步数上限
    #[arg(long)]
    max_plies: Option<usize>,

    /// 列出结果目录中已保存的对局后退出
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chess_arena=info".parse()?)
                .add_directive("chess_agent=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let store = ResultStore::new(&cli.results_dir)?;

    if cli.list {
        for saved in store.list()? {
            let result = saved
                .result
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unfinished".to_string());
            println!(
                "{}  {} / {}  {} vs {}  {} ({} moves)",
                saved.started_at.format("%Y-%m-%d %H:%M:%S"),
                saved.match_id,
                saved.game_label,
                saved.white_player,
                saved.black_player,
                result,
                saved.move_count
            );
        }
        return Ok(());
    }

    let config = ArenaConfig::load(&cli.config)?;

    let match_id = uuid::Uuid::new_v4().to_string();
    let options = ScheduleOptions {
        match_id: match_id.clone(),
        max_plies: cli.max_plies.unwrap_or(config.game.stop_after),
        concurrency: cli.concurrency,
    };
    let plans = plan_games(cli.games, cli.swap_colors);

    info!(
        "Starting match {}: {} vs {} ({} game(s), ply ceiling {})",
        match_id,
        config.agent0.model.name,
        config.agent1.model.name,
        plans.len(),
        options.max_plies
    );

    let results = run_all(Arc::new(config), plans, options).await;

    let mut failed = 0;
    for (plan, result) in results {
        match result {
            Ok(report) => {
                println!("== {} ==\n{}", plan.label, report.record.summary());
                match store.save(&report.record) {
                    Ok(path) => info!("Results saved in {:?}", path),
                    Err(e) => {
                        error!("Failed to save game {}: {:#}", plan.label, e);
                        failed += 1;
                    }
                }
            }
            Err(_) => failed += 1,
        }
    }

    if failed > 0 {
        bail!("{} game(s) failed", failed);
    }
    info!("Match {} completed", match_id);
    Ok(())
}
