//! 对局结果存储
//!
//! 目录结构：`<root>/<白方> vs <黑方>/<match_id>/<game_label>/`
//! - `record.json`：完整对局记录
//! - `summary.txt`：可读摘要

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use protocol::{GameResult, MatchRecord};
use tracing::{info, warn};

const RECORD_FILE: &str = "record.json";
const SUMMARY_FILE: &str = "summary.txt";

/// 结果存储
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// 创建存储（目录不存在则创建）
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)
                .with_context(|| format!("Failed to create results directory: {:?}", root))?;
        }
        Ok(Self { root })
    }

    /// 某局结果所在目录
    pub fn game_dir(&self, record: &MatchRecord) -> PathBuf {
        let meta = &record.metadata;
        self.root
            .join(match_dir_name(&meta.white_player, &meta.black_player))
            .join(sanitize_filename(&meta.match_id))
            .join(sanitize_filename(&meta.game_label))
    }

    /// 保存对局，返回 `record.json` 路径
    pub fn save(&self, record: &MatchRecord) -> Result<PathBuf> {
        let dir = self.game_dir(record);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create directory: {:?}", dir))?;

        let json = record.to_json().context("Failed to serialize match record")?;
        let path = dir.join(RECORD_FILE);
        fs::write(&path, json).with_context(|| format!("Failed to write file: {:?}", path))?;

        let summary_path = dir.join(SUMMARY_FILE);
        fs::write(&summary_path, record.summary())
            .with_context(|| format!("Failed to write file: {:?}", summary_path))?;

        info!("Match record saved to {:?}", path);
        Ok(path)
    }

    /// 加载对局记录（参数为 `record.json` 路径或其所在目录）
    pub fn load(&self, path: impl AsRef<Path>) -> Result<MatchRecord> {
        let path = path.as_ref();
        let file = if path.is_dir() {
            path.join(RECORD_FILE)
        } else {
            path.to_path_buf()
        };

        if !file.exists() {
            anyhow::bail!("Match record does not exist: {:?}", file);
        }

        let content =
            fs::read_to_string(&file).with_context(|| format!("Failed to read file: {:?}", file))?;
        MatchRecord::from_json(&content).context("Failed to parse match record")
    }

    /// 列出所有已保存的对局（按开始时间倒序）
    pub fn list(&self) -> Result<Vec<SavedMatchInfo>> {
        let mut matches = Vec::new();

        if !self.root.exists() {
            return Ok(matches);
        }

        for pairing in subdirs(&self.root)? {
            for match_dir in subdirs(&pairing)? {
                for game_dir in subdirs(&match_dir)? {
                    let path = game_dir.join(RECORD_FILE);
                    if !path.exists() {
                        continue;
                    }
                    match self.load(&path) {
                        Ok(record) => matches.push(SavedMatchInfo::new(path, &record)),
                        Err(e) => {
                            // 跳过损坏的文件
                            warn!("Skipping unreadable record {:?}: {:#}", path, e);
                        }
                    }
                }
            }
        }

        matches.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(matches)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// 已保存对局的概要
#[derive(Debug, Clone)]
pub struct SavedMatchInfo {
    /// `record.json` 路径
    pub path: PathBuf,
    pub match_id: String,
    pub game_label: String,
    pub white_player: String,
    pub black_player: String,
    pub result: Option<GameResult>,
    pub move_count: usize,
    pub started_at: DateTime<Utc>,
}

impl SavedMatchInfo {
    fn new(path: PathBuf, record: &MatchRecord) -> Self {
        let meta = &record.metadata;
        Self {
            path,
            match_id: meta.match_id.clone(),
            game_label: meta.game_label.clone(),
            white_player: meta.white_player.clone(),
            black_player: meta.black_player.clone(),
            result: record.result.clone(),
            move_count: record.moves.len(),
            started_at: meta.started_at,
        }
    }
}

fn subdirs(path: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(path).with_context(|| format!("Failed to read directory: {:?}", path))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// 对阵目录名
fn match_dir_name(white: &str, black: &str) -> String {
    format!("{} vs {}", sanitize_filename(white), sanitize_filename(black))
}

/// 清理文件名中的特殊字符
fn sanitize_filename(name: &str) -> String {
    let cleaned = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "_".to_string()
    } else {
        cleaned
    }
}
