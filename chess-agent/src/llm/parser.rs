//! LLM 走法解析器
//!
//! 从模型的自由文本中提取 `[e2e4]` 形式的 UCI 走法。
//! 出现多个时以最后一个为准：模型通常把最终答案放在末尾。

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static BRACKETED_UCI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([a-h][1-8][a-h][1-8][qrbn]?)\]").expect("bracketed UCI pattern is valid")
});

/// 解析出的候选走法（尚未校验合法性）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MoveCandidate(String);

impl MoveCandidate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MoveCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 文本中没有 `[uci]` 格式的走法
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No bracketed UCI move found in response")]
pub struct ParseFailure;

/// LLM 走法解析器
pub struct MoveParser;

impl MoveParser {
    /// 提取最后一个 `[uci]` 走法
    pub fn parse(text: &str) -> Result<MoveCandidate, ParseFailure> {
        BRACKETED_UCI
            .captures_iter(text)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| MoveCandidate(m.as_str().to_string()))
            .ok_or(ParseFailure)
    }

    /// 规范的带括号形式
    pub fn bracket(uci: &str) -> String {
        format!("[{}]", uci)
    }
}
