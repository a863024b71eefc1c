//! UCI 走法与来源标记

use std::fmt;

use serde::{Deserialize, Serialize};

/// 走法来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// 模型给出并通过校验
    FromModel,
    /// 重试耗尽后随机选取的合法走法
    FallbackRandom,
}

/// 一个回合最终落下的走法
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMove {
    /// UCI 格式走法，如 "e2e4"、"a7a8q"
    pub uci: String,
    pub provenance: Provenance,
}

impl ResolvedMove {
    pub fn from_model(uci: impl Into<String>) -> Self {
        Self {
            uci: uci.into(),
            provenance: Provenance::FromModel,
        }
    }

    pub fn fallback(uci: impl Into<String>) -> Self {
        Self {
            uci: uci.into(),
            provenance: Provenance::FallbackRandom,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::FallbackRandom
    }
}

impl fmt::Display for ResolvedMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.provenance {
            Provenance::FromModel => write!(f, "{}", self.uci),
            Provenance::FallbackRandom => write!(f, "{} (fallback)", self.uci),
        }
    }
}
