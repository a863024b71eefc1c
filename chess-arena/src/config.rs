//! 对战配置
//!
//! YAML 配置文件，结构：
//! - `agent0` / `agent1`：模型（服务商、模型名、参数）与提示
//! - `game`：对局规则（人数、步数上限、重试次数、种子等）
//! - `providers`：服务商公共设置（超时、自定义地址）

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chess_agent::{
    AgentConfig, ModelParams, PlaceholderPolicy, PromptRenderer, ProviderKind, ProviderSettings,
    RetryPolicy,
};
use protocol::{Fen, GameState, DEFAULT_MAX_PLIES, DEFAULT_MAX_RETRIES, NUM_PLAYERS};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 配置文件根结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub agent0: AgentSection,
    pub agent1: AgentSection,
    #[serde(default)]
    pub game: GameSettings,
    #[serde(default)]
    pub providers: ProviderSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub model: ModelSection,
    #[serde(default)]
    pub prompts: PromptSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub provider: ProviderKind,
    pub name: String,
    #[serde(default)]
    pub params: ModelParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSection {
    pub system_prompt: String,
    pub step_wise_prompt: String,
}

/// 对局设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// 固定为 2
    pub num_players: usize,
    /// 步数（半回合）上限
    pub stop_after: usize,
    pub max_retries: u32,
    /// 兜底随机数种子，不设置则每局随机
    pub seed: Option<u64>,
    /// 起始局面，不设置则为标准初始局面
    pub start_fen: Option<String>,
    pub placeholder_policy: PlaceholderPolicy,
    pub augment_system_prompt: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            num_players: NUM_PLAYERS,
            stop_after: DEFAULT_MAX_PLIES,
            max_retries: DEFAULT_MAX_RETRIES,
            seed: None,
            start_fen: None,
            placeholder_policy: PlaceholderPolicy::default(),
            augment_system_prompt: false,
        }
    }
}

impl ArenaConfig {
    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: ArenaConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// 启动前校验：人数、起始局面、提示模板
    pub fn validate(&self) -> Result<()> {
        if self.game.num_players != NUM_PLAYERS {
            bail!(
                "num_players must be {}, got {}",
                NUM_PLAYERS,
                self.game.num_players
            );
        }

        if let Some(fen) = &self.game.start_fen {
            Fen::parse(fen).with_context(|| format!("Invalid start_fen: {}", fen))?;
        }

        let renderer = self.renderer();
        for (index, agent) in [&self.agent0, &self.agent1].into_iter().enumerate() {
            if agent.model.name.trim().is_empty() {
                bail!("agent{}: model name is empty", index);
            }
            renderer
                .validate(&agent.prompts.step_wise_prompt)
                .with_context(|| format!("agent{}: invalid step_wise_prompt", index))?;
        }

        debug!(
            "Config validated: {} vs {}, stop_after={}, max_retries={}",
            self.agent0.model.name, self.agent1.model.name, self.game.stop_after, self.game.max_retries
        );
        Ok(())
    }

    /// 按编号（0 / 1）取代理配置
    pub fn agent(&self, index: usize) -> Result<AgentConfig> {
        let section = match index {
            0 => &self.agent0,
            1 => &self.agent1,
            _ => bail!("No agent{} in config", index),
        };
        Ok(section.to_agent_config())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.game.max_retries,
            augment_system_prompt: self.game.augment_system_prompt,
        }
    }

    pub fn renderer(&self) -> PromptRenderer {
        PromptRenderer::new(self.game.placeholder_policy)
    }

    /// 每局的起始局面
    pub fn initial_state(&self) -> Result<GameState> {
        match &self.game.start_fen {
            Some(fen) => Fen::parse(fen).with_context(|| format!("Invalid start_fen: {}", fen)),
            None => Ok(GameState::initial()),
        }
    }
}

impl AgentSection {
    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig {
            provider: self.model.provider,
            model: self.model.name.clone(),
            params: self.model.params.clone(),
            system_prompt: self.prompts.system_prompt.clone(),
            step_wise_prompt: self.prompts.step_wise_prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
agent0:
  model:
    provider: OpenRouter
    name: google/gemini-2.5-flash
    params:
      temperature: 0.7
      reasoning:
        effort: low
  prompts:
    system_prompt: You are a chess grandmaster.
    step_wise_prompt: |
      You are playing as {role}.
      {board}
      Valid moves: {valid_moves}
agent1:
  model:
    provider: Gemini
    name: gemini-2.5-pro
  prompts:
    system_prompt: ""
    step_wise_prompt: "{full_observation}"
game:
  num_players: 2
  stop_after: 40
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = ArenaConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.game.stop_after, 40);
        assert_eq!(config.game.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.game.placeholder_policy, PlaceholderPolicy::Literal);
        assert!(config.game.seed.is_none());

        let agent0 = config.agent(0).unwrap();
        assert_eq!(agent0.provider, ProviderKind::OpenRouter);
        assert_eq!(agent0.model, "google/gemini-2.5-flash");
        assert_eq!(agent0.params["temperature"], serde_json::json!(0.7));
        assert_eq!(agent0.params["reasoning"], serde_json::json!({ "effort": "low" }));
        assert!(agent0.step_wise_prompt.contains("{role}"));

        let agent1 = config.agent(1).unwrap();
        assert_eq!(agent1.provider, ProviderKind::Gemini);
        assert!(agent1.params.is_empty());
        assert!(config.agent(2).is_err());
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let yaml = r#"
agent0: { model: { provider: OpenAI, name: gpt-4o-mini } }
agent1: { model: { provider: OpenAI, name: gpt-4o } }
"#;
        let config = ArenaConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.game.stop_after, DEFAULT_MAX_PLIES);
        assert_eq!(config.providers.timeout_secs, ProviderSettings::default().timeout_secs);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.agent(0).unwrap().system_prompt, "");
    }

    #[test]
    fn test_rejects_wrong_player_count() {
        let yaml = SAMPLE.replace("num_players: 2", "num_players: 3");
        assert!(ArenaConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let yaml = SAMPLE.replace("provider: Gemini", "provider: Claude");
        assert!(ArenaConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_strict_placeholder_policy_checked_at_load() {
        let yaml = format!(
            "{}  placeholder_policy: reject\n",
            SAMPLE.replace("{valid_moves}", "{legal_moves}")
        );
        let err = ArenaConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("legal_moves"));

        // 宽松策略下同样的模板可以加载
        let lenient = SAMPLE.replace("{valid_moves}", "{legal_moves}");
        assert!(ArenaConfig::from_yaml_str(&lenient).is_ok());
    }

    #[test]
    fn test_start_fen() {
        let yaml = format!(
            "{}  start_fen: \"4k3/8/8/8/8/8/8/4K2R w K - 0 1\"\n",
            SAMPLE
        );
        let config = ArenaConfig::from_yaml_str(&yaml).unwrap();
        let state = config.initial_state().unwrap();
        assert!(state.legal_moves().contains(&"e1g1".to_string()));

        let bad = format!("{}  start_fen: \"not a fen\"\n", SAMPLE);
        assert!(ArenaConfig::from_yaml_str(&bad).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, SAMPLE).unwrap();

        let config = ArenaConfig::load(&path).unwrap();
        assert_eq!(config.agent0.model.name, "google/gemini-2.5-flash");

        assert!(ArenaConfig::load(dir.path().join("missing.yml")).is_err());
    }
}
