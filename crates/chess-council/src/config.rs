//! Run configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (applied by `main` on top of the loaded config)
//! 2. TOML file given with `--config`
//! 3. Environment-variable defaults
//! 4. Built-in defaults
//!
//! ## Model roles
//!
//! | Role      | Used by                          | Env override              |
//! |-----------|----------------------------------|---------------------------|
//! | proposer  | structured protocol              | `COUNCIL_PROPOSER_MODEL`  |
//! | debater   | both debate personas             | `COUNCIL_DEBATER_MODEL`   |
//! | manager   | manager loop                     | `COUNCIL_MANAGER_MODEL`   |
//! | analyst   | risk/strategy advisories, verifier | `COUNCIL_ANALYST_MODEL` |

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arbiter::{AnchorPolicy, EngineConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1";

const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_BASE_URL: &str = "COUNCIL_LLM_BASE_URL";
const ENV_PROPOSER_MODEL: &str = "COUNCIL_PROPOSER_MODEL";
const ENV_DEBATER_MODEL: &str = "COUNCIL_DEBATER_MODEL";
const ENV_MANAGER_MODEL: &str = "COUNCIL_MANAGER_MODEL";
const ENV_ANALYST_MODEL: &str = "COUNCIL_ANALYST_MODEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no API key: set OPENAI_API_KEY or llm.api_key")]
    MissingApiKey,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Language-model service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub proposer_model: String,
    pub debater_model: String,
    pub manager_model: String,
    pub analyst_model: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: env_or(ENV_BASE_URL, DEFAULT_BASE_URL),
            api_key: env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty()),
            proposer_model: env_or(ENV_PROPOSER_MODEL, DEFAULT_MODEL),
            debater_model: env_or(ENV_DEBATER_MODEL, DEFAULT_MODEL),
            manager_model: env_or(ENV_MANAGER_MODEL, DEFAULT_MODEL),
            analyst_model: env_or(ENV_ANALYST_MODEL, DEFAULT_MODEL),
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Experiment loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// One FEN per line.
    pub positions_path: PathBuf,
    /// Append-only summary file.
    pub summary_path: PathBuf,
    /// Optional per-position JSONL report.
    pub report_path: Option<PathBuf>,
    pub max_positions: Option<usize>,
    pub anchor: AnchorPolicy,
    /// Wall-clock limit for one protocol on one position.
    pub protocol_timeout_secs: u64,
    /// Also ask the engine for its own move on each position (reporting only).
    pub record_engine_best: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            positions_path: PathBuf::from("data/positions.txt"),
            summary_path: PathBuf::from("results_summary.txt"),
            report_path: None,
            max_positions: None,
            anchor: AnchorPolicy::default(),
            protocol_timeout_secs: 600,
            record_engine_best: false,
        }
    }
}

impl RunConfig {
    pub fn protocol_timeout(&self) -> Duration {
        Duration::from_secs(self.protocol_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CouncilConfig {
    pub llm: LlmConfig,
    pub engine: EngineConfig,
    pub run: RunConfig,
}

impl CouncilConfig {
    /// Defaults (with env overrides), then the TOML file if one is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let models = [
            ("proposer_model", &self.llm.proposer_model),
            ("debater_model", &self.llm.debater_model),
            ("manager_model", &self.llm.manager_model),
            ("analyst_model", &self.llm.analyst_model),
        ];
        if let Some((field, _)) = models.iter().find(|(_, m)| m.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("llm.{field} is empty")));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.base_url is empty".into()));
        }
        let timeouts = [
            ("llm.request_timeout_secs", self.llm.request_timeout_secs),
            ("engine.eval_timeout_secs", self.engine.eval_timeout_secs),
            ("engine.handshake_timeout_secs", self.engine.handshake_timeout_secs),
            ("run.protocol_timeout_secs", self.run.protocol_timeout_secs),
        ];
        if let Some((field, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{field} must be positive")));
        }
        if self.engine.depth == 0 {
            return Err(ConfigError::Invalid("engine.depth must be positive".into()));
        }
        if self.run.max_positions == Some(0) {
            return Err(ConfigError::Invalid("run.max_positions must be positive".into()));
        }
        Ok(())
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.llm
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}
