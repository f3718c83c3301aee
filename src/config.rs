use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Root directory for run records and task I/O.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Write each task's input/output JSON under the run directory.
    #[serde(default = "default_persist_io")]
    pub persist_io: bool,
}

#[derive(Deserialize, Clone)]
pub struct ClaudeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Retries after a 429 before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_turns", &self.max_turns)
            .field("api_url", &self.api_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// Prompt on the terminal and wait for a decision.
    Console,
    /// Answer every breakpoint with `auto_decision`.
    Auto,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AutoDecision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReviewConfig {
    #[serde(default = "default_review_mode")]
    pub mode: ReviewMode,
    #[serde(default = "default_auto_decision")]
    pub auto_decision: AutoDecision,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            persist_io: default_persist_io(),
        }
    }
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_turns: default_max_turns(),
            api_url: default_api_url(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            mode: default_review_mode(),
            auto_decision: default_auto_decision(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("qaflow-runs")
}

fn default_persist_io() -> bool {
    true
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_max_turns() -> u32 {
    3
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_review_mode() -> ReviewMode {
    ReviewMode::Console
}

fn default_auto_decision() -> AutoDecision {
    AutoDecision::Approve
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("qaflow").required(false));
        }

        // Environment variable overrides with QAFLOW_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("QAFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn claude_api_key(&self) -> Result<&str> {
        if self.claude.api_key.is_empty() {
            return Err(AppError::Config(
                "claude.api_key is required (set QAFLOW__CLAUDE__API_KEY)".to_string(),
            ));
        }
        Ok(&self.claude.api_key)
    }
}
