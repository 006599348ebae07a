use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowwatchError, Result};

/// Environment variable that overrides `engine.base_url`.
pub const API_URL_ENV: &str = "FLOWWATCH_API_URL";

/// Top-level flowwatch configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

/// Where the remote execution engine lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Timers of the watch view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Refresh period while a run is live.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long a clicked node stays highlighted.
    #[serde(default = "default_highlight_ms")]
    pub highlight_ms: u64,
    /// Lifetime of transient notices.
    #[serde(default = "default_notice_ms")]
    pub notice_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            highlight_ms: default_highlight_ms(),
            notice_ms: default_notice_ms(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }
}

/// Conventions used to find a run's final output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Node whose result is nested under `previous_results` in the output
    /// payload and carries the article summaries.
    #[serde(default = "default_summarizer_node_id")]
    pub summarizer_node_id: String,
    /// Node type whose successful execution holds the final payload.
    #[serde(default = "default_output_node_type")]
    pub output_node_type: String,
    /// Node type whose input is replayed by a rerun.
    #[serde(default = "default_trigger_node_type")]
    pub trigger_node_type: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            summarizer_node_id: default_summarizer_node_id(),
            output_node_type: default_output_node_type(),
            trigger_node_type: default_trigger_node_type(),
        }
    }
}

/// File logging, used while the terminal UI owns the screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub file: Option<String>,
}

fn default_base_url() -> String { "http://localhost:8000".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_poll_interval_ms() -> u64 { 1500 }
fn default_highlight_ms() -> u64 { 3000 }
fn default_notice_ms() -> u64 { 3000 }
fn default_summarizer_node_id() -> String { "ai-agent-1".to_string() }
fn default_output_node_type() -> String { "output".to_string() }
fn default_trigger_node_type() -> String { "trigger".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowwatchError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let mut config: AppConfig =
            toml::from_str(&expanded).map_err(|e| FlowwatchError::Config(e.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `FLOWWATCH_API_URL` on top of the file contents.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.engine.base_url = url;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.watch.poll_interval_ms == 0 {
            return Err(FlowwatchError::Config(
                "watch.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.output.summarizer_node_id.trim().is_empty() {
            return Err(FlowwatchError::Config(
                "output.summarizer_node_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the log file path (expand ~), falling back to the state dir.
    pub fn log_file(&self) -> PathBuf {
        match self.log.as_ref().and_then(|l| l.file.as_deref()) {
            Some(file) => expand_home(file),
            None => state_dir().join("flowwatch.log"),
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn state_dir() -> PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME") {
        PathBuf::from(state).join("flowwatch")
    } else if let Some(home) = dirs_home() {
        home.join(".local").join("state").join("flowwatch")
    } else {
        std::env::temp_dir().join("flowwatch")
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
