//! Writer configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::layout::StateDir;

/// Main Writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the shared state directory
    #[serde(rename = "state-dir")]
    pub state_dir: PathBuf,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Push channel timing
    pub channel: ChannelConfig,

    /// Panel tick intervals
    pub panels: PanelsConfig,

    /// Suggestion settings
    pub suggestions: SuggestionsConfig,

    /// External generator
    pub generator: GeneratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            log_level: None,
            channel: ChannelConfig::default(),
            panels: PanelsConfig::default(),
            suggestions: SuggestionsConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".writer")
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.suggestions.count) {
            return Err(eyre::eyre!(
                "suggestions.count must be between 1 and 5 (got {})",
                self.suggestions.count
            ));
        }
        let intervals = [
            ("channel.poll-timeout-ms", self.channel.poll_timeout_ms),
            ("channel.retry-backoff-ms", self.channel.retry_backoff_ms),
            ("panels.suggestions-tick-ms", self.panels.suggestions_tick_ms),
            ("panels.review-tick-ms", self.panels.review_tick_ms),
            ("panels.outline-tick-ms", self.panels.outline_tick_ms),
            ("generator.timeout-ms", self.generator.timeout_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(eyre::eyre!("{} must be greater than zero", name));
            }
        }
        Ok(())
    }

    /// Shared state directory described by this config
    pub fn state(&self) -> StateDir {
        StateDir::new(&self.state_dir)
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .writer.yml
        let local_config = PathBuf::from(".writer.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/writer/writer.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("writer").join("writer.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Push channel timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Longest single wait for data, bounds how fast a reader notices a stop
    #[serde(rename = "poll-timeout-ms")]
    pub poll_timeout_ms: u64,

    /// Sleep between failed attempts to open a pipe
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Pause between a writer hanging up and reopening
    #[serde(rename = "reopen-pause-ms")]
    pub reopen_pause_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 500,
            retry_backoff_ms: 500,
            reopen_pause_ms: 100,
        }
    }
}

/// Panel tick intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelsConfig {
    #[serde(rename = "suggestions-tick-ms")]
    pub suggestions_tick_ms: u64,

    #[serde(rename = "review-tick-ms")]
    pub review_tick_ms: u64,

    #[serde(rename = "outline-tick-ms")]
    pub outline_tick_ms: u64,
}

impl Default for PanelsConfig {
    fn default() -> Self {
        Self {
            suggestions_tick_ms: 250,
            review_tick_ms: 250,
            outline_tick_ms: 400,
        }
    }
}

/// Suggestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionsConfig {
    /// Candidates per generation (1-5)
    pub count: usize,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self { count: 3 }
    }
}

/// External generator command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Program and arguments; unset means the built-in mock generator
    pub command: Option<Vec<String>>,

    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_ms: 120_000,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.state_dir.ends_with(".writer"));
        assert_eq!(config.channel.poll_timeout_ms, 500);
        assert_eq!(config.panels.suggestions_tick_ms, 250);
        assert_eq!(config.panels.outline_tick_ms, 400);
        assert_eq!(config.suggestions.count, 3);
        assert!(config.generator.command.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
state-dir: /tmp/writer-test
log-level: debug

channel:
  poll-timeout-ms: 200
  retry-backoff-ms: 300
  reopen-pause-ms: 50

panels:
  suggestions-tick-ms: 125

suggestions:
  count: 5

generator:
  command: ["writer-ai", "--json"]
  timeout-ms: 30000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.state_dir, PathBuf::from("/tmp/writer-test"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.channel.poll_timeout_ms, 200);
        assert_eq!(config.channel.reopen_pause_ms, 50);
        assert_eq!(config.panels.suggestions_tick_ms, 125);
        assert_eq!(config.panels.review_tick_ms, 250);
        assert_eq!(config.suggestions.count, 5);
        assert_eq!(
            config.generator.command,
            Some(vec!["writer-ai".to_string(), "--json".to_string()])
        );
        assert_eq!(config.generator.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_bad_count() {
        let mut config = Config::default();
        config.suggestions.count = 0;
        assert!(config.validate().is_err());
        config.suggestions.count = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.panels.review_tick_ms = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("review-tick-ms"));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("writer.yml");
        fs::write(&path, "state-dir: /srv/writer\nlog-level: TRACE\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.state().root(), Path::new("/srv/writer"));
        assert_eq!(config.log_level.as_deref(), Some("TRACE"));
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
