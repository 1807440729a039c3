//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.emotioninsight.toml` files.

use crate::cli::{Args, OutputFormat};
use crate::gateway::{GeminiConfig, RetryPolicy};
use crate::history::HistoryStore;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".emotioninsight.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// History settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Gemini model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Gemini API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key. Never read from or written to the config file.
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries for transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before the first retry, doubled for each further retry.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            api_key: None,
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    60
}

fn default_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

/// History storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// History file; defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Record new analyses.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entities listed by --stats.
    #[serde(default = "default_top_entities")]
    pub top_entities: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            enabled: true,
            top_entities: default_top_entities(),
        }
    }
}

impl HistoryConfig {
    /// The history file to use.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(HistoryStore::default_slot)
    }
}

fn default_true() -> bool {
    true
}

fn default_top_entities() -> usize {
    10
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.api_url {
            self.model.api_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.model.retries = retries;
        }

        self.model.api_key = args
            .api_key
            .clone()
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|key| !key.trim().is_empty());

        if let Some(ref path) = args.history_file {
            self.history.path = Some(path.clone());
        }
        if args.no_save {
            self.history.enabled = false;
        }

        if let Some(format) = args.format {
            self.output.format = format;
        }
    }

    /// Check the merged settings, whichever source they came from.
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;

        if !model.api_url.starts_with("http://") && !model.api_url.starts_with("https://") {
            bail!(
                "model.api_url must start with 'http://' or 'https://', got '{}'",
                model.api_url
            );
        }
        if !(0.0..=2.0).contains(&model.temperature) {
            bail!(
                "model.temperature must be between 0.0 and 2.0, got {}",
                model.temperature
            );
        }
        if model.timeout_seconds == 0 {
            bail!("model.timeout_seconds must be at least 1");
        }

        Ok(())
    }

    /// Client settings for the Gemini oracle.
    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_url: self.model.api_url.clone(),
            api_key: self.model.api_key.clone().unwrap_or_default(),
            model_name: self.model.name.clone(),
            temperature: self.model.temperature,
            timeout_seconds: self.model.timeout_seconds,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.model.retries,
            backoff: Duration::from_millis(self.model.retry_backoff_ms),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "gemini-3-flash-preview");
        assert_eq!(config.model.retries, 1);
        assert!(config.history.enabled);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[model]
name = "gemini-2.5-pro"
temperature = 0.5
retries = 2

[history]
path = "/tmp/custom-history.json"
enabled = false

[output]
format = "markdown"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.model.name, "gemini-2.5-pro");
        assert_eq!(config.model.temperature, 0.5);
        assert_eq!(config.model.retries, 2);
        assert_eq!(config.model.timeout_seconds, 60);
        assert_eq!(
            config.history.resolved_path(),
            PathBuf::from("/tmp/custom-history.json")
        );
        assert!(!config.history.enabled);
        assert_eq!(config.output.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = Config::default();
        config.model.api_key = Some("secret".to_string());
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(!toml_str.contains("secret"));

        let parsed: Config = toml::from_str("[model]\napi_key = \"leaked\"\n").unwrap();
        assert!(parsed.model.api_key.is_none());
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args::parse_from([
            "emotioninsight",
            "--text",
            "hi",
            "--model",
            "gemini-test",
            "--api-key",
            "k",
            "--retries",
            "0",
            "--no-save",
            "--format",
            "json",
        ]);

        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.model.name, "gemini-test");
        assert_eq!(config.model.api_key.as_deref(), Some("k"));
        assert_eq!(config.retry_policy().max_retries, 0);
        assert!(!config.history.enabled);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.gemini_config().api_key, "k");
    }

    #[test]
    fn test_validate_rejects_out_of_range_file_values() {
        assert!(Config::default().validate().is_ok());

        let config: Config = toml::from_str("[model]\ntimeout_seconds = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[model]\ntemperature = 3.5\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[model]\napi_url = \"ftp://example.com\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_values_override_invalid_file_values() {
        let args = Args::parse_from(["emotioninsight", "--stats", "--timeout", "30"]);
        let mut config: Config = toml::from_str("[model]\ntimeout_seconds = 0\n").unwrap();
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[history]"));
        assert!(toml_str.contains("[output]"));
    }
}
