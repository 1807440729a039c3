//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Sentiment;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// EmotionInsight - sentiment and emotion analysis from the terminal
///
/// Sends text to a Gemini model with a fixed structured-output schema,
/// validates the answer and keeps a local history of every analysis.
///
/// Examples:
///   emotioninsight --text "The new release is fantastic"
///   echo "I am worried about tomorrow" | emotioninsight --text -
///   emotioninsight --batch reviews.txt --format markdown --output report.md
///   emotioninsight --history --limit 10
///   emotioninsight --stats
///   emotioninsight --clear-history --yes
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Text to analyze (use "-" to read from stdin)
    #[arg(short, long, value_name = "TEXT")]
    pub text: Option<String>,

    /// File with one text per line to analyze sequentially
    ///
    /// Blank lines are skipped. One failed line does not stop the batch.
    #[arg(short, long, value_name = "FILE")]
    pub batch: Option<PathBuf>,

    /// List stored analyses, newest first
    #[arg(long)]
    pub history: bool,

    /// Show one stored analysis by its reference (id prefix)
    #[arg(long, value_name = "REF")]
    pub show: Option<String>,

    /// Print aggregate statistics over the stored history
    #[arg(long)]
    pub stats: bool,

    /// Delete all stored analyses
    #[arg(long)]
    pub clear_history: bool,

    /// Skip the confirmation prompt of --clear-history
    #[arg(short, long)]
    pub yes: bool,

    /// Maximum number of history entries to list
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Only list history entries with this sentiment
    #[arg(long, value_name = "SENTIMENT")]
    pub sentiment: Option<SentimentFilter>,

    /// Gemini model to use for analysis
    ///
    /// Can also be set via EMOTIONINSIGHT_MODEL env var or .emotioninsight.toml config.
    #[arg(short, long, env = "EMOTIONINSIGHT_MODEL")]
    pub model: Option<String>,

    /// Gemini API base URL
    #[arg(long, env = "GEMINI_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Gemini API key (falls back to the API_KEY env var)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .emotioninsight.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// History file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    pub history_file: Option<PathBuf>,

    /// Do not record new analyses in the history
    #[arg(long)]
    pub no_save: bool,

    /// Output format (text, markdown, json)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries for transient failures (timeouts, rate limits, 5xx)
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .emotioninsight.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Terminal text (default)
    #[default]
    Text,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

/// Sentiment values accepted by --sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SentimentFilter {
    Positive,
    Negative,
    Neutral,
}

impl From<SentimentFilter> for Sentiment {
    fn from(filter: SentimentFilter) -> Self {
        match filter {
            SentimentFilter::Positive => Sentiment::Positive,
            SentimentFilter::Negative => Sentiment::Negative,
            SentimentFilter::Neutral => Sentiment::Neutral,
        }
    }
}

/// The one thing an invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Analyze(String),
    Batch(PathBuf),
    History,
    Show(String),
    Stats,
    ClearHistory,
    InitConfig,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Determine the requested action. Exactly one must be given.
    pub fn action(&self) -> Result<Action, String> {
        let mut actions = Vec::new();

        if let Some(ref text) = self.text {
            actions.push(Action::Analyze(text.clone()));
        }
        if let Some(ref path) = self.batch {
            actions.push(Action::Batch(path.clone()));
        }
        if self.history {
            actions.push(Action::History);
        }
        if let Some(ref reference) = self.show {
            actions.push(Action::Show(reference.clone()));
        }
        if self.stats {
            actions.push(Action::Stats);
        }
        if self.clear_history {
            actions.push(Action::ClearHistory);
        }
        if self.init_config {
            actions.push(Action::InitConfig);
        }

        match actions.len() {
            0 => Err(
                "Nothing to do: use --text, --batch, --history, --show, --stats, --clear-history or --init-config"
                    .to_string(),
            ),
            1 => Ok(actions.remove(0)),
            _ => Err("Only one action can be given per invocation".to_string()),
        }
    }

    /// Validate the parsed arguments and return the requested action.
    pub fn validate(&self) -> Result<Action, String> {
        let action = self.action()?;

        // Skip validation for --init-config
        if action == Action::InitConfig {
            return Ok(action);
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err("Limit must be at least 1".to_string());
            }
        }

        match &action {
            Action::Batch(path) if !path.is_file() => {
                return Err(format!("Batch file does not exist: {}", path.display()));
            }
            Action::Show(reference) if reference.trim().is_empty() => {
                return Err("--show needs a non-empty reference".to_string());
            }
            _ => {}
        }

        Ok(action)
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
