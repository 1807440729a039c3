//! Error types for analysis and history persistence.

use thiserror::Error;

/// Failure of a single analysis or history operation.
///
/// None of these are fatal to the process. Batch processing reports them
/// per item and keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Input rejected before any oracle call.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The oracle could not be reached, rejected the request, or returned a
    /// non-success status.
    #[error("oracle request failed: {message}")]
    Transport { message: String, transient: bool },

    /// The oracle answered, but not with the required shape.
    #[error("malformed oracle response: {0}")]
    Schema(String),

    /// Reading or writing the history file failed.
    #[error("history storage error: {0}")]
    Persistence(String),

    /// Missing credential or unusable client settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    pub fn transport(message: impl Into<String>, transient: bool) -> Self {
        Self::Transport {
            message: message.into(),
            transient,
        }
    }

    /// Whether a retry might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { transient: true, .. })
    }

    /// Short label for summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport { .. } => "transport",
            Self::Schema(_) => "schema",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
            Self::Cancelled => "cancelled",
        }
    }
}
