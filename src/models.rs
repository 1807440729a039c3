//! Data models for sentiment analysis.
//!
//! This module contains the core data structures shared by the gateway,
//! the history store and the report renderers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Overall sentiment of an analyzed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// All variants, in display order.
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral];

    /// Wire representation used by the oracle and the history file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Neutral => "NEUTRAL",
        }
    }

    /// Returns an emoji representation of the sentiment.
    pub fn emoji(&self) -> &'static str {
        match self {
            Sentiment::Positive => "🟢",
            Sentiment::Negative => "🔴",
            Sentiment::Neutral => "⚪",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intensities of the five tracked emotions, each in `[0, 1]`.
///
/// The values are independent; they are not required to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Emotions {
    pub joy: f64,
    pub sadness: f64,
    pub anger: f64,
    pub fear: f64,
    pub surprise: f64,
}

impl Emotions {
    /// Field names paired with their values, in a fixed order.
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("joy", self.joy),
            ("sadness", self.sadness),
            ("anger", self.anger),
            ("fear", self.fear),
            ("surprise", self.surprise),
        ]
    }

    /// The strongest emotion. Ties resolve to the earliest field.
    pub fn dominant(&self) -> (&'static str, f64) {
        let entries = self.entries();
        let mut best = entries[0];
        for entry in &entries[1..] {
            if entry.1 > best.1 {
                best = *entry;
            }
        }
        best
    }
}

/// A single normalized analysis, as stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Unique identifier generated at creation time.
    pub id: Uuid,
    /// The original input, unmodified.
    pub text: String,
    pub sentiment: Sentiment,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    pub emotions: Emotions,
    /// Short explanation of the verdict.
    pub explanation: String,
    /// Key entities or themes; may be empty.
    pub entities: Vec<String>,
    /// Creation time, stored as epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    /// Short upper-case reference derived from the id.
    pub fn short_ref(&self) -> String {
        self.id.to_string()[..8].to_uppercase()
    }

    /// Whether the id starts with `prefix` (case-insensitive, hyphens optional).
    pub fn matches_ref(&self, prefix: &str) -> bool {
        let wanted = prefix.trim().to_lowercase().replace('-', "");
        !wanted.is_empty() && self.id.simple().to_string().starts_with(&wanted)
    }
}

/// Progress of a running batch ("N of M processed").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchStatus {
    pub total: usize,
    pub completed: usize,
    pub is_processing: bool,
}

impl BatchStatus {
    /// Status at the start of a batch of `total` items.
    pub fn start(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            is_processing: true,
        }
    }

    /// Record one finished item, successful or not.
    pub fn advance(&mut self) {
        if self.completed < self.total {
            self.completed += 1;
        }
    }

    pub fn finish(&mut self) {
        self.is_processing = false;
    }

    /// Human-readable progress label.
    pub fn label(&self) -> String {
        if self.is_processing {
            format!("Processing ({}/{})...", self.completed, self.total)
        } else {
            format!("Processed {}/{}", self.completed, self.total)
        }
    }
}
