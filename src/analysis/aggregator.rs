//! History aggregation and statistics.
//!
//! This module summarizes a set of stored results: sentiment distribution,
//! average confidence and emotion intensities, and recurring entities.

use crate::models::{AnalysisResult, Emotions, Sentiment};
use serde::Serialize;
use std::collections::HashMap;

/// Aggregate view over a set of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    /// Mean confidence, 0 when empty.
    pub average_confidence: f64,
    /// Per-emotion mean intensity.
    pub average_emotions: Emotions,
    /// Most frequent entities with their counts.
    pub top_entities: Vec<(String, usize)>,
}

impl HistoryStats {
    /// Count for one sentiment.
    pub fn count(&self, sentiment: Sentiment) -> usize {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
        }
    }

    /// Share of `sentiment` in percent.
    pub fn percentage(&self, sentiment: Sentiment) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(sentiment) as f64 * 100.0 / self.total as f64
        }
    }

    /// Most common sentiment; `None` for an empty history or a tie at the top.
    pub fn dominant_sentiment(&self) -> Option<Sentiment> {
        let mut ranked: Vec<_> = Sentiment::ALL.iter().map(|s| (*s, self.count(*s))).collect();
        ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        match ranked.as_slice() {
            [(first, top), (_, second), ..] if *top > 0 && top > second => Some(*first),
            _ => None,
        }
    }
}

/// Compute statistics over `entries`, keeping the `top_n` most frequent
/// entities.
pub fn compute_stats(entries: &[AnalysisResult], top_n: usize) -> HistoryStats {
    let mut stats = HistoryStats {
        total: entries.len(),
        ..HistoryStats::default()
    };

    if entries.is_empty() {
        return stats;
    }

    let mut confidence_sum = 0.0;
    let mut sums = Emotions::default();

    for entry in entries {
        match entry.sentiment {
            Sentiment::Positive => stats.positive += 1,
            Sentiment::Negative => stats.negative += 1,
            Sentiment::Neutral => stats.neutral += 1,
        }

        confidence_sum += entry.confidence;
        sums.joy += entry.emotions.joy;
        sums.sadness += entry.emotions.sadness;
        sums.anger += entry.emotions.anger;
        sums.fear += entry.emotions.fear;
        sums.surprise += entry.emotions.surprise;
    }

    let n = entries.len() as f64;
    stats.average_confidence = confidence_sum / n;
    stats.average_emotions = Emotions {
        joy: sums.joy / n,
        sadness: sums.sadness / n,
        anger: sums.anger / n,
        fear: sums.fear / n,
        surprise: sums.surprise / n,
    };
    stats.top_entities = top_entities(entries, top_n);

    stats
}

/// Entities ranked by how many results mention them.
///
/// Matching ignores case; the first spelling seen is reported. Ties are
/// broken alphabetically.
pub fn top_entities(entries: &[AnalysisResult], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();

    for entry in entries {
        let mut seen_here: Vec<String> = Vec::new();
        for entity in &entry.entities {
            let trimmed = entity.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if seen_here.contains(&key) {
                continue;
            }
            seen_here.push(key.clone());

            counts
                .entry(key)
                .or_insert_with(|| (trimmed.to_string(), 0))
                .1 += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_values().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase())));
    ranked.truncate(n);
    ranked
}

/// Results with a given sentiment, newest-first order preserved.
pub fn filter_by_sentiment(entries: &[AnalysisResult], sentiment: Sentiment) -> Vec<&AnalysisResult> {
    entries.iter().filter(|e| e.sentiment == sentiment).collect()
}
