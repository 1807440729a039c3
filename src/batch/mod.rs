//! Sequential batch analysis.
//!
//! A batch is a list of texts analyzed one at a time, in order, with at most
//! one oracle call in flight. Each item succeeds or fails on its own; a
//! failure never stops the rest of the batch. Only cancellation does.

use crate::error::AnalysisError;
use crate::gateway::AnalysisGateway;
use crate::models::{AnalysisResult, BatchStatus};
use anyhow::{Context, Result};
use futures::stream::{self, Stream, StreamExt};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Split batch input into items, one per line, skipping blank lines.
pub fn parse_batch_input(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(String::from)
        .collect()
}

/// Read a batch input file.
pub fn read_batch_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
    let items = parse_batch_input(&content);
    debug!("Loaded {} batch items from {}", items.len(), path.display());
    Ok(items)
}

/// Outcome of one batch item.
#[derive(Debug)]
pub struct BatchOutcome {
    /// 1-based position among the batch items.
    pub index: usize,
    pub text: String,
    pub result: Result<AnalysisResult, AnalysisError>,
}

/// A failed batch item.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub index: usize,
    pub text: String,
    pub error: AnalysisError,
}

/// Everything a finished (or cancelled) batch produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    /// Successful results in input order.
    pub succeeded: Vec<AnalysisResult>,
    pub failed: Vec<BatchFailure>,
    /// True when the batch stopped before every item was attempted.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Sequential producer of batch outcomes.
pub struct BatchPipeline<'a> {
    gateway: &'a AnalysisGateway,
    items: Vec<String>,
    cancel: CancellationToken,
}

impl<'a> BatchPipeline<'a> {
    pub fn new(gateway: &'a AnalysisGateway, items: Vec<String>) -> Self {
        Self {
            gateway,
            items,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the batch when `cancel` fires. The in-flight item reports
    /// [`AnalysisError::Cancelled`] and no further items start.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Consume the pipeline as a finite stream, one outcome per analyzed
    /// item. The next item is not started until the previous outcome has
    /// been pulled.
    pub fn into_stream(self) -> impl Stream<Item = BatchOutcome> + 'a {
        let BatchPipeline {
            gateway,
            items,
            cancel,
        } = self;

        stream::unfold(
            (items.into_iter().enumerate(), cancel),
            move |(mut items, cancel)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let (position, text) = items.next()?;
                let result = gateway.analyze_with_cancel(&text, &cancel).await;
                let outcome = BatchOutcome {
                    index: position + 1,
                    text,
                    result,
                };
                Some((outcome, (items, cancel)))
            },
        )
    }

    /// Drive the batch to completion, calling `observe` after every item
    /// with the outcome and the updated progress.
    pub async fn run<F>(self, mut observe: F) -> BatchReport
    where
        F: FnMut(&BatchOutcome, &BatchStatus),
    {
        let total = self.total();
        let cancel = self.cancel.clone();
        let mut status = BatchStatus::start(total);
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };

        info!("Starting batch of {} items", total);

        let outcomes = self.into_stream();
        futures::pin_mut!(outcomes);

        while let Some(outcome) = outcomes.next().await {
            // An interrupted item was never processed.
            if matches!(outcome.result, Err(AnalysisError::Cancelled)) {
                debug!("Batch item {} interrupted by cancellation", outcome.index);
                break;
            }

            status.advance();
            observe(&outcome, &status);

            match outcome.result {
                Ok(result) => report.succeeded.push(result),
                Err(error) => {
                    warn!("Batch item {} failed: {}", outcome.index, error);
                    report.failed.push(BatchFailure {
                        index: outcome.index,
                        text: outcome.text,
                        error,
                    });
                }
            }
        }

        status.finish();
        report.cancelled = cancel.is_cancelled() && report.attempted() < total;

        info!(
            "Batch finished: {} succeeded, {} failed{}",
            report.succeeded.len(),
            report.failed.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{no_backoff, payload, ScriptedOracle, StalledOracle};
    use std::time::Duration;

    const SAMPLE: &str = include_str!("../../fixtures/batch_sample.txt");

    fn items(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("item {}", i)).collect()
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let parsed = parse_batch_input("first\n\n   \nsecond  \r\n\tthird\n");
        assert_eq!(parsed, vec!["first", "second  ", "\tthird"]);
        assert!(parse_batch_input("\n \n").is_empty());
    }

    #[test]
    fn test_parse_fixture() {
        let parsed = parse_batch_input(SAMPLE);
        assert_eq!(parsed.len(), 5);
        assert!(parsed.iter().all(|item| !item.trim().is_empty()));
    }

    #[test]
    fn test_read_missing_file_fails() {
        assert!(read_batch_file(Path::new("/definitely/not/here.txt")).is_err());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let oracle = ScriptedOracle::new(vec![
            Ok(payload("POSITIVE", 0.9)),
            Ok(payload("NEGATIVE", 0.8)),
            Ok("{\"sentiment\": \"POSITIVE\"}".to_string()),
            Ok(payload("NEUTRAL", 0.6)),
            Ok(payload("POSITIVE", 0.7)),
        ]);
        let gateway = AnalysisGateway::new(Box::new(oracle.clone()), no_backoff(0));

        let mut seen = Vec::new();
        let report = BatchPipeline::new(&gateway, items(5))
            .run(|outcome, status| seen.push((outcome.index, status.completed)))
            .await;

        assert_eq!(oracle.calls(), 5);
        assert_eq!(seen, vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);

        let texts: Vec<_> = report.succeeded.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["item 1", "item 2", "item 4", "item 5"]);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 3);
        assert!(matches!(report.failed[0].error, AnalysisError::Schema(_)));
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_stream_yields_in_order() {
        let oracle = ScriptedOracle::default();
        let gateway = AnalysisGateway::new(Box::new(oracle), no_backoff(0));

        let outcomes: Vec<_> = BatchPipeline::new(&gateway, items(3))
            .into_stream()
            .collect()
            .await;

        let indices: Vec<_> = outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }

    #[tokio::test]
    async fn test_cancel_stops_remaining_items() {
        let oracle = ScriptedOracle::default();
        let gateway = AnalysisGateway::new(Box::new(oracle.clone()), no_backoff(0));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let report = BatchPipeline::new(&gateway, items(5))
            .with_cancellation(cancel)
            .run(|outcome, _| {
                if outcome.index == 2 {
                    trigger.cancel();
                }
            })
            .await;

        assert_eq!(oracle.calls(), 2);
        assert_eq!(report.succeeded.len(), 2);
        assert!(report.failed.is_empty());
        assert!(report.cancelled);
    }

    #[tokio::test]
    async fn test_cancel_mid_item_is_not_counted_as_processed() {
        let gateway = AnalysisGateway::new(Box::new(StalledOracle), no_backoff(0));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut seen = Vec::new();
        let mut last_completed = 0;
        let report = BatchPipeline::new(&gateway, items(3))
            .with_cancellation(cancel)
            .run(|outcome, status| {
                seen.push(outcome.index);
                last_completed = status.completed;
            })
            .await;

        assert!(seen.is_empty());
        assert_eq!(last_completed, report.attempted());
        assert_eq!(report.attempted(), 0);
        assert!(report.failed.is_empty());
        assert!(report.cancelled);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let gateway = AnalysisGateway::new(Box::new(ScriptedOracle::default()), no_backoff(0));
        let report = BatchPipeline::new(&gateway, Vec::new()).run(|_, _| {}).await;
        assert_eq!(report.total, 0);
        assert_eq!(report.attempted(), 0);
        assert!(!report.cancelled);
    }
}
