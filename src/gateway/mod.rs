//! Analysis gateway.
//!
//! Turns raw text into a normalized [`AnalysisResult`]: validates the input,
//! calls the [`Oracle`] (with a bounded retry for transient failures),
//! decodes the payload and stamps id and time.

pub mod oracle;
pub mod schema;

pub use oracle::{GeminiConfig, GeminiOracle, Oracle};

use crate::error::AnalysisError;
use crate::models::AnalysisResult;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Retry policy for transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Converts text into validated analysis results.
pub struct AnalysisGateway {
    oracle: Box<dyn Oracle>,
    retry: RetryPolicy,
    /// Last issued timestamp in epoch millis; keeps stamps non-decreasing.
    last_stamp: AtomicI64,
}

impl AnalysisGateway {
    pub fn new(oracle: Box<dyn Oracle>, retry: RetryPolicy) -> Self {
        Self {
            oracle,
            retry,
            last_stamp: AtomicI64::new(i64::MIN),
        }
    }

    pub fn model_name(&self) -> &str {
        self.oracle.model_name()
    }

    /// Analyze `text` without a cancellation signal.
    pub async fn analyze(&self, text: &str) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_with_cancel(text, &CancellationToken::new()).await
    }

    /// Analyze `text`, giving up with [`AnalysisError::Cancelled`] as soon as
    /// `cancel` fires.
    pub async fn analyze_with_cancel(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::Validation(
                "text is empty or whitespace-only".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let raw = self.call_with_retry(text, cancel).await?;
        let verdict = schema::decode_payload(&raw)?;

        let result = AnalysisResult {
            id: Uuid::new_v4(),
            text: text.to_string(),
            sentiment: verdict.sentiment,
            confidence: verdict.confidence,
            emotions: verdict.emotions,
            explanation: verdict.explanation,
            entities: verdict.entities,
            timestamp: self.next_timestamp(),
        };

        debug!(
            "Analysis {} complete: {} ({:.2})",
            result.short_ref(),
            result.sentiment,
            result.confidence
        );

        Ok(result)
    }

    async fn call_with_retry(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AnalysisError> {
        let mut retry = 0;

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
                outcome = self.oracle.generate(text) => outcome,
            };

            match outcome {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry);
                    retry += 1;
                    warn!(
                        "Transient oracle failure ({}); retry {}/{} in {:?}",
                        e, retry, self.retry.max_retries, delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Current time truncated to millis, never earlier than the last stamp.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_millis();
        let previous = self.last_stamp.fetch_max(now, Ordering::SeqCst);
        DateTime::from_timestamp_millis(now.max(previous)).unwrap_or_else(Utc::now)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::Sentiment;
    use std::collections::HashSet;

    fn gateway_with(oracle: &ScriptedOracle, retries: u32) -> AnalysisGateway {
        AnalysisGateway::new(Box::new(oracle.clone()), no_backoff(retries))
    }

    #[test]
    fn test_empty_input_never_reaches_oracle() {
        let oracle = ScriptedOracle::default();
        let gateway = gateway_with(&oracle, 1);

        for input in ["", "   ", "\n\t"] {
            assert!(matches!(
                tokio_test::block_on(gateway.analyze(input)),
                Err(AnalysisError::Validation(_))
            ));
        }
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_response_is_normalized() {
        let oracle = ScriptedOracle::new(vec![Ok(payload("NEUTRAL", 0.4))]);
        let gateway = gateway_with(&oracle, 1);

        let input = "  The meeting is at noon.  ";
        let result = gateway.analyze(input).await.unwrap();

        assert_eq!(result.text, input);
        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert!((0.0..=1.0).contains(&result.confidence));
        for (_, value) in result.emotions.entries() {
            assert!((0.0..=1.0).contains(&value));
        }
        assert_eq!(result.entities, vec!["scripted"]);
        assert_eq!(gateway.model_name(), "scripted");
    }

    #[tokio::test]
    async fn test_ids_unique_and_timestamps_monotonic() {
        let oracle = ScriptedOracle::default();
        let gateway = gateway_with(&oracle, 0);

        let mut ids = HashSet::new();
        let mut last = None;
        for i in 0..20 {
            let result = gateway.analyze(&format!("item {}", i)).await.unwrap();
            assert!(ids.insert(result.id));
            if let Some(prev) = last {
                assert!(result.timestamp >= prev);
            }
            last = Some(result.timestamp);
        }
    }

    #[tokio::test]
    async fn test_schema_failure_is_not_retried() {
        let oracle = ScriptedOracle::new(vec![Ok(payload("MIXED", 0.5))]);
        let gateway = gateway_with(&oracle, 3);

        assert!(matches!(
            gateway.analyze("hello").await,
            Err(AnalysisError::Schema(_))
        ));
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let oracle = ScriptedOracle::new(vec![
            Err(AnalysisError::transport("HTTP 503", true)),
            Ok(payload("POSITIVE", 0.7)),
        ]);
        let gateway = gateway_with(&oracle, 1);

        let result = gateway.analyze("hello").await.unwrap();
        assert_eq!(result.confidence, 0.7);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_returns_transport_error() {
        let oracle = ScriptedOracle::new(vec![
            Err(AnalysisError::transport("timeout", true)),
            Err(AnalysisError::transport("timeout", true)),
            Ok(payload("POSITIVE", 0.7)),
        ]);
        let gateway = gateway_with(&oracle, 1);

        assert!(matches!(
            gateway.analyze("hello").await,
            Err(AnalysisError::Transport { .. })
        ));
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let oracle = ScriptedOracle::new(vec![Err(AnalysisError::transport("401", false))]);
        let gateway = gateway_with(&oracle, 2);

        assert!(gateway.analyze("hello").await.is_err());
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_call() {
        let gateway = AnalysisGateway::new(Box::new(StalledOracle), no_backoff(0));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        assert_eq!(
            gateway.analyze_with_cancel("hello", &cancel).await,
            Err(AnalysisError::Cancelled)
        );
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
