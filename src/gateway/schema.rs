//! Structured-output schema and payload validation.
//!
//! The oracle is asked for a JSON object of a fixed shape. Whatever comes
//! back is decoded into [`OracleVerdict`] and range-checked here; anything
//! that does not fit is a [`AnalysisError::Schema`], never a partial result.

use crate::error::AnalysisError;
use crate::models::{Emotions, Sentiment};
use serde::Deserialize;
use serde_json::{json, Value};

/// Typed, validated fields of an oracle answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OracleVerdict {
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub emotions: Emotions,
    pub explanation: String,
    pub entities: Vec<String>,
}

/// Response schema sent along with every generation request.
pub fn response_schema() -> Value {
    let emotion = json!({ "type": "NUMBER" });
    json!({
        "type": "OBJECT",
        "properties": {
            "sentiment": {
                "type": "STRING",
                "format": "enum",
                "enum": Sentiment::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                "description": "The overall sentiment: POSITIVE, NEGATIVE, or NEUTRAL"
            },
            "confidence": {
                "type": "NUMBER",
                "description": "Confidence score between 0 and 1"
            },
            "emotions": {
                "type": "OBJECT",
                "properties": {
                    "joy": emotion,
                    "sadness": emotion,
                    "anger": emotion,
                    "fear": emotion,
                    "surprise": emotion
                },
                "required": ["joy", "sadness", "anger", "fear", "surprise"]
            },
            "explanation": {
                "type": "STRING",
                "description": "A brief one-sentence explanation of the sentiment analysis result."
            },
            "entities": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Key entities or themes found in the text."
            }
        },
        "required": ["sentiment", "confidence", "emotions", "explanation", "entities"]
    })
}

/// Decode and validate a raw oracle payload.
pub fn decode_payload(raw: &str) -> Result<OracleVerdict, AnalysisError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AnalysisError::Schema("empty payload".to_string()));
    }

    let verdict: OracleVerdict =
        serde_json::from_str(raw).map_err(|e| AnalysisError::Schema(e.to_string()))?;

    check_unit_range("confidence", verdict.confidence)?;
    for (name, value) in verdict.emotions.entries() {
        check_unit_range(&format!("emotions.{}", name), value)?;
    }

    if verdict.explanation.trim().is_empty() {
        return Err(AnalysisError::Schema("explanation is empty".to_string()));
    }

    Ok(verdict)
}

fn check_unit_range(field: &str, value: f64) -> Result<(), AnalysisError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AnalysisError::Schema(format!(
            "{} = {} is outside [0, 1]",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "sentiment": "NEGATIVE",
        "confidence": 0.82,
        "emotions": {"joy": 0, "sadness": 0.7, "anger": 0.4, "fear": 0.1, "surprise": 1},
        "explanation": "The author is disappointed.",
        "entities": ["delivery", "support team"],
        "extra": "ignored"
    }"#;

    fn assert_schema_error(raw: &str, needle: &str) {
        match decode_payload(raw) {
            Err(AnalysisError::Schema(msg)) => {
                assert!(msg.contains(needle), "'{}' not found in '{}'", needle, msg)
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_valid_payload() {
        let verdict = decode_payload(VALID).unwrap();
        assert_eq!(verdict.sentiment, Sentiment::Negative);
        assert_eq!(verdict.confidence, 0.82);
        assert_eq!(verdict.emotions.surprise, 1.0);
        assert_eq!(verdict.entities, vec!["delivery", "support team"]);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        assert_schema_error(
            r#"{"sentiment":"NEUTRAL","emotions":{"joy":0,"sadness":0,"anger":0,"fear":0,"surprise":0},"explanation":"x","entities":[]}"#,
            "confidence",
        );
    }

    #[test]
    fn test_missing_emotion_is_rejected() {
        assert_schema_error(
            r#"{"sentiment":"NEUTRAL","confidence":0.5,"emotions":{"joy":0,"sadness":0,"anger":0,"fear":0},"explanation":"x","entities":[]}"#,
            "surprise",
        );
    }

    #[test]
    fn test_unknown_sentiment_is_rejected() {
        assert_schema_error(
            r#"{"sentiment":"MIXED","confidence":0.5,"emotions":{"joy":0,"sadness":0,"anger":0,"fear":0,"surprise":0},"explanation":"x","entities":[]}"#,
            "MIXED",
        );
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        assert!(matches!(
            decode_payload(
                r#"{"sentiment":"NEUTRAL","confidence":"high","emotions":{"joy":0,"sadness":0,"anger":0,"fear":0,"surprise":0},"explanation":"x","entities":[]}"#
            ),
            Err(AnalysisError::Schema(_))
        ));
        assert!(matches!(
            decode_payload(
                r#"{"sentiment":"NEUTRAL","confidence":0.5,"emotions":{"joy":0,"sadness":0,"anger":0,"fear":0,"surprise":0},"explanation":"x","entities":[1,2]}"#
            ),
            Err(AnalysisError::Schema(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert_schema_error(
            r#"{"sentiment":"POSITIVE","confidence":1.2,"emotions":{"joy":0,"sadness":0,"anger":0,"fear":0,"surprise":0},"explanation":"x","entities":[]}"#,
            "confidence",
        );
        assert_schema_error(
            r#"{"sentiment":"POSITIVE","confidence":0.9,"emotions":{"joy":-0.1,"sadness":0,"anger":0,"fear":0,"surprise":0},"explanation":"x","entities":[]}"#,
            "emotions.joy",
        );
    }

    #[test]
    fn test_empty_explanation_and_payload() {
        assert_schema_error(
            r#"{"sentiment":"POSITIVE","confidence":0.9,"emotions":{"joy":1,"sadness":0,"anger":0,"fear":0,"surprise":0},"explanation":"  ","entities":[]}"#,
            "explanation",
        );
        assert_schema_error("   ", "empty payload");
        assert!(matches!(decode_payload("not json"), Err(AnalysisError::Schema(_))));
    }

    #[test]
    fn test_response_schema_shape() {
        let schema = response_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(
            schema["properties"]["sentiment"]["enum"],
            json!(["POSITIVE", "NEGATIVE", "NEUTRAL"])
        );
        assert_eq!(schema["required"].as_array().map(|r| r.len()), Some(5));
        assert_eq!(
            schema["properties"]["emotions"]["required"]
                .as_array()
                .map(|r| r.len()),
            Some(5)
        );
    }
}
