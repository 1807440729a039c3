//! Oracle clients.
//!
//! An [`Oracle`] turns input text into the raw structured payload produced
//! by a generative-language model. [`GeminiOracle`] talks to the Gemini
//! `generateContent` endpoint with a fixed response schema.

use crate::error::AnalysisError;
use crate::gateway::schema::response_schema;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Source of raw analysis payloads.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Ask the model to analyze `text`. Returns the JSON payload as text.
    async fn generate(&self, text: &str) -> Result<String, AnalysisError>;

    /// Model identifier, for logs and reports.
    fn model_name(&self) -> &str;
}

/// Settings for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

/// Gemini `generateContent` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: String,
    response_schema: Value,
}

/// Gemini `generateContent` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Client for the Gemini generative-language API.
pub struct GeminiOracle {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiOracle {
    /// Create a client. Fails when no API key is configured.
    pub fn new(config: GeminiConfig) -> Result<Self, AnalysisError> {
        if config.api_key.trim().is_empty() {
            return Err(AnalysisError::Configuration(
                "no API key configured; set GEMINI_API_KEY or pass --api-key".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AnalysisError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        info!(
            "Initializing Gemini client with model {} at {}",
            config.model_name, config.api_url
        );

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model_name
        )
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn generate(&self, text: &str) -> Result<String, AnalysisError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(build_prompt(text)),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
            },
        };

        debug!("Sending generateContent request ({} chars)", text.len());

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::transport(
                        format!("request timed out after {}s", self.config.timeout_seconds),
                        true,
                    )
                } else if e.is_connect() {
                    AnalysisError::transport(
                        format!("cannot connect to {}", self.config.api_url),
                        true,
                    )
                } else {
                    AnalysisError::transport(format!("failed to send request: {}", e), false)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Schema(format!("unreadable response envelope: {}", e)))?;

        extract_payload(body)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        "Analyze the following text for sentiment and emotional depth.\nText to analyze: \"{}\"",
        text
    )
}

/// Classify a non-success HTTP status.
fn status_error(status: StatusCode, body: &str) -> AnalysisError {
    let detail = body.trim();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalysisError::transport(
            format!("authentication rejected ({}): {}", status, detail),
            false,
        ),
        StatusCode::TOO_MANY_REQUESTS => {
            AnalysisError::transport(format!("rate limited ({}): {}", status, detail), true)
        }
        s if s.is_server_error() => {
            AnalysisError::transport(format!("server error {}: {}", status, detail), true)
        }
        _ => AnalysisError::transport(format!("API error {}: {}", status, detail), false),
    }
}

/// Pull the structured payload out of the first candidate.
fn extract_payload(response: GenerateContentResponse) -> Result<String, AnalysisError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(AnalysisError::Schema(format!(
            "prompt was blocked: {}",
            reason
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisError::Schema("response contained no candidates".to_string()))?;

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    candidate
        .content
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or_else(|| {
            AnalysisError::Schema(format!(
                "candidate contained no text (finish reason: {})",
                if finish_reason.is_empty() {
                    "unknown"
                } else {
                    finish_reason.as_str()
                }
            ))
        })
}
