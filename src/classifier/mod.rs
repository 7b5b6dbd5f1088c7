//! # Classification Engine
//!
//! Security classification of CI/CD pipeline payloads. The entitlement core
//! treats the engine as an opaque, possibly slow, possibly failing black box:
//! its verdict is logged and returned, never used for access decisions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::ClassifierConfig;

pub mod heuristic;
pub mod openai;

pub use heuristic::HeuristicClassifier;
pub use openai::OpenAiClassifier;

/// Pipeline payload as submitted by the caller
pub type Payload = Map<String, JsonValue>;

/// Number of characters kept in the verdict summary
pub const SUMMARY_CHARS: usize = 200;

/// Verdict of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClassifierStatus {
    Ok,
    Risk,
    Fail,
}

impl ClassifierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Risk => "RISK",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for ClassifierStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a classification call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub status: ClassifierStatus,
    pub analysis: String,
    pub details: JsonValue,
}

impl Classification {
    /// Build a classification from free-form analysis text
    pub fn from_analysis(analysis: String) -> Self {
        Self {
            status: classify_analysis(&analysis),
            details: json!({
                "summary": analysis.chars().take(SUMMARY_CHARS).collect::<String>(),
                "full_analysis": analysis,
            }),
            analysis,
        }
    }
}

/// Classification engine failures
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier returned HTTP {status}")]
    Http { status: u16, body: Option<String> },

    #[error("classifier request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("classification timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("unsupported classifier provider: {provider}")]
    UnsupportedProvider { provider: String },

    #[error("classifier API key is not configured")]
    MissingApiKey,

    #[error("invalid classifier base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Classification engine interface
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Provider name used in logs and metrics
    fn name(&self) -> &'static str;

    async fn analyze(&self, payload: &Payload) -> Result<Classification, ClassifierError>;
}

/// Keyword rules mapping analysis text to a verdict.
///
/// An explicit `DECISION: BLOCK` or any credential / secret finding fails
/// the pipeline; permission or risk findings flag it.
pub fn classify_analysis(analysis: &str) -> ClassifierStatus {
    let upper = analysis.to_uppercase();

    if upper.contains("DECISION: BLOCK") || upper.contains("CREDENTIAL") || upper.contains("SECRET")
    {
        ClassifierStatus::Fail
    } else if upper.contains("PERMISSION") || upper.contains("RISK") {
        ClassifierStatus::Risk
    } else {
        ClassifierStatus::Ok
    }
}

/// Render a payload key by key for prompting or scanning
pub fn render_payload(payload: &Payload) -> String {
    let mut rendered = String::from("Analyze the following CI/CD pipeline payload:\n\n");
    for (key, value) in payload {
        rendered.push_str(key);
        rendered.push_str(":\n");
        rendered.push_str(&render_value(value));
        rendered.push_str("\n\n");
    }
    rendered
}

fn render_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Run `analyze` under a deadline
pub async fn analyze_with_timeout(
    classifier: &dyn Classifier,
    payload: &Payload,
    timeout: Duration,
) -> Result<Classification, ClassifierError> {
    match tokio::time::timeout(timeout, classifier.analyze(payload)).await {
        Ok(result) => result,
        Err(_) => Err(ClassifierError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Select the configured classification engine
pub fn build_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>, ClassifierError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiClassifier::new(
            config.openai_api_key.clone(),
            &config.openai_api_base,
            &config.openai_model,
        )?)),
        "heuristic" => Ok(Arc::new(HeuristicClassifier)),
        other => Err(ClassifierError::UnsupportedProvider {
            provider: other.to_string(),
        }),
    }
}
