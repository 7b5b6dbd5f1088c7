//! OpenAI chat-completions classifier

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{Classification, Classifier, ClassifierError, Payload, render_payload};
use crate::error::truncate_chars;

const SYSTEM_PROMPT: &str = "You are a CI/CD security expert. Analyze the provided pipeline \
payload and identify potential security problems such as exposed credentials or secrets, \
excessive permissions and risky commands. Finish with a single line reading either \
'DECISION: OK' or 'DECISION: BLOCK'.";

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Classifier backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

impl OpenAiClassifier {
    /// The key may be absent; calls then fail with `MissingApiKey`.
    pub fn new(api_key: Option<String>, api_base: &str, model: &str) -> Result<Self, ClassifierError> {
        let base = Url::parse(api_base)
            .map_err(|err| ClassifierError::InvalidBaseUrl(format!("{api_base}: {err}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            endpoint: format!("{}/chat/completions", base.as_str().trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn analyze(&self, payload: &Payload) -> Result<Classification, ClassifierError> {
        let api_key = self.api_key.as_deref().ok_or(ClassifierError::MissingApiKey)?;

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": render_payload(payload)},
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            warn!(status = status.as_u16(), "Classifier request rejected");
            return Err(ClassifierError::Http {
                status: status.as_u16(),
                body: body.map(|text| truncate_chars(&text, 500)),
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| ClassifierError::MalformedResponse(err.to_string()))?;

        let analysis = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ClassifierError::MalformedResponse("no completion content".to_string()))?;

        debug!(model = %self.model, chars = analysis.len(), "Received classification");
        Ok(Classification::from_analysis(analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierStatus;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    fn payload() -> Payload {
        let mut payload = Payload::new();
        payload.insert("workflow".to_string(), json!("on: push"));
        payload
    }

    #[tokio::test]
    async fn test_completion_is_classified() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "The job exposes a secret token.\nDECISION: BLOCK"}}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let classifier = OpenAiClassifier::new(
            Some("sk-test".to_string()),
            &format!("{}/v1", mock_server.uri()),
            "gpt-4",
        )
        .unwrap();

        let result = classifier.analyze(&payload()).await.unwrap();
        assert_eq!(result.status, ClassifierStatus::Fail);
        assert!(result.details["full_analysis"]
            .as_str()
            .unwrap()
            .ends_with("DECISION: BLOCK"));
    }

    #[tokio::test]
    async fn test_upstream_error_is_surfaced() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&mock_server)
            .await;

        let classifier =
            OpenAiClassifier::new(Some("sk-test".to_string()), &mock_server.uri(), "gpt-4").unwrap();

        match classifier.analyze(&payload()).await {
            Err(ClassifierError::Http { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body.as_deref(), Some("rate limited"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_are_malformed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&mock_server)
            .await;

        let classifier =
            OpenAiClassifier::new(Some("sk-test".to_string()), &mock_server.uri(), "gpt-4").unwrap();

        assert!(matches!(
            classifier.analyze(&payload()).await,
            Err(ClassifierError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_calling_upstream() {
        let classifier =
            OpenAiClassifier::new(None, "https://api.openai.com/v1", "gpt-4").unwrap();

        assert!(matches!(
            classifier.analyze(&payload()).await,
            Err(ClassifierError::MissingApiKey)
        ));
    }

    #[test]
    fn test_endpoint_and_invalid_base() {
        let classifier =
            OpenAiClassifier::new(None, "https://api.openai.com/v1/", "gpt-4").unwrap();
        assert_eq!(classifier.endpoint(), "https://api.openai.com/v1/chat/completions");

        assert!(matches!(
            OpenAiClassifier::new(None, "not a url", "gpt-4"),
            Err(ClassifierError::InvalidBaseUrl(_))
        ));
    }
}
