use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use triage_config::GraderSettings;
use triage_scoring::rubric::parse_assessment;
use triage_scoring::{Assessment, ConversationGrader, GradingError, GradingRequest};

use super::models::{GenerateContentRequest, GenerateContentResponse};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Grades conversations with the Gemini `generateContent` endpoint.
///
/// One HTTP call per `grade`. Retry and backoff live in
/// `triage_scoring::grade_with_retry`; this client only maps responses onto
/// `GradingError` so the caller can tell transient failures from rejections.
///
/// The API key travels in the `x-goog-api-key` header and reqwest errors are
/// stripped of their URL, so the key never reaches error text or logs.
#[derive(Clone)]
pub struct GeminiGrader {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiGrader {
    pub fn new(settings: &GraderSettings, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ConversationGrader for GeminiGrader {
    async fn grade(&self, request: &GradingRequest) -> Result<Assessment, GradingError> {
        let body = GenerateContentRequest::from_prompt(&request.prompt);

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GradingError::Timeout(self.timeout)
                } else {
                    GradingError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => GradingError::RateLimited(body),
                s if s.is_server_error() => GradingError::Server(format!("{s}: {body}")),
                s => GradingError::Rejected(format!("{s}: {body}")),
            });
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GradingError::Malformed(e.without_url().to_string()))?;

        let text = payload
            .text()
            .ok_or_else(|| GradingError::Malformed("response has no candidate text".to_string()))?;

        tracing::debug!(
            conversation_id = %request.conversation_id,
            chars = text.len(),
            "grader replied"
        );

        parse_assessment(&text)
    }
}
