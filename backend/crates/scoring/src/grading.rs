use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::GradingConfig;

/// Rubric answer returned by the external grader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    #[serde(default)]
    pub resolved: bool,
    #[serde(default = "default_true")]
    pub understood: bool,
    #[serde(default)]
    pub had_errors: bool,
    #[serde(default)]
    pub error_description: String,
    #[serde(default)]
    pub quality: String,
    pub error_score: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Assessment {
    pub fn check_score(&self) -> Result<(), GradingError> {
        if self.error_score.is_finite() && (0.0..=100.0).contains(&self.error_score) {
            Ok(())
        } else {
            Err(GradingError::Malformed(format!(
                "error_score {} outside [0, 100]",
                self.error_score
            )))
        }
    }

    /// Tags contributed by the model: its own categories plus rubric flags.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        if self.had_errors {
            tags.push("model_reported_error".to_string());
        }
        if !self.resolved {
            tags.push("unresolved".to_string());
        }
        if !self.understood {
            tags.push("misunderstood".to_string());
        }
        tags
    }
}

#[derive(Debug, Clone)]
pub struct GradingRequest {
    pub conversation_id: String,
    pub prompt: String,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum GradingError {
    #[error("grading call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("grader server error: {0}")]
    Server(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("grading cancelled")]
    Cancelled,
}

impl GradingError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_) | Self::Cancelled)
    }
}

/// Capability to grade one conversation against the rubric.
#[async_trait]
pub trait ConversationGrader: Send + Sync {
    async fn grade(&self, request: &GradingRequest) -> Result<Assessment, GradingError>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub timeout: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GradingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_secs),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Exponential backoff before retry number `attempt` (1-based), capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Call the grader with a per-attempt timeout, retrying transient failures.
///
/// Returns the last error once retries are exhausted, or immediately for a
/// non-retryable rejection. Once `cancel` fires no further attempt starts:
/// a pending backoff is cut short and `GradingError::Cancelled` is returned.
/// Callers degrade the error to a missing signal.
pub async fn grade_with_retry(
    grader: &dyn ConversationGrader,
    request: &GradingRequest,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Assessment, GradingError> {
    let mut last_error = GradingError::Transport("no attempt made".to_string());

    for attempt in 0..=policy.max_retries {
        if cancel.is_cancelled() {
            tracing::info!(
                conversation_id = %request.conversation_id,
                attempt,
                "grading cancelled, no further attempts"
            );
            return Err(GradingError::Cancelled);
        }

        if attempt > 0 {
            let backoff = policy.backoff_for(attempt);
            tracing::warn!(
                conversation_id = %request.conversation_id,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %last_error,
                "retrying grading call after backoff"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GradingError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        let result = match tokio::time::timeout(policy.timeout, grader.grade(request)).await {
            Ok(result) => result.and_then(|a| a.check_score().map(|_| a)),
            Err(_) => Err(GradingError::Timeout(policy.timeout)),
        };

        match result {
            Ok(assessment) => return Ok(assessment),
            Err(e) if e.is_retryable() => last_error = e,
            Err(e) => {
                tracing::warn!(
                    conversation_id = %request.conversation_id,
                    error = %e,
                    "grading call rejected, not retrying"
                );
                return Err(e);
            }
        }
    }

    Err(last_error)
}
