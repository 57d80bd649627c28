use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use triage_common::types::RunInfo;

use crate::engine::{Classifier, LocalScores, ModelOutcome};
use crate::grading::{grade_with_retry, ConversationGrader, GradingError, RetryPolicy};
use crate::models::{Conversation, ScoredConversation};
use crate::rubric::build_request;
use crate::sampling::{select_for_grading, Candidate, SamplingCounts};
use crate::summary::BatchSummary;

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One record per input conversation, in input order.
    pub records: Vec<ScoredConversation>,
    pub summary: BatchSummary,
}

/// Classify a batch of conversations.
///
/// Local signals are computed for everything. A seeded sample is then graded
/// by the model with at most `grading.max_in_flight` calls in flight. Once
/// `cancel` fires no new grading attempt starts: queued conversations and
/// calls waiting on a retry backoff are recorded as cancelled, and a call
/// already on the wire finishes or times out. Grading failures degrade to a
/// missing model signal and never fail the batch.
pub async fn run_batch(
    classifier: Arc<Classifier>,
    conversations: &[Conversation],
    grader: Option<Arc<dyn ConversationGrader>>,
    cancel: CancellationToken,
) -> BatchOutcome {
    let config = classifier.config();
    let run = RunInfo::start(&config.config_version);
    tracing::info!(
        run_id = %run.run_id,
        conversations = conversations.len(),
        config_version = %config.config_version,
        "classification run starting"
    );

    let locals: Vec<LocalScores> = conversations
        .iter()
        .map(|c| classifier.score_local(c))
        .collect();

    let grader = match grader {
        Some(g) if config.grading.enabled => Some(g),
        Some(_) => {
            tracing::info!("model grading disabled by configuration");
            None
        }
        None => {
            tracing::info!("no grader configured, model grading skipped");
            None
        }
    };

    let (outcomes, sampling) = match grader {
        Some(grader) => grade_sample(&classifier, conversations, &locals, grader, cancel).await,
        None => (
            vec![ModelOutcome::Skipped; conversations.len()],
            SamplingCounts::default(),
        ),
    };

    let records: Vec<ScoredConversation> = locals
        .into_iter()
        .zip(outcomes)
        .map(|(local, outcome)| classifier.finalize(local, outcome))
        .collect();

    let summary = BatchSummary::from_records(&records, sampling, run.finish());
    tracing::info!(
        total = summary.total,
        high = summary.high,
        medium = summary.medium,
        low = summary.low,
        graded = summary.graded,
        failed = summary.failed,
        cancelled = summary.cancelled,
        error_rate = summary.error_rate,
        "classification run finished"
    );

    BatchOutcome { records, summary }
}

async fn grade_sample(
    classifier: &Classifier,
    conversations: &[Conversation],
    locals: &[LocalScores],
    grader: Arc<dyn ConversationGrader>,
    cancel: CancellationToken,
) -> (Vec<ModelOutcome>, SamplingCounts) {
    let config = classifier.config();

    let candidates: Vec<Candidate> = locals
        .iter()
        .map(|local| Candidate {
            sentiment: local.sentiment_label,
            tier: classifier.preliminary(local).1,
        })
        .collect();
    let selection = select_for_grading(&candidates, &config.sampling);
    let c = &selection.counts;
    tracing::info!(
        selected = c.total_selected,
        negative = c.negative,
        high_confidence = c.high_confidence,
        medium_sample = c.medium_sample,
        neutral_sample = c.neutral_sample,
        residual = c.residual,
        "selected conversations for model grading"
    );

    let semaphore = Arc::new(Semaphore::new(config.grading.max_in_flight));
    let policy = Arc::new(RetryPolicy::from_config(&config.grading));

    let mut tasks = FuturesUnordered::new();
    for &idx in &selection.selected {
        let request = build_request(&conversations[idx]);
        let grader = Arc::clone(&grader);
        let semaphore = Arc::clone(&semaphore);
        let policy = Arc::clone(&policy);
        let cancel = cancel.clone();

        tasks.push(tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => ModelOutcome::Cancelled,
                permit = semaphore.acquire_owned() => match permit {
                    Ok(_permit) if cancel.is_cancelled() => ModelOutcome::Cancelled,
                    Ok(_permit) => match grade_with_retry(
                        grader.as_ref(),
                        &request,
                        &policy,
                        &cancel,
                    )
                    .await
                    {
                        Ok(assessment) => ModelOutcome::Graded(assessment),
                        Err(GradingError::Cancelled) => ModelOutcome::Cancelled,
                        Err(e) => {
                            tracing::warn!(
                                conversation_id = %request.conversation_id,
                                error = %e,
                                "model grading failed, signal excluded"
                            );
                            ModelOutcome::Failed(e.to_string())
                        }
                    },
                    Err(e) => ModelOutcome::Failed(format!("semaphore closed: {e}")),
                },
            };
            (idx, outcome)
        }));
    }

    let mut outcomes: Vec<Option<ModelOutcome>> = vec![None; conversations.len()];
    while let Some(joined) = tasks.next().await {
        match joined {
            Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
            Err(e) => tracing::error!(error = %e, "grading task panicked"),
        }
    }

    let outcomes = outcomes
        .into_iter()
        .enumerate()
        .map(|(idx, outcome)| match outcome {
            Some(outcome) => outcome,
            None if selection.contains(idx) => {
                ModelOutcome::Failed("grading task did not complete".to_string())
            }
            None => ModelOutcome::Skipped,
        })
        .collect();

    (outcomes, selection.counts)
}
