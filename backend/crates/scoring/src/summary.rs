use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_common::types::RunInfo;

use crate::models::{
    Conversation, GradingStatus, Message, Sentiment, ScoredConversation, SessionStatus, Tier,
};
use crate::sampling::SamplingCounts;

/// Aggregate view of one classification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub graded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Tag counts over conversations classified High or Medium.
    pub error_categories: BTreeMap<String, usize>,
    /// Percentage of High + Medium, two decimals.
    pub error_rate: f64,
    pub sampling: SamplingCounts,
    pub run: RunInfo,
}

impl BatchSummary {
    pub fn from_records(
        records: &[ScoredConversation],
        sampling: SamplingCounts,
        run: RunInfo,
    ) -> Self {
        let mut summary = Self {
            total: records.len(),
            high: 0,
            medium: 0,
            low: 0,
            graded: 0,
            skipped: 0,
            failed: 0,
            cancelled: 0,
            error_categories: BTreeMap::new(),
            error_rate: 0.0,
            sampling,
            run,
        };

        for record in records {
            match record.tier {
                Tier::High => summary.high += 1,
                Tier::Medium => summary.medium += 1,
                Tier::Low => summary.low += 1,
            }
            match record.grading {
                GradingStatus::Graded => summary.graded += 1,
                GradingStatus::Skipped => summary.skipped += 1,
                GradingStatus::Failed => summary.failed += 1,
                GradingStatus::Cancelled => summary.cancelled += 1,
            }
            if record.has_error() {
                for tag in &record.categories {
                    *summary.error_categories.entry(tag.clone()).or_default() += 1;
                }
            }
        }

        if summary.total > 0 {
            let rate = (summary.high + summary.medium) as f64 / summary.total as f64 * 100.0;
            summary.error_rate = (rate * 100.0).round() / 100.0;
        }

        summary
    }
}

/// A scored conversation joined with its transcript for reviewer drill-down.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSample {
    pub conversation_id: String,
    pub confidence_score: f64,
    pub tier: Tier,
    pub categories: Vec<String>,
    pub status: SessionStatus,
    pub sentiment: Option<Sentiment>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub messages: Vec<Message>,
}

/// Top `n` records by confidence, ties in input order. `records` and
/// `conversations` must be index-aligned, as `run_batch` returns them.
pub fn conversation_samples(
    records: &[ScoredConversation],
    conversations: &[Conversation],
    n: usize,
) -> Vec<ConversationSample> {
    let mut order: Vec<usize> = (0..records.len().min(conversations.len())).collect();
    order.sort_by(|&a, &b| {
        records[b]
            .confidence_score
            .total_cmp(&records[a].confidence_score)
    });

    order
        .into_iter()
        .take(n)
        .map(|i| {
            let record = &records[i];
            let conversation = &conversations[i];
            ConversationSample {
                conversation_id: record.conversation_id.clone(),
                confidence_score: record.confidence_score,
                tier: record.tier,
                categories: record.categories.iter().cloned().collect(),
                status: conversation.status,
                sentiment: conversation.sentiment,
                started_at: conversation.started_at,
                ended_at: conversation.ended_at,
                messages: conversation.messages.clone(),
            }
        })
        .collect()
}
