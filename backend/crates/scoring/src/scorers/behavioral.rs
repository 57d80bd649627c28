use crate::config::BehavioralConfig;
use crate::models::{Conversation, SessionStatus};
use crate::text::fold;

use super::{Scorer, SignalOutcome};

/// Rule-based signal over conversation shape. Each triggered rule adds its
/// configured increment; the total is capped at 100.
pub struct BehavioralPatternScorer {
    config: BehavioralConfig,
}

impl BehavioralPatternScorer {
    pub fn new(config: BehavioralConfig) -> Self {
        Self { config }
    }

    /// Two consecutive customer messages that are identical or nearly so
    /// after folding.
    fn has_repeated_messages(&self, conversation: &Conversation) -> bool {
        let texts: Vec<String> = conversation
            .customer_messages()
            .map(|m| fold(&m.content))
            .filter(|t| !t.is_empty())
            .collect();

        texts.windows(2).any(|pair| {
            pair[0] == pair[1]
                || strsim::normalized_levenshtein(&pair[0], &pair[1])
                    >= self.config.near_duplicate_similarity
        })
    }
}

impl Scorer for BehavioralPatternScorer {
    fn name(&self) -> &'static str {
        "behavioral_patterns"
    }

    fn score(&self, conversation: &Conversation) -> SignalOutcome {
        let cfg = &self.config;
        let inc = &cfg.increments;
        let mut total = 0.0;
        let mut tags = Vec::new();
        let mut trigger = |tag: &str, increment: f64| {
            total += increment;
            tags.push(tag.to_string());
        };

        // An empty conversation is an extraction gap, not a short one.
        let count = conversation.message_count();
        if count > 0 && count < cfg.short_conversation_messages {
            trigger("short_conversation", inc.short_conversation);
        }

        let elapsed_secs = conversation
            .elapsed()
            .map(|d| d.num_milliseconds() as f64 / 1000.0);
        if let Some(secs) = elapsed_secs {
            if secs > 0.0 && secs < cfg.rapid_abandonment_secs as f64 {
                trigger("rapid_abandonment", inc.rapid_abandonment);
            }
            if conversation.status == SessionStatus::Active && secs > cfg.stuck_session_secs as f64 {
                trigger("stuck_session", inc.stuck_session);
            }
        }

        if self.has_repeated_messages(conversation) {
            trigger("repeated_messages", inc.repeated_messages);
        }

        if conversation.status == SessionStatus::Failed {
            trigger("failed_session", inc.failed_session);
        }

        if conversation.status == SessionStatus::Active && conversation.sentiment.is_none() {
            trigger("missing_sentiment", inc.missing_sentiment);
        }

        let detail = format!(
            "messages={count} elapsed_secs={} status={} rules=[{}]",
            elapsed_secs.map_or("none".to_string(), |s| format!("{s:.0}")),
            conversation.status.as_str(),
            tags.join(",")
        );

        SignalOutcome {
            score: Some(total.min(100.0)),
            tags,
            detail,
        }
    }
}
