use crate::models::{Conversation, Sentiment};

use super::{Scorer, SignalOutcome};

/// Fixed error prior per sentiment label.
pub fn sentiment_prior(sentiment: Sentiment) -> f64 {
    match sentiment {
        Sentiment::Negative => 80.0,
        Sentiment::Neutral => 20.0,
        Sentiment::Positive => 5.0,
    }
}

pub struct SentimentCorrelationScorer;

impl Scorer for SentimentCorrelationScorer {
    fn name(&self) -> &'static str {
        "sentiment_correlation"
    }

    fn score(&self, conversation: &Conversation) -> SignalOutcome {
        let score = conversation.sentiment.map(sentiment_prior);
        SignalOutcome::untagged(
            score,
            format!(
                "sentiment={}",
                conversation.sentiment.map_or("none", |s| s.as_str())
            ),
        )
    }
}
