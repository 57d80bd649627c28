pub mod behavioral;
pub mod phrase;
pub mod sentiment;

use crate::models::Conversation;

/// Output of a single local signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutcome {
    pub score: Option<f64>,
    pub tags: Vec<String>,
    pub detail: String,
}

impl SignalOutcome {
    pub fn untagged(score: Option<f64>, detail: String) -> Self {
        Self {
            score,
            tags: Vec::new(),
            detail,
        }
    }
}

/// A synchronous, side-effect free signal over one conversation.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, conversation: &Conversation) -> SignalOutcome;
}
