pub mod config;
pub mod engine;
pub mod grading;
pub mod models;
pub mod pipeline;
pub mod rubric;
pub mod sampling;
pub mod scorers;
pub mod summary;
pub mod text;
pub mod trace;

pub use config::ClassifierConfig;
pub use engine::{Classifier, LocalScores, ModelOutcome};
pub use grading::{grade_with_retry, Assessment, ConversationGrader, GradingError, GradingRequest};
pub use models::{Conversation, ScoredConversation, Tier};
pub use pipeline::{run_batch, BatchOutcome};
pub use summary::{conversation_samples, BatchSummary, ConversationSample};
pub use trace::RuleTrace;
