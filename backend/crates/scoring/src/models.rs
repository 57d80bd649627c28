use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::grading::Assessment;
use crate::trace::RuleTrace;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "human", alias = "user")]
    Customer,
    #[serde(alias = "ai", alias = "assistant")]
    Agent,
    #[serde(alias = "tool")]
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Sentiment label computed upstream. Portuguese labels from the extractor
/// are accepted alongside the English ones.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "positive" | "positivo" => Ok(Self::Positive),
            "neutral" | "neutro" => Ok(Self::Neutral),
            "negative" | "negativo" => Ok(Self::Negative),
            other => Err(format!("unknown sentiment label: {other}")),
        }
    }
}

/// Empty or unrecognised labels count as "no sentiment" rather than failing the batch.
fn sentiment_label<'de, D>(deserializer: D) -> Result<Option<Sentiment>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|label| label.parse().ok()))
}

fn session_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// One chat turn. Deserializes from the flat `{role, content, timestamp}`
/// shape or from an extractor row whose `message` holds the chat payload,
/// either as an object or as an encoded JSON string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "WireMessage")]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Nested {
        message: MessageBody,
        #[serde(default, alias = "timestamp")]
        created_at: Option<DateTime<Utc>>,
    },
    Flat {
        #[serde(alias = "type")]
        role: Role,
        #[serde(default)]
        content: String,
        #[serde(default, alias = "created_at")]
        timestamp: Option<DateTime<Utc>>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageBody {
    Object(ChatPayload),
    Encoded(String),
}

#[derive(Deserialize)]
struct ChatPayload {
    #[serde(default, rename = "type", alias = "role")]
    kind: String,
    #[serde(default)]
    content: String,
}

impl ChatPayload {
    /// Unparseable strings are kept as content of an unknown speaker.
    fn decode(raw: String) -> Self {
        serde_json::from_str(&raw).unwrap_or(Self {
            kind: String::new(),
            content: raw,
        })
    }

    fn role(&self) -> Role {
        match self.kind.trim().to_lowercase().as_str() {
            "human" | "user" | "customer" => Role::Customer,
            "ai" | "assistant" | "agent" => Role::Agent,
            _ => Role::System,
        }
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        match wire {
            WireMessage::Flat {
                role,
                content,
                timestamp,
            } => Self {
                role,
                content,
                timestamp,
            },
            WireMessage::Nested {
                message,
                created_at,
            } => {
                let payload = match message {
                    MessageBody::Object(payload) => payload,
                    MessageBody::Encoded(raw) => ChatPayload::decode(raw),
                };
                Self {
                    role: payload.role(),
                    content: payload.content,
                    timestamp: created_at,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(deserialize_with = "session_id")]
    pub id: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(
        default,
        alias = "analyse_sentimental",
        deserialize_with = "sentiment_label"
    )]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn customer_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::Customer)
    }

    /// Time between the first and last timestamped message. Falls back to the
    /// session start/end when fewer than two messages carry timestamps.
    pub fn elapsed(&self) -> Option<Duration> {
        let mut stamps = self.messages.iter().filter_map(|m| m.timestamp);
        if let Some(first) = stamps.next() {
            if let Some(last) = stamps.last() {
                return Some(last - first);
            }
        }
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GradingStatus {
    Graded,
    Skipped,
    Failed,
    Cancelled,
}

/// The four signals feeding the fused score. `None` means the signal was not
/// available for this conversation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SubScores {
    pub phrase: Option<f64>,
    pub behavioral: Option<f64>,
    pub model: Option<f64>,
    pub sentiment: Option<f64>,
}

/// Classification result for one conversation. Produced once per run; a new
/// run yields a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredConversation {
    pub conversation_id: String,
    pub sub_scores: SubScores,
    pub confidence_score: f64,
    pub tier: Tier,
    pub categories: BTreeSet<String>,
    pub grading: GradingStatus,
    pub grading_error: Option<String>,
    pub assessment: Option<Assessment>,
    pub trace: RuleTrace,
    pub config_version: String,
}

impl ScoredConversation {
    pub fn has_error(&self) -> bool {
        self.tier != Tier::Low
    }
}
