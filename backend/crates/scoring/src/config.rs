use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use triage_common::error::{TriageError, TriageResult};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub phrase: f64,
    pub behavioral: f64,
    pub model: f64,
    pub sentiment: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            phrase: 0.30,
            behavioral: 0.25,
            model: 0.35,
            sentiment: 0.10,
        }
    }
}

impl FusionWeights {
    pub fn sum(&self) -> f64 {
        self.phrase + self.behavioral + self.model + self.sentiment
    }
}

/// How fusion treats a signal that produced no score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingSignalPolicy {
    /// Drop the signal and divide by the weights that remain.
    #[default]
    Renormalize,
    /// Count the signal as 0 and keep its weight.
    TreatAsZero,
}

/// `score > high` is High, `score >= medium` is Medium, anything else is Low.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            high: 70.0,
            medium: 40.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleIncrements {
    pub short_conversation: f64,
    pub rapid_abandonment: f64,
    pub repeated_messages: f64,
    pub stuck_session: f64,
    pub failed_session: f64,
    pub missing_sentiment: f64,
}

impl Default for RuleIncrements {
    fn default() -> Self {
        Self {
            short_conversation: 30.0,
            rapid_abandonment: 40.0,
            repeated_messages: 25.0,
            stuck_session: 35.0,
            failed_session: 50.0,
            missing_sentiment: 10.0,
        }
    }
}

impl RuleIncrements {
    fn all(&self) -> [(&'static str, f64); 6] {
        [
            ("short_conversation", self.short_conversation),
            ("rapid_abandonment", self.rapid_abandonment),
            ("repeated_messages", self.repeated_messages),
            ("stuck_session", self.stuck_session),
            ("failed_session", self.failed_session),
            ("missing_sentiment", self.missing_sentiment),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehavioralConfig {
    pub short_conversation_messages: usize,
    pub rapid_abandonment_secs: u64,
    pub stuck_session_secs: u64,
    pub near_duplicate_similarity: f64,
    pub increments: RuleIncrements,
}

impl Default for BehavioralConfig {
    fn default() -> Self {
        Self {
            short_conversation_messages: 3,
            rapid_abandonment_secs: 120,
            stuck_session_secs: 1800,
            near_duplicate_similarity: 0.9,
            increments: RuleIncrements::default(),
        }
    }
}

/// A dictionary entry: either a literal phrase or `{ "pattern": "<regex>" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PhraseRule {
    Literal(String),
    Pattern { pattern: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseCategory {
    #[serde(default = "default_severity")]
    pub severity: f64,
    #[serde(default)]
    pub phrases: Vec<PhraseRule>,
}

fn default_severity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseConfig {
    pub points_per_match: f64,
    pub categories: BTreeMap<String, PhraseCategory>,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        let literal = |items: &[&str]| -> Vec<PhraseRule> {
            items
                .iter()
                .map(|p| PhraseRule::Literal((*p).to_string()))
                .collect()
        };

        let mut categories = BTreeMap::new();
        categories.insert(
            "error_indicators".to_string(),
            PhraseCategory {
                severity: 1.0,
                phrases: literal(&[
                    "não funciona",
                    "não funcionou",
                    "não consigo",
                    "não resolveu",
                    "deu errado",
                    "deu erro",
                    "não entendi",
                    "não recebi",
                    "pedido errado",
                    "cobrado duas vezes",
                    "você não entendeu",
                ]),
            },
        );
        categories.insert(
            "frustration_indicators".to_string(),
            PhraseCategory {
                severity: 1.5,
                phrases: literal(&[
                    "absurdo",
                    "ridículo",
                    "péssimo",
                    "horrível",
                    "já falei",
                    "já disse",
                    "ninguém responde",
                    "cansado de esperar",
                    "decepcionado",
                    "que vergonha",
                ]),
            },
        );
        let mut escalation = literal(&[
            "falar com humano",
            "atendente humano",
            "falar com uma pessoa",
            "quero falar com alguém",
            "gerente",
            "reclame aqui",
            "procon",
        ]);
        escalation.push(PhraseRule::Pattern {
            pattern: r"\breembols(o|ar|em)\b".to_string(),
        });
        categories.insert(
            "escalation_phrases".to_string(),
            PhraseCategory {
                severity: 2.0,
                phrases: escalation,
            },
        );

        Self {
            points_per_match: 10.0,
            categories,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub overall_rate: f64,
    pub medium_fraction: f64,
    pub neutral_fraction: f64,
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            overall_rate: 0.15,
            medium_fraction: 0.30,
            neutral_fraction: 0.10,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    pub enabled: bool,
    pub max_in_flight: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_in_flight: 50,
            timeout_secs: 30,
            max_retries: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

/// Everything the classifier needs for one run. Built once, validated, then
/// shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub config_version: String,
    pub weights: FusionWeights,
    pub missing_signal: MissingSignalPolicy,
    pub thresholds: TierThresholds,
    pub behavioral: BehavioralConfig,
    pub phrases: PhraseConfig,
    pub sampling: SamplingConfig,
    pub grading: GradingConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            config_version: "v1".to_string(),
            weights: FusionWeights::default(),
            missing_signal: MissingSignalPolicy::default(),
            thresholds: TierThresholds::default(),
            behavioral: BehavioralConfig::default(),
            phrases: PhraseConfig::default(),
            sampling: SamplingConfig::default(),
            grading: GradingConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Parse a JSON document and validate it. Missing sections take defaults.
    pub fn from_json_str(raw: &str) -> TriageResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| TriageError::Config(format!("invalid classifier config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> TriageResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TriageError::Config(format!("cannot read classifier config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Reject configurations that would silently misclassify.
    pub fn validate(&self) -> TriageResult<()> {
        let w = &self.weights;
        for (name, value) in [
            ("phrase", w.phrase),
            ("behavioral", w.behavioral),
            ("model", w.model),
            ("sentiment", w.sentiment),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TriageError::Config(format!(
                    "weight {name}={value} must be within [0, 1]"
                )));
            }
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(TriageError::Config(format!(
                "fusion weights must sum to 1.0, got {}",
                w.sum()
            )));
        }

        let t = &self.thresholds;
        if !(0.0 <= t.medium && t.medium < t.high && t.high <= 100.0) {
            return Err(TriageError::Config(format!(
                "thresholds must satisfy 0 <= medium < high <= 100, got medium={} high={}",
                t.medium, t.high
            )));
        }

        let b = &self.behavioral;
        if b.short_conversation_messages == 0 {
            return Err(TriageError::Config(
                "short_conversation_messages must be at least 1".to_string(),
            ));
        }
        if b.rapid_abandonment_secs == 0 || b.stuck_session_secs == 0 {
            return Err(TriageError::Config(
                "behavioral durations must be positive".to_string(),
            ));
        }
        if b.stuck_session_secs <= b.rapid_abandonment_secs {
            return Err(TriageError::Config(format!(
                "stuck_session_secs ({}) must exceed rapid_abandonment_secs ({})",
                b.stuck_session_secs, b.rapid_abandonment_secs
            )));
        }
        if !(0.0..=1.0).contains(&b.near_duplicate_similarity) {
            return Err(TriageError::Config(format!(
                "near_duplicate_similarity={} must be within [0, 1]",
                b.near_duplicate_similarity
            )));
        }
        for (rule, inc) in b.increments.all() {
            if !inc.is_finite() || inc < 0.0 {
                return Err(TriageError::Config(format!(
                    "increment for {rule} must be a non-negative number, got {inc}"
                )));
            }
        }

        let s = &self.sampling;
        for (name, value) in [
            ("overall_rate", s.overall_rate),
            ("medium_fraction", s.medium_fraction),
            ("neutral_fraction", s.neutral_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TriageError::Config(format!(
                    "sampling {name}={value} must be within [0, 1]"
                )));
            }
        }

        let g = &self.grading;
        if g.max_in_flight == 0 {
            return Err(TriageError::Config(
                "grading.max_in_flight must be at least 1".to_string(),
            ));
        }
        if g.timeout_secs == 0 {
            return Err(TriageError::Config(
                "grading.timeout_secs must be positive".to_string(),
            ));
        }
        if g.base_backoff_ms > g.max_backoff_ms {
            return Err(TriageError::Config(format!(
                "grading.base_backoff_ms ({}) exceeds max_backoff_ms ({})",
                g.base_backoff_ms, g.max_backoff_ms
            )));
        }

        Ok(())
    }
}
