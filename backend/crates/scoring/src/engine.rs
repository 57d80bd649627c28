use std::collections::BTreeSet;
use std::sync::Arc;

use triage_common::error::TriageResult;

use crate::config::{ClassifierConfig, MissingSignalPolicy, TierThresholds};
use crate::grading::Assessment;
use crate::models::{Conversation, GradingStatus, Sentiment, ScoredConversation, SubScores, Tier};
use crate::scorers::behavioral::BehavioralPatternScorer;
use crate::scorers::phrase::PhraseMatchScorer;
use crate::scorers::sentiment::SentimentCorrelationScorer;
use crate::scorers::{Scorer, SignalOutcome};
use crate::trace::{RuleTrace, ScorerResult};

/// One weighted input to fusion.
#[derive(Debug, Clone)]
pub struct Signal {
    pub rule: &'static str,
    pub score: Option<f64>,
    pub weight: f64,
    pub detail: String,
}

pub fn classify(confidence: f64, thresholds: &TierThresholds) -> Tier {
    if confidence > thresholds.high {
        Tier::High
    } else if confidence >= thresholds.medium {
        Tier::Medium
    } else {
        Tier::Low
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weighted fusion of the signals into a [0, 100] confidence and its trace.
pub fn fuse(
    signals: &[Signal],
    policy: MissingSignalPolicy,
    thresholds: &TierThresholds,
) -> (f64, Tier, RuleTrace) {
    let results: Vec<ScorerResult> = signals
        .iter()
        .map(|s| {
            let (included, value) = match (s.score, policy) {
                (Some(score), _) => (true, score),
                (None, MissingSignalPolicy::TreatAsZero) => (true, 0.0),
                (None, MissingSignalPolicy::Renormalize) => (false, 0.0),
            };
            ScorerResult {
                rule: s.rule.to_string(),
                score: s.score,
                weight: s.weight,
                weighted_score: if included { value * s.weight } else { 0.0 },
                included,
                detail: s.detail.clone(),
            }
        })
        .collect();

    let raw_total: f64 = results.iter().map(|r| r.weighted_score).sum();
    let weight_sum: f64 = results.iter().filter(|r| r.included).map(|r| r.weight).sum();

    let confidence = if weight_sum > 0.0 {
        round2((raw_total / weight_sum).clamp(0.0, 100.0))
    } else {
        0.0
    };
    let tier = classify(confidence, thresholds);

    let trace = RuleTrace {
        scorers: results,
        raw_total,
        weight_sum,
        confidence,
        classification: tier.as_str().to_string(),
    };

    (confidence, tier, trace)
}

/// Local (synchronous) signals for one conversation, computed before any
/// model grading.
#[derive(Debug, Clone)]
pub struct LocalScores {
    pub conversation_id: String,
    pub sentiment_label: Option<Sentiment>,
    pub phrase: SignalOutcome,
    pub behavioral: SignalOutcome,
    pub sentiment: SignalOutcome,
}

#[derive(Debug, Clone)]
pub enum ModelOutcome {
    Graded(Assessment),
    Skipped,
    Failed(String),
    Cancelled,
}

pub struct Classifier {
    config: Arc<ClassifierConfig>,
    phrase: PhraseMatchScorer,
    behavioral: BehavioralPatternScorer,
    sentiment: SentimentCorrelationScorer,
}

impl Classifier {
    /// Validate the configuration and compile the scorers. Configuration
    /// errors surface here, before any conversation is scored.
    pub fn new(config: ClassifierConfig) -> TriageResult<Self> {
        config.validate()?;
        let phrase = PhraseMatchScorer::new(&config.phrases);
        if phrase.rule_count() == 0 {
            tracing::warn!("phrase dictionary is empty, phrase signal will always be 0");
        }
        let behavioral = BehavioralPatternScorer::new(config.behavioral.clone());
        Ok(Self {
            config: Arc::new(config),
            phrase,
            behavioral,
            sentiment: SentimentCorrelationScorer,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn score_local(&self, conversation: &Conversation) -> LocalScores {
        LocalScores {
            conversation_id: conversation.id.clone(),
            sentiment_label: conversation.sentiment,
            phrase: self.phrase.score(conversation),
            behavioral: self.behavioral.score(conversation),
            sentiment: self.sentiment.score(conversation),
        }
    }

    fn signals(&self, local: &LocalScores, model: Option<(f64, String)>) -> Vec<Signal> {
        let w = &self.config.weights;
        let (model_score, model_detail) = match model {
            Some((score, detail)) => (Some(score), detail),
            None => (None, "not graded".to_string()),
        };
        vec![
            Signal {
                rule: self.phrase.name(),
                score: local.phrase.score,
                weight: w.phrase,
                detail: local.phrase.detail.clone(),
            },
            Signal {
                rule: self.behavioral.name(),
                score: local.behavioral.score,
                weight: w.behavioral,
                detail: local.behavioral.detail.clone(),
            },
            Signal {
                rule: "model_assessment",
                score: model_score,
                weight: w.model,
                detail: model_detail,
            },
            Signal {
                rule: self.sentiment.name(),
                score: local.sentiment.score,
                weight: w.sentiment,
                detail: local.sentiment.detail.clone(),
            },
        ]
    }

    /// Score and tier from local signals only. The model signal is not yet
    /// known here, so it is always excluded rather than zeroed.
    pub fn preliminary(&self, local: &LocalScores) -> (f64, Tier) {
        let (confidence, tier, _) = fuse(
            &self.signals(local, None),
            MissingSignalPolicy::Renormalize,
            &self.config.thresholds,
        );
        (confidence, tier)
    }

    pub fn finalize(&self, local: LocalScores, model: ModelOutcome) -> ScoredConversation {
        let (grading, grading_error, assessment) = match model {
            ModelOutcome::Graded(a) => (GradingStatus::Graded, None, Some(a)),
            ModelOutcome::Skipped => (GradingStatus::Skipped, None, None),
            ModelOutcome::Failed(e) => (GradingStatus::Failed, Some(e), None),
            ModelOutcome::Cancelled => (GradingStatus::Cancelled, None, None),
        };

        let model_signal = assessment.as_ref().map(|a| {
            (
                a.error_score,
                format!(
                    "resolved={} understood={} had_errors={} quality={}",
                    a.resolved, a.understood, a.had_errors, a.quality
                ),
            )
        });
        let model_score = model_signal.as_ref().map(|(s, _)| *s);

        let (confidence, tier, trace) = fuse(
            &self.signals(&local, model_signal),
            self.config.missing_signal,
            &self.config.thresholds,
        );

        let mut categories: BTreeSet<String> = BTreeSet::new();
        categories.extend(local.phrase.tags.iter().cloned());
        categories.extend(local.behavioral.tags.iter().cloned());
        if let Some(a) = &assessment {
            categories.extend(a.tags());
        }

        ScoredConversation {
            conversation_id: local.conversation_id,
            sub_scores: SubScores {
                phrase: local.phrase.score,
                behavioral: local.behavioral.score,
                model: model_score,
                sentiment: local.sentiment.score,
            },
            confidence_score: confidence,
            tier,
            categories,
            grading,
            grading_error,
            assessment,
            trace,
            config_version: self.config.config_version.clone(),
        }
    }

    /// Classify one conversation without model grading.
    pub fn classify_local(&self, conversation: &Conversation) -> ScoredConversation {
        self.finalize(self.score_local(conversation), ModelOutcome::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, SessionStatus};
    use crate::scorers::test_support::conversation;

    fn signals(phrase: f64, behavioral: f64, model: Option<f64>, sentiment: f64) -> Vec<Signal> {
        let w = crate::config::FusionWeights::default();
        vec![
            Signal {
                rule: "phrase_matching",
                score: Some(phrase),
                weight: w.phrase,
                detail: String::new(),
            },
            Signal {
                rule: "behavioral_patterns",
                score: Some(behavioral),
                weight: w.behavioral,
                detail: String::new(),
            },
            Signal {
                rule: "model_assessment",
                score: model,
                weight: w.model,
                detail: String::new(),
            },
            Signal {
                rule: "sentiment_correlation",
                score: Some(sentiment),
                weight: w.sentiment,
                detail: String::new(),
            },
        ]
    }

    #[test]
    fn all_four_signals_reproduce_weighted_sum() {
        let (confidence, tier, trace) = fuse(
            &signals(80.0, 60.0, Some(90.0), 20.0),
            MissingSignalPolicy::Renormalize,
            &TierThresholds::default(),
        );
        // 24 + 15 + 31.5 + 2
        assert_eq!(confidence, 72.5);
        assert_eq!(tier, Tier::High);
        assert_eq!(trace.scorers.len(), 4);
        assert!(trace.scorers.iter().all(|s| s.included));
    }

    #[test]
    fn missing_model_renormalizes() {
        let (confidence, tier, trace) = fuse(
            &signals(80.0, 60.0, None, 20.0),
            MissingSignalPolicy::Renormalize,
            &TierThresholds::default(),
        );
        // (24 + 15 + 2) / 0.65
        assert_eq!(confidence, 63.08);
        assert_eq!(tier, Tier::Medium);
        assert!((trace.weight_sum - 0.65).abs() < 1e-9);
        let model = trace
            .scorers
            .iter()
            .find(|s| s.rule == "model_assessment")
            .unwrap();
        assert!(!model.included);
        assert_eq!(model.score, None);
    }

    #[test]
    fn treat_as_zero_must_be_explicit() {
        let (confidence, _, trace) = fuse(
            &signals(80.0, 60.0, None, 20.0),
            MissingSignalPolicy::TreatAsZero,
            &TierThresholds::default(),
        );
        assert_eq!(confidence, 41.0);
        assert!((trace.weight_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_available_signal_scores_zero() {
        let none = vec![Signal {
            rule: "model_assessment",
            score: None,
            weight: 1.0,
            detail: String::new(),
        }];
        let (confidence, tier, _) =
            fuse(&none, MissingSignalPolicy::Renormalize, &TierThresholds::default());
        assert_eq!(confidence, 0.0);
        assert_eq!(tier, Tier::Low);
    }

    #[test]
    fn tier_boundaries() {
        let t = TierThresholds::default();
        assert_eq!(classify(70.0, &t), Tier::Medium);
        assert_eq!(classify(70.01, &t), Tier::High);
        assert_eq!(classify(40.0, &t), Tier::Medium);
        assert_eq!(classify(39.99, &t), Tier::Low);
        assert_eq!(classify(0.0, &t), Tier::Low);
        assert_eq!(classify(100.0, &t), Tier::High);
    }

    #[test]
    fn fused_score_stays_in_range() {
        for (p, b, m, s) in [
            (100.0, 100.0, Some(100.0), 80.0),
            (0.0, 0.0, Some(0.0), 5.0),
            (100.0, 0.0, None, 5.0),
        ] {
            let (confidence, tier, _) = fuse(
                &signals(p, b, m, s),
                MissingSignalPolicy::Renormalize,
                &TierThresholds::default(),
            );
            assert!((0.0..=100.0).contains(&confidence), "confidence={confidence}");
            assert_eq!(tier, classify(confidence, &TierThresholds::default()));
        }
    }

    #[test]
    fn classifier_rejects_invalid_config() {
        let mut cfg = ClassifierConfig::default();
        cfg.weights.sentiment = 0.5;
        assert!(Classifier::new(cfg).is_err());
    }

    #[test]
    fn finalize_merges_tags_and_marks_grading() {
        let classifier = Classifier::new(ClassifierConfig::default()).unwrap();
        let conv = conversation(
            "s-1",
            SessionStatus::Completed,
            Some(Sentiment::Negative),
            &[(Role::Customer, "Não resolveu, quero falar com humano"), (Role::Agent, "Um momento")],
            15,
        );
        let local = classifier.score_local(&conv);
        let assessment = Assessment {
            resolved: false,
            understood: true,
            had_errors: true,
            error_description: String::new(),
            quality: "poor".to_string(),
            error_score: 90.0,
            reasoning: String::new(),
            categories: vec!["wismo".to_string()],
        };

        let scored = classifier.finalize(local, ModelOutcome::Graded(assessment));

        assert_eq!(scored.grading, GradingStatus::Graded);
        assert_eq!(scored.sub_scores.model, Some(90.0));
        assert_eq!(scored.sub_scores.sentiment, Some(80.0));
        for tag in [
            "phrase_matches",
            "error_indicators",
            "escalation_phrases",
            "short_conversation",
            "rapid_abandonment",
            "wismo",
            "model_reported_error",
            "unresolved",
        ] {
            assert!(scored.categories.contains(tag), "missing {tag}: {:?}", scored.categories);
        }
        // 0.30*30 + 0.25*70 + 0.35*90 + 0.10*80
        assert_eq!(scored.confidence_score, 66.0);
        assert_eq!(scored.tier, Tier::Medium);
        assert_eq!(scored.config_version, "v1");
    }

    #[test]
    fn failed_grading_keeps_error_and_null_model() {
        let classifier = Classifier::new(ClassifierConfig::default()).unwrap();
        let conv = conversation(
            "s-2",
            SessionStatus::Completed,
            Some(Sentiment::Positive),
            &[(Role::Customer, "Obrigado!")],
            1,
        );
        let scored = classifier.finalize(
            classifier.score_local(&conv),
            ModelOutcome::Failed("grader server error: 503".to_string()),
        );
        assert_eq!(scored.grading, GradingStatus::Failed);
        assert_eq!(scored.sub_scores.model, None);
        assert_eq!(scored.grading_error.as_deref(), Some("grader server error: 503"));
    }

    #[test]
    fn preliminary_matches_local_classification() {
        let classifier = Classifier::new(ClassifierConfig::default()).unwrap();
        let conv = conversation(
            "s-3",
            SessionStatus::Failed,
            Some(Sentiment::Negative),
            &[(Role::Customer, "absurdo"), (Role::Customer, "absurdo")],
            5,
        );
        let local = classifier.score_local(&conv);
        let (score, tier) = classifier.preliminary(&local);
        let scored = classifier.classify_local(&conv);
        assert_eq!(score, scored.confidence_score);
        assert_eq!(tier, scored.tier);
    }
}
