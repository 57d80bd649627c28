use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use crate::config::{PhraseConfig, PhraseRule};
use crate::models::Conversation;
use crate::text::{fold, strip_diacritics};

use super::{Scorer, SignalOutcome};

enum Matcher {
    Literal(String),
    Pattern(Regex),
}

impl Matcher {
    fn is_match(&self, folded: &str) -> bool {
        match self {
            Self::Literal(phrase) => folded.contains(phrase.as_str()),
            Self::Pattern(re) => re.is_match(folded),
        }
    }
}

struct CompiledCategory {
    name: String,
    severity: f64,
    matchers: Vec<Matcher>,
}

/// Scores customer messages against the phrase dictionary. Literals and
/// patterns are compiled once against folded text, so matching ignores case
/// and accents.
pub struct PhraseMatchScorer {
    categories: Vec<CompiledCategory>,
    points_per_match: f64,
}

impl PhraseMatchScorer {
    /// Compile the dictionary. Bad entries are dropped with a warning: the
    /// phrase signal is soft and must never stop a run.
    pub fn new(config: &PhraseConfig) -> Self {
        let points_per_match = if config.points_per_match.is_finite() && config.points_per_match > 0.0
        {
            config.points_per_match
        } else {
            tracing::warn!(
                points_per_match = config.points_per_match,
                "invalid points_per_match, phrase signal disabled"
            );
            0.0
        };

        let categories = config
            .categories
            .iter()
            .map(|(name, category)| {
                let severity = if category.severity.is_finite() && category.severity >= 0.0 {
                    category.severity
                } else {
                    tracing::warn!(category = %name, severity = category.severity, "invalid severity, using 0");
                    0.0
                };
                let matchers = category
                    .phrases
                    .iter()
                    .filter_map(|rule| compile_rule(name, rule))
                    .collect();
                CompiledCategory {
                    name: name.clone(),
                    severity,
                    matchers,
                }
            })
            .collect();

        Self {
            categories,
            points_per_match,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.categories.iter().map(|c| c.matchers.len()).sum()
    }
}

fn compile_rule(category: &str, rule: &PhraseRule) -> Option<Matcher> {
    match rule {
        PhraseRule::Literal(phrase) => {
            let folded = fold(phrase);
            if folded.is_empty() {
                tracing::warn!(category, "empty phrase ignored");
                None
            } else {
                Some(Matcher::Literal(folded))
            }
        }
        PhraseRule::Pattern { pattern } => {
            match RegexBuilder::new(&strip_diacritics(pattern))
                .case_insensitive(true)
                .build()
            {
                Ok(re) => Some(Matcher::Pattern(re)),
                Err(e) => {
                    tracing::warn!(category, pattern = %pattern, error = %e, "invalid phrase pattern ignored");
                    None
                }
            }
        }
    }
}

impl Scorer for PhraseMatchScorer {
    fn name(&self) -> &'static str {
        "phrase_matching"
    }

    fn score(&self, conversation: &Conversation) -> SignalOutcome {
        let mut hits: BTreeMap<&str, usize> = BTreeMap::new();
        let mut weighted = 0.0;

        for message in conversation.customer_messages() {
            let folded = fold(&message.content);
            if folded.is_empty() {
                continue;
            }
            for category in &self.categories {
                // Each rule counts at most once per message.
                let matched = category
                    .matchers
                    .iter()
                    .filter(|m| m.is_match(&folded))
                    .count();
                if matched > 0 {
                    *hits.entry(category.name.as_str()).or_default() += matched;
                    weighted += matched as f64 * category.severity;
                }
            }
        }

        let score = (weighted * self.points_per_match).clamp(0.0, 100.0);

        let mut tags = Vec::new();
        if !hits.is_empty() {
            tags.push("phrase_matches".to_string());
            tags.extend(hits.keys().map(|name| name.to_string()));
        }

        let detail = if hits.is_empty() {
            "no phrase matches".to_string()
        } else {
            hits.iter()
                .map(|(name, count)| format!("{name}={count}"))
                .collect::<Vec<_>>()
                .join(" ")
        };

        SignalOutcome {
            score: Some(score),
            tags,
            detail,
        }
    }
}
