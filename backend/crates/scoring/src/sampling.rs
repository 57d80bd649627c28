//! Stratified, seeded selection of conversations for model grading.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::SamplingConfig;
use crate::models::{Sentiment, Tier};

/// What the sampler needs to know about one conversation: its label and its
/// preliminary tier from local signals.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub sentiment: Option<Sentiment>,
    pub tier: Tier,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SamplingCounts {
    pub negative: usize,
    pub high_confidence: usize,
    pub medium_sample: usize,
    pub neutral_sample: usize,
    pub residual: usize,
    pub total_selected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Indices into the candidate slice.
    pub selected: BTreeSet<usize>,
    pub counts: SamplingCounts,
}

impl Selection {
    pub fn contains(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }
}

fn fraction_of(fraction: f64, n: usize) -> usize {
    // Guard against 0.3 * 10 landing just under 3.
    (fraction * n as f64 + 1e-9).floor() as usize
}

fn sample_into(
    rng: &mut StdRng,
    pool: Vec<usize>,
    k: usize,
    selected: &mut BTreeSet<usize>,
) -> usize {
    let picked: Vec<usize> = pool.choose_multiple(rng, k).copied().collect();
    let n = picked.len();
    selected.extend(picked);
    n
}

/// Pick the conversations to send to the grader.
///
/// Strata, in order: every Negative conversation, every preliminary High,
/// a seeded fraction of the remaining Medium, a seeded fraction of the
/// remaining Neutral, then a random fill up to `overall_rate` of the batch.
/// The first two strata are mandatory and are never truncated.
pub fn select_for_grading(candidates: &[Candidate], config: &SamplingConfig) -> Selection {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut selected = BTreeSet::new();
    let mut counts = SamplingCounts::default();

    for (i, c) in candidates.iter().enumerate() {
        if c.sentiment == Some(Sentiment::Negative) {
            selected.insert(i);
            counts.negative += 1;
        }
    }

    for (i, c) in candidates.iter().enumerate() {
        if c.tier == Tier::High && selected.insert(i) {
            counts.high_confidence += 1;
        }
    }

    let remaining = |selected: &BTreeSet<usize>, keep: &dyn Fn(&Candidate) -> bool| -> Vec<usize> {
        candidates
            .iter()
            .enumerate()
            .filter(|(i, c)| !selected.contains(i) && keep(*c))
            .map(|(i, _)| i)
            .collect()
    };

    let medium = remaining(&selected, &|c| c.tier == Tier::Medium);
    let k = fraction_of(config.medium_fraction, medium.len());
    counts.medium_sample = sample_into(&mut rng, medium, k, &mut selected);

    let neutral = remaining(&selected, &|c| c.sentiment == Some(Sentiment::Neutral));
    let k = fraction_of(config.neutral_fraction, neutral.len());
    counts.neutral_sample = sample_into(&mut rng, neutral, k, &mut selected);

    let target = fraction_of(config.overall_rate, candidates.len());
    if selected.len() < target {
        let rest = remaining(&selected, &|_| true);
        let k = target - selected.len();
        counts.residual = sample_into(&mut rng, rest, k, &mut selected);
    }

    counts.total_selected = selected.len();
    Selection { selected, counts }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(sentiment: Option<Sentiment>, tier: Tier) -> Candidate {
        Candidate { sentiment, tier }
    }

    /// 100 candidates: 5 negative, 5 high, 20 medium positive, 20 neutral low,
    /// 50 positive low.
    fn batch() -> Vec<Candidate> {
        let mut out = Vec::new();
        out.extend((0..5).map(|_| candidate(Some(Sentiment::Negative), Tier::Medium)));
        out.extend((0..5).map(|_| candidate(Some(Sentiment::Positive), Tier::High)));
        out.extend((0..20).map(|_| candidate(Some(Sentiment::Positive), Tier::Medium)));
        out.extend((0..20).map(|_| candidate(Some(Sentiment::Neutral), Tier::Low)));
        out.extend((0..50).map(|_| candidate(Some(Sentiment::Positive), Tier::Low)));
        out
    }

    #[test]
    fn strata_counts_follow_fractions() {
        let selection = select_for_grading(&batch(), &SamplingConfig::default());
        let c = &selection.counts;
        assert_eq!(c.negative, 5);
        assert_eq!(c.high_confidence, 5);
        // floor(0.30 * 20)
        assert_eq!(c.medium_sample, 6);
        // floor(0.10 * 20)
        assert_eq!(c.neutral_sample, 2);
        // 18 selected so far, target floor(0.15 * 100) = 15
        assert_eq!(c.residual, 0);
        assert_eq!(c.total_selected, 18);
        assert_eq!(selection.selected.len(), 18);
    }

    #[test]
    fn mandatory_strata_always_selected() {
        let batch = batch();
        let selection = select_for_grading(&batch, &SamplingConfig::default());
        for (i, c) in batch.iter().enumerate() {
            if c.sentiment == Some(Sentiment::Negative) || c.tier == Tier::High {
                assert!(selection.contains(i), "candidate {i} not selected");
            }
        }
    }

    #[test]
    fn same_seed_same_selection() {
        let batch = batch();
        let config = SamplingConfig::default();
        let a = select_for_grading(&batch, &config);
        let b = select_for_grading(&batch, &config);
        assert_eq!(a.selected, b.selected);
        assert_eq!(a.counts, b.counts);
    }

    #[test]
    fn residual_fills_to_overall_rate() {
        let batch: Vec<Candidate> = (0..40)
            .map(|_| candidate(Some(Sentiment::Positive), Tier::Low))
            .collect();
        let config = SamplingConfig {
            overall_rate: 0.25,
            ..SamplingConfig::default()
        };
        let selection = select_for_grading(&batch, &config);
        assert_eq!(selection.counts.residual, 10);
        assert_eq!(selection.selected.len(), 10);
    }

    #[test]
    fn mandatory_strata_exceed_overall_rate() {
        let batch: Vec<Candidate> = (0..10)
            .map(|_| candidate(Some(Sentiment::Negative), Tier::Low))
            .collect();
        let selection = select_for_grading(&batch, &SamplingConfig::default());
        assert_eq!(selection.counts.negative, 10);
        assert_eq!(selection.counts.total_selected, 10);
    }

    #[test]
    fn never_selects_twice() {
        let batch: Vec<Candidate> = (0..30)
            .map(|_| candidate(Some(Sentiment::Negative), Tier::High))
            .collect();
        let selection = select_for_grading(&batch, &SamplingConfig::default());
        assert_eq!(selection.counts.negative, 30);
        assert_eq!(selection.counts.high_confidence, 0);
        assert_eq!(selection.selected.len(), 30);
    }

    #[test]
    fn empty_batch_selects_nothing() {
        let selection = select_for_grading(&[], &SamplingConfig::default());
        assert!(selection.selected.is_empty());
        assert_eq!(selection.counts, SamplingCounts::default());
    }
}
