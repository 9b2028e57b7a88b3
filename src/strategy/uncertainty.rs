//! Uncertainty-based active learning
//!
//! Scores every unlabeled sample from the model's posterior and selects
//! the most uncertain ones for oracle labeling. Three classic scores are
//! provided; all are oriented so that higher means more uncertain.

use serde::{Deserialize, Serialize};

use crate::strategy::Selection;
use crate::utils::error::{Result, WeaksupError};

/// Uncertainty scoring functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyMethod {
    /// 1 - max_c p(c|x)
    LeastConfidence,
    /// Negative margin between the two most probable classes
    Margin,
    /// Shannon entropy of the posterior
    Entropy,
}

impl UncertaintyMethod {
    pub fn id(&self) -> &'static str {
        match self {
            UncertaintyMethod::LeastConfidence => "least_confidence",
            UncertaintyMethod::Margin => "margin",
            UncertaintyMethod::Entropy => "entropy",
        }
    }

    /// Uncertainty score for one posterior row (higher = more uncertain)
    pub fn score(&self, probs: &[f32]) -> f32 {
        match self {
            UncertaintyMethod::LeastConfidence => {
                let max = probs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                1.0 - max
            }
            UncertaintyMethod::Margin => {
                let (mut top1, mut top2) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
                for &p in probs {
                    if p > top1 {
                        top2 = top1;
                        top1 = p;
                    } else if p > top2 {
                        top2 = p;
                    }
                }
                if top2.is_finite() {
                    -(top1 - top2)
                } else {
                    -top1
                }
            }
            UncertaintyMethod::Entropy => probs
                .iter()
                .filter(|&&p| p > 0.0)
                .map(|&p| -p * p.ln())
                .sum(),
        }
    }
}

/// Active-learning sampler over model posteriors
#[derive(Debug)]
pub struct UncertaintySampler {
    method: UncertaintyMethod,
}

impl UncertaintySampler {
    pub fn new(method: UncertaintyMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> UncertaintyMethod {
        self.method
    }

    /// Select the `budget` most uncertain candidates.
    ///
    /// Ties break on candidate order so the selection is deterministic.
    pub fn select(
        &self,
        candidate_ids: &[u64],
        posteriors: &[Vec<f32>],
        budget: usize,
    ) -> Result<Selection> {
        if candidate_ids.len() != posteriors.len() {
            return Err(WeaksupError::Strategy(format!(
                "{} candidates but {} posterior rows",
                candidate_ids.len(),
                posteriors.len()
            )));
        }

        let mut scored: Vec<(usize, f32)> = posteriors
            .iter()
            .enumerate()
            .map(|(i, probs)| (i, self.method.score(probs)))
            .collect();

        // Highest uncertainty first; stable on the original candidate order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let picks: Vec<u64> = scored
            .into_iter()
            .take(budget.min(candidate_ids.len()))
            .map(|(i, _)| candidate_ids[i])
            .collect();

        Ok(Selection::oracle(picks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_confidence_orders_by_max_prob() {
        let method = UncertaintyMethod::LeastConfidence;
        let confident = method.score(&[0.9, 0.05, 0.05]);
        let uncertain = method.score(&[0.4, 0.3, 0.3]);
        assert!(uncertain > confident);
    }

    #[test]
    fn test_margin_prefers_close_top_two() {
        let method = UncertaintyMethod::Margin;
        let clear = method.score(&[0.8, 0.1, 0.1]);
        let close = method.score(&[0.45, 0.44, 0.11]);
        assert!(close > clear);
    }

    #[test]
    fn test_entropy_peaks_at_uniform() {
        let method = UncertaintyMethod::Entropy;
        let uniform = method.score(&[0.25, 0.25, 0.25, 0.25]);
        let peaked = method.score(&[0.97, 0.01, 0.01, 0.01]);

        assert!(uniform > peaked);
        assert!((uniform - (4.0f32).ln()).abs() < 1e-5);
    }

    #[test]
    fn test_entropy_handles_zero_probs() {
        let method = UncertaintyMethod::Entropy;
        let score = method.score(&[1.0, 0.0, 0.0]);
        assert!(score.abs() < 1e-6);
    }

    #[test]
    fn test_select_picks_most_uncertain() {
        let sampler = UncertaintySampler::new(UncertaintyMethod::LeastConfidence);
        let ids = vec![10, 20, 30];
        let posteriors = vec![
            vec![0.9, 0.1],  // confident
            vec![0.5, 0.5],  // most uncertain
            vec![0.7, 0.3],  // middling
        ];

        let selection = sampler.select(&ids, &posteriors, 2).unwrap();
        assert_eq!(selection.ids, vec![20, 30]);
    }

    #[test]
    fn test_select_rejects_misaligned_inputs() {
        let sampler = UncertaintySampler::new(UncertaintyMethod::Entropy);
        let result = sampler.select(&[1, 2], &[vec![0.5, 0.5]], 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_select_caps_at_pool_size() {
        let sampler = UncertaintySampler::new(UncertaintyMethod::Margin);
        let ids = vec![1, 2];
        let posteriors = vec![vec![0.6, 0.4], vec![0.8, 0.2]];

        let selection = sampler.select(&ids, &posteriors, 10).unwrap();
        assert_eq!(selection.len(), 2);
    }
}
