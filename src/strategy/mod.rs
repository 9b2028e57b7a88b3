//! Pluggable sample-selection strategies for the budget loop
//!
//! Each round the runner scores the unlabeled pool with the current model
//! (when the strategy needs it) and hands the posteriors to the active
//! strategy, which decides which samples enter the labeled pool and with
//! what labels:
//!
//! - random / uncertainty sampling reveal the oracle's ground truth
//!   (active learning);
//! - pseudo-labeling assigns the model's own high-confidence predictions
//!   (semi-supervised learning).

pub mod pseudo_label;
pub mod random;
pub mod uncertainty;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub use pseudo_label::{PseudoLabelConfig, PseudoLabelStats, PseudoLabeler};
pub use random::RandomSampler;
pub use uncertainty::{UncertaintyMethod, UncertaintySampler};

use crate::utils::error::Result;

/// How the selected samples are labeled when absorbed
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionLabels {
    /// Reveal ground truth (simulated annotator)
    Oracle,
    /// Assign model predictions: (label, confidence) per selected id
    Predicted(Vec<(usize, f32)>),
}

/// One round's worth of samples chosen from the unlabeled pool
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Selected sample ids, aligned with predicted labels when present
    pub ids: Vec<u64>,
    /// Labeling mode for the selected samples
    pub labels: SelectionLabels,
}

impl Selection {
    pub fn oracle(ids: Vec<u64>) -> Self {
        Self {
            ids,
            labels: SelectionLabels::Oracle,
        }
    }

    pub fn predicted(ids: Vec<u64>, labels: Vec<(usize, f32)>) -> Self {
        Self {
            ids,
            labels: SelectionLabels::Predicted(labels),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Serializable strategy choice used in experiment configs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Uniform random selection with oracle labels
    Random,
    /// Uncertainty-based active learning with oracle labels
    Uncertainty { method: UncertaintyMethod },
    /// Confidence-thresholded pseudo-labeling
    PseudoLabel(PseudoLabelConfig),
}

impl StrategyConfig {
    /// Short identifier used in run names and log records
    pub fn id(&self) -> String {
        match self {
            StrategyConfig::Random => "random".to_string(),
            StrategyConfig::Uncertainty { method } => format!("uncertainty_{}", method.id()),
            StrategyConfig::PseudoLabel(_) => "pseudo_label".to_string(),
        }
    }
}

/// Instantiated, possibly stateful sampler
#[derive(Debug)]
pub enum Sampler {
    Random(RandomSampler),
    Uncertainty(UncertaintySampler),
    Pseudo(PseudoLabeler),
}

impl Sampler {
    pub fn from_config(config: &StrategyConfig) -> Self {
        match config {
            StrategyConfig::Random => Sampler::Random(RandomSampler::new()),
            StrategyConfig::Uncertainty { method } => {
                Sampler::Uncertainty(UncertaintySampler::new(*method))
            }
            StrategyConfig::PseudoLabel(cfg) => Sampler::Pseudo(PseudoLabeler::new(cfg.clone())),
        }
    }

    /// Whether this sampler needs model posteriors over the unlabeled pool
    pub fn needs_model(&self) -> bool {
        !matches!(self, Sampler::Random(_))
    }

    /// Choose up to `budget` samples from `candidate_ids`.
    ///
    /// `posteriors` rows align with `candidate_ids`; they may be empty for
    /// strategies that do not consult the model.
    pub fn select(
        &mut self,
        candidate_ids: &[u64],
        posteriors: &[Vec<f32>],
        budget: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Selection> {
        match self {
            Sampler::Random(sampler) => Ok(sampler.select(candidate_ids, budget, rng)),
            Sampler::Uncertainty(sampler) => sampler.select(candidate_ids, posteriors, budget),
            Sampler::Pseudo(labeler) => labeler.select(candidate_ids, posteriors, budget),
        }
    }

    /// Advance per-round state (pseudo-label curriculum)
    pub fn next_round(&mut self) {
        if let Sampler::Pseudo(labeler) = self {
            labeler.next_round();
        }
    }

    /// Pseudo-labeling statistics, when applicable
    pub fn pseudo_stats(&self) -> Option<&PseudoLabelStats> {
        match self {
            Sampler::Pseudo(labeler) => Some(labeler.stats()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_ids() {
        assert_eq!(StrategyConfig::Random.id(), "random");
        assert_eq!(
            StrategyConfig::Uncertainty {
                method: UncertaintyMethod::Entropy
            }
            .id(),
            "uncertainty_entropy"
        );
        assert_eq!(
            StrategyConfig::PseudoLabel(PseudoLabelConfig::default()).id(),
            "pseudo_label"
        );
    }

    #[test]
    fn test_needs_model() {
        assert!(!Sampler::from_config(&StrategyConfig::Random).needs_model());
        assert!(Sampler::from_config(&StrategyConfig::Uncertainty {
            method: UncertaintyMethod::Margin
        })
        .needs_model());
        assert!(
            Sampler::from_config(&StrategyConfig::PseudoLabel(PseudoLabelConfig::default()))
                .needs_model()
        );
    }

    #[test]
    fn test_strategy_config_serde_round_trip() {
        let configs = vec![
            StrategyConfig::Random,
            StrategyConfig::Uncertainty {
                method: UncertaintyMethod::LeastConfidence,
            },
            StrategyConfig::PseudoLabel(PseudoLabelConfig::default()),
        ];

        for config in configs {
            let json = serde_json::to_string(&config).unwrap();
            let back: StrategyConfig = serde_json::from_str(&json).unwrap();
            assert_eq!(back, config);
        }
    }
}
