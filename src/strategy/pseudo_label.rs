//! Pseudo-labeling strategy for semi-supervised learning
//!
//! Selects the unlabeled samples the model is *most confident* about and
//! absorbs them with the model's own predicted labels. A confidence
//! threshold gates acceptance, an optional per-class cap prevents the
//! majority class from flooding the labeled pool, and an optional
//! curriculum relaxes the threshold across rounds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::strategy::Selection;
use crate::utils::error::{Result, WeaksupError};

/// Configuration for pseudo-labeling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PseudoLabelConfig {
    /// Confidence threshold for accepting predictions (0.0 to 1.0)
    pub confidence_threshold: f64,

    /// Maximum accepted pseudo-labels per class across the whole run
    pub max_per_class: Option<usize>,

    /// Whether to relax the threshold across rounds (curriculum)
    pub curriculum: bool,

    /// Curriculum start threshold
    pub curriculum_initial_threshold: f64,

    /// Curriculum end threshold
    pub curriculum_final_threshold: f64,

    /// Rounds over which the threshold decays linearly
    pub curriculum_rounds: usize,
}

impl Default for PseudoLabelConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.9,
            max_per_class: Some(500),
            curriculum: false,
            curriculum_initial_threshold: 0.95,
            curriculum_final_threshold: 0.8,
            curriculum_rounds: 5,
        }
    }
}

impl PseudoLabelConfig {
    /// Effective threshold for a given round
    pub fn threshold_at(&self, round: usize) -> f64 {
        if !self.curriculum {
            return self.confidence_threshold;
        }
        if round >= self.curriculum_rounds {
            return self.curriculum_final_threshold;
        }

        let progress = round as f64 / self.curriculum_rounds as f64;
        self.curriculum_initial_threshold
            - progress * (self.curriculum_initial_threshold - self.curriculum_final_threshold)
    }
}

/// Cumulative pseudo-labeling statistics across rounds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PseudoLabelStats {
    /// Candidate predictions examined
    pub total_processed: usize,

    /// Accepted pseudo-labels
    pub total_accepted: usize,

    /// Rejected for falling under the threshold
    pub rejected_low_confidence: usize,

    /// Rejected by the per-class cap
    pub rejected_class_limit: usize,
}

impl PseudoLabelStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.total_accepted as f64 / self.total_processed as f64
    }
}

impl std::fmt::Display for PseudoLabelStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pseudo-label statistics:")?;
        writeln!(f, "  processed: {}", self.total_processed)?;
        writeln!(
            f,
            "  accepted: {} ({:.1}%)",
            self.total_accepted,
            self.acceptance_rate() * 100.0
        )?;
        writeln!(
            f,
            "  rejected (low confidence): {}",
            self.rejected_low_confidence
        )?;
        writeln!(f, "  rejected (class limit): {}", self.rejected_class_limit)?;
        Ok(())
    }
}

/// Stateful pseudo-labeling sampler
#[derive(Debug)]
pub struct PseudoLabeler {
    config: PseudoLabelConfig,
    class_counts: HashMap<usize, usize>,
    stats: PseudoLabelStats,
    round: usize,
}

impl PseudoLabeler {
    pub fn new(config: PseudoLabelConfig) -> Self {
        Self {
            config,
            class_counts: HashMap::new(),
            stats: PseudoLabelStats::default(),
            round: 0,
        }
    }

    /// Current effective confidence threshold
    pub fn current_threshold(&self) -> f64 {
        self.config.threshold_at(self.round)
    }

    /// Advance the curriculum by one round
    pub fn next_round(&mut self) {
        self.round += 1;
    }

    pub fn stats(&self) -> &PseudoLabelStats {
        &self.stats
    }

    /// Accepted pseudo-labels per class so far
    pub fn class_distribution(&self) -> &HashMap<usize, usize> {
        &self.class_counts
    }

    /// Select up to `budget` high-confidence predictions.
    ///
    /// Candidates are ranked by confidence (descending); acceptance then
    /// applies the threshold and the per-class cap. Returning fewer than
    /// `budget` samples (even zero) is expected behavior early in training.
    pub fn select(
        &mut self,
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

        let threshold = self.current_threshold() as f32;

        // (index, predicted label, confidence) ranked by confidence.
        let mut ranked: Vec<(usize, usize, f32)> = posteriors
            .iter()
            .enumerate()
            .map(|(i, probs)| {
                let (label, confidence) = argmax(probs);
                (i, label, confidence)
            })
            .collect();
        ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut ids = Vec::new();
        let mut labels = Vec::new();

        for (i, label, confidence) in ranked {
            if ids.len() >= budget {
                break;
            }
            self.stats.total_processed += 1;

            if confidence < threshold {
                self.stats.rejected_low_confidence += 1;
                continue;
            }

            if let Some(cap) = self.config.max_per_class {
                let count = self.class_counts.entry(label).or_insert(0);
                if *count >= cap {
                    self.stats.rejected_class_limit += 1;
                    continue;
                }
                *count += 1;
            }

            self.stats.total_accepted += 1;
            ids.push(candidate_ids[i]);
            labels.push((label, confidence));
        }

        debug!(
            "Pseudo-labeling: accepted {}/{} candidates (threshold {:.2})",
            ids.len(),
            candidate_ids.len(),
            threshold
        );

        Ok(Selection::predicted(ids, labels))
    }
}

fn argmax(probs: &[f32]) -> (usize, f32) {
    let mut best = (0usize, f32::NEG_INFINITY);
    for (i, &p) in probs.iter().enumerate() {
        if p > best.1 {
            best = (i, p);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SelectionLabels;

    fn peaked(label: usize, confidence: f32, num_classes: usize) -> Vec<f32> {
        let mut probs = vec![(1.0 - confidence) / (num_classes - 1) as f32; num_classes];
        probs[label] = confidence;
        probs
    }

    #[test]
    fn test_threshold_filtering() {
        let mut labeler = PseudoLabeler::new(PseudoLabelConfig {
            confidence_threshold: 0.9,
            max_per_class: None,
            ..Default::default()
        });

        let ids = vec![1, 2, 3];
        let posteriors = vec![
            peaked(0, 0.95, 4),
            peaked(1, 0.7, 4), // under threshold
            peaked(2, 0.92, 4),
        ];

        let selection = labeler.select(&ids, &posteriors, 10).unwrap();
        assert_eq!(selection.ids, vec![1, 3]);
        assert_eq!(labeler.stats().rejected_low_confidence, 1);
        assert_eq!(labeler.stats().total_accepted, 2);
    }

    #[test]
    fn test_most_confident_selected_first() {
        let mut labeler = PseudoLabeler::new(PseudoLabelConfig {
            confidence_threshold: 0.5,
            max_per_class: None,
            ..Default::default()
        });

        let ids = vec![1, 2, 3];
        let posteriors = vec![
            peaked(0, 0.8, 4),
            peaked(1, 0.99, 4),
            peaked(2, 0.9, 4),
        ];

        let selection = labeler.select(&ids, &posteriors, 2).unwrap();
        assert_eq!(selection.ids, vec![2, 3]);

        match &selection.labels {
            SelectionLabels::Predicted(labels) => {
                assert_eq!(labels[0].0, 1);
                assert!((labels[0].1 - 0.99).abs() < 1e-6);
            }
            SelectionLabels::Oracle => panic!("pseudo-labeling must predict labels"),
        }
    }

    #[test]
    fn test_class_cap() {
        let mut labeler = PseudoLabeler::new(PseudoLabelConfig {
            confidence_threshold: 0.5,
            max_per_class: Some(2),
            ..Default::default()
        });

        let ids = vec![1, 2, 3, 4];
        let posteriors = vec![
            peaked(0, 0.99, 4),
            peaked(0, 0.98, 4),
            peaked(0, 0.97, 4), // over the cap for class 0
            peaked(1, 0.96, 4),
        ];

        let selection = labeler.select(&ids, &posteriors, 10).unwrap();
        assert_eq!(selection.ids, vec![1, 2, 4]);
        assert_eq!(labeler.stats().rejected_class_limit, 1);
    }

    #[test]
    fn test_cap_persists_across_rounds() {
        let mut labeler = PseudoLabeler::new(PseudoLabelConfig {
            confidence_threshold: 0.5,
            max_per_class: Some(1),
            ..Default::default()
        });

        let first = labeler
            .select(&[1], &[peaked(0, 0.9, 4)], 10)
            .unwrap();
        assert_eq!(first.len(), 1);

        labeler.next_round();
        let second = labeler
            .select(&[2], &[peaked(0, 0.9, 4)], 10)
            .unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_curriculum_decay() {
        let config = PseudoLabelConfig {
            curriculum: true,
            curriculum_initial_threshold: 0.95,
            curriculum_final_threshold: 0.80,
            curriculum_rounds: 5,
            ..Default::default()
        };

        assert!((config.threshold_at(0) - 0.95).abs() < 1e-9);
        // Midpoint of the decay.
        assert!((config.threshold_at(2) - 0.89).abs() < 1e-9);
        assert!((config.threshold_at(5) - 0.80).abs() < 1e-9);
        assert!((config.threshold_at(50) - 0.80).abs() < 1e-9);
    }

    #[test]
    fn test_empty_selection_is_ok() {
        let mut labeler = PseudoLabeler::new(PseudoLabelConfig::default());

        let selection = labeler
            .select(&[1, 2], &[peaked(0, 0.3, 4), peaked(1, 0.4, 4)], 10)
            .unwrap();
        assert!(selection.is_empty());
        assert_eq!(labeler.stats().rejected_low_confidence, 2);
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let mut labeler = PseudoLabeler::new(PseudoLabelConfig::default());
        assert!(labeler.select(&[1, 2], &[peaked(0, 0.9, 4)], 1).is_err());
    }
}
