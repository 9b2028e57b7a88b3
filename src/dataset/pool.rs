//! Label pool bookkeeping for the budget loop
//!
//! The pool tracks which samples are currently labeled, what target each
//! labeled sample carries (oracle ground truth or a model-assigned
//! pseudo-label), and absorbs per-round selections from the unlabeled side.
//!
//! Invariants:
//! - labeled and unlabeled id sets are disjoint
//! - their sizes always sum to the seeded total
//! - an oracle-labeled sample is never downgraded to a pseudo-label

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{ImageStore, TrainItem};
use crate::strategy::{Selection, SelectionLabels};
use crate::utils::error::{Result, WeaksupError};

/// How a labeled sample obtained its current target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Provenance {
    /// Ground truth revealed by the oracle
    Oracle,
    /// Model-assigned pseudo-label with its softmax confidence
    Pseudo { confidence: f32 },
}

#[derive(Debug, Clone)]
struct PoolEntry {
    target: usize,
    provenance: Provenance,
}

/// The label-budget schedule, expressed as fractions of the training set
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetSchedule {
    /// Fraction labeled before the first round
    pub initial_ratio: f64,
    /// Fraction added to the labeled pool per round
    pub increment_ratio: f64,
    /// Fraction at which the loop stops
    pub stop_ratio: f64,
}

impl Default for BudgetSchedule {
    fn default() -> Self {
        Self {
            initial_ratio: 0.05,
            increment_ratio: 0.05,
            stop_ratio: 0.35,
        }
    }
}

impl BudgetSchedule {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("initial_ratio", self.initial_ratio),
            ("increment_ratio", self.increment_ratio),
            ("stop_ratio", self.stop_ratio),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(WeaksupError::Config(format!(
                    "{} must be in [0.0, 1.0], got {}",
                    name, v
                )));
            }
        }
        if self.increment_ratio == 0.0 {
            return Err(WeaksupError::Config(
                "increment_ratio must be positive".to_string(),
            ));
        }
        if self.stop_ratio < self.initial_ratio {
            return Err(WeaksupError::Config(
                "stop_ratio must be at least initial_ratio".to_string(),
            ));
        }
        Ok(())
    }

    /// Samples labeled before the first round
    pub fn initial_count(&self, total: usize) -> usize {
        ((total as f64 * self.initial_ratio).round() as usize).max(1)
    }

    /// Samples added per round
    pub fn per_round(&self, total: usize) -> usize {
        ((total as f64 * self.increment_ratio).round() as usize).max(1)
    }

    /// Whether the labeled count has reached the stop ratio
    pub fn is_exhausted(&self, labeled: usize, total: usize) -> bool {
        labeled as f64 / total as f64 >= self.stop_ratio - 1e-9
    }
}

/// Report for one absorb step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbsorbReport {
    /// Samples moved into the labeled pool
    pub added: usize,
    /// Pseudo-labels among them
    pub pseudo_added: usize,
    /// Pseudo-labels matching their hidden ground truth
    pub pseudo_correct: usize,
}

impl AbsorbReport {
    /// Fraction of absorbed pseudo-labels that were correct
    pub fn pseudo_accuracy(&self) -> Option<f64> {
        if self.pseudo_added > 0 {
            Some(self.pseudo_correct as f64 / self.pseudo_added as f64)
        } else {
            None
        }
    }
}

/// Labeled/unlabeled bookkeeping over one training-set store
#[derive(Debug, Clone)]
pub struct LabelPool {
    labeled: Vec<u64>,
    unlabeled: Vec<u64>,
    entries: HashMap<u64, PoolEntry>,
    total: usize,
}

impl LabelPool {
    /// Seed the pool: shuffle, split at the budget's initial ratio, and move
    /// held-out classes from the labeled side into the unlabeled side so they
    /// can only enter through sampling (the novel-class scenario).
    ///
    /// With `stratified` set, the initial labeled pool draws proportionally
    /// from every class.
    pub fn seed(
        store: &ImageStore,
        budget: &BudgetSchedule,
        num_classes: usize,
        remove_classes: &[usize],
        stratified: bool,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        budget.validate()?;
        let total = store.len();
        if total == 0 {
            return Err(WeaksupError::Pool("cannot seed from an empty store".to_string()));
        }

        let initial = budget.initial_count(total).min(total);
        let mut seed_labeled: Vec<u64> = if stratified {
            Self::stratified_seed(store, initial, num_classes, rng)
        } else {
            let mut ids: Vec<u64> = (0..total as u64).collect();
            ids.shuffle(rng);
            ids.truncate(initial);
            ids
        };

        // Held-out classes go back to the unlabeled pool.
        let seeded: std::collections::HashSet<u64> = seed_labeled.iter().copied().collect();
        let mut unlabeled: Vec<u64> = (0..total as u64)
            .filter(|id| !seeded.contains(id))
            .collect();
        if !remove_classes.is_empty() {
            let (kept, removed): (Vec<u64>, Vec<u64>) = seed_labeled
                .into_iter()
                .partition(|&id| !remove_classes.contains(&store.label_of(id)));
            seed_labeled = kept;
            unlabeled.extend(removed);
        }

        let entries = seed_labeled
            .iter()
            .map(|&id| {
                (
                    id,
                    PoolEntry {
                        target: store.label_of(id),
                        provenance: Provenance::Oracle,
                    },
                )
            })
            .collect();

        debug!(
            "Seeded pool: {} labeled / {} unlabeled",
            seed_labeled.len(),
            unlabeled.len()
        );

        Ok(Self {
            labeled: seed_labeled,
            unlabeled,
            entries,
            total,
        })
    }

    fn stratified_seed(
        store: &ImageStore,
        initial: usize,
        num_classes: usize,
        rng: &mut ChaCha8Rng,
    ) -> Vec<u64> {
        let mut by_class: Vec<Vec<u64>> = vec![Vec::new(); num_classes];
        for item in store.items() {
            if item.label < num_classes {
                by_class[item.label].push(item.id);
            }
        }

        let fraction = initial as f64 / store.len() as f64;
        let mut seeded = Vec::with_capacity(initial);
        for ids in by_class.iter_mut() {
            ids.shuffle(rng);
            let take = ((ids.len() as f64 * fraction).ceil() as usize).min(ids.len());
            seeded.extend(ids.iter().take(take));
        }

        seeded.shuffle(rng);
        seeded.truncate(initial);
        seeded
    }

    pub fn labeled_ids(&self) -> &[u64] {
        &self.labeled
    }

    pub fn unlabeled_ids(&self) -> &[u64] {
        &self.unlabeled
    }

    pub fn labeled_count(&self) -> usize {
        self.labeled.len()
    }

    pub fn unlabeled_count(&self) -> usize {
        self.unlabeled.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Current labeled fraction of the seeded total
    pub fn labeled_ratio(&self) -> f64 {
        self.labeled.len() as f64 / self.total as f64
    }

    /// The target a labeled sample currently carries
    pub fn target_of(&self, id: u64) -> Option<usize> {
        self.entries.get(&id).map(|e| e.target)
    }

    /// The provenance of a labeled sample
    pub fn provenance_of(&self, id: u64) -> Option<Provenance> {
        self.entries.get(&id).map(|e| e.provenance)
    }

    /// Materialize the labeled pool as training items carrying their
    /// current targets (pseudo-labels included).
    pub fn labeled_items(&self, store: &ImageStore) -> Vec<TrainItem> {
        self.labeled
            .iter()
            .filter_map(|&id| {
                let entry = self.entries.get(&id)?;
                let item = store.item(id)?;
                Some(TrainItem::new(item.image.clone(), entry.target, id))
            })
            .collect()
    }

    /// Confidence weights aligned with `labeled_items`; oracle samples get 1.0
    pub fn labeled_weights(&self) -> Vec<f32> {
        self.labeled
            .iter()
            .filter_map(|&id| self.entries.get(&id))
            .map(|e| match e.provenance {
                Provenance::Oracle => 1.0,
                Provenance::Pseudo { confidence } => confidence,
            })
            .collect()
    }

    /// Absorb a selection from the unlabeled side into the labeled side.
    ///
    /// Oracle selections reveal ground truth; predicted selections assign the
    /// model's label and record its correctness against the hidden target.
    pub fn absorb(&mut self, selection: &Selection, store: &ImageStore) -> Result<AbsorbReport> {
        let mut report = AbsorbReport::default();

        let predicted: Option<&Vec<(usize, f32)>> = match &selection.labels {
            SelectionLabels::Oracle => None,
            SelectionLabels::Predicted(labels) => {
                if labels.len() != selection.ids.len() {
                    return Err(WeaksupError::Pool(format!(
                        "selection carries {} ids but {} predicted labels",
                        selection.ids.len(),
                        labels.len()
                    )));
                }
                Some(labels)
            }
        };

        for (i, &id) in selection.ids.iter().enumerate() {
            let pos = self
                .unlabeled
                .iter()
                .position(|&u| u == id)
                .ok_or_else(|| {
                    WeaksupError::Pool(format!("sample {} is not in the unlabeled pool", id))
                })?;
            self.unlabeled.swap_remove(pos);

            let entry = match predicted {
                None => PoolEntry {
                    target: store.label_of(id),
                    provenance: Provenance::Oracle,
                },
                Some(labels) => {
                    let (label, confidence) = labels[i];
                    report.pseudo_added += 1;
                    if label == store.label_of(id) {
                        report.pseudo_correct += 1;
                    }
                    PoolEntry {
                        target: label,
                        provenance: Provenance::Pseudo { confidence },
                    }
                }
            };

            self.entries.insert(id, entry);
            self.labeled.push(id);
            report.added += 1;
        }

        debug!(
            "Absorbed {} samples ({} pseudo, {} correct); labeled ratio now {:.1}%",
            report.added,
            report.pseudo_added,
            report.pseudo_correct,
            self.labeled_ratio() * 100.0
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn store_with_classes(per_class: usize, num_classes: usize) -> ImageStore {
        let mut pairs = Vec::new();
        for class in 0..num_classes {
            for _ in 0..per_class {
                pairs.push((vec![class as f32; 12], class));
            }
        }
        ImageStore::from_pairs(pairs)
    }

    fn seeded_pool(store: &ImageStore, budget: BudgetSchedule) -> LabelPool {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        LabelPool::seed(store, &budget, 5, &[], true, &mut rng).unwrap()
    }

    #[test]
    fn test_seed_partitions_store() {
        let store = store_with_classes(20, 5);
        let pool = seeded_pool(&store, BudgetSchedule::default());

        assert_eq!(pool.labeled_count() + pool.unlabeled_count(), 100);
        assert_eq!(pool.labeled_count(), 5);

        for &id in pool.labeled_ids() {
            assert!(!pool.unlabeled_ids().contains(&id));
            assert_eq!(pool.provenance_of(id), Some(Provenance::Oracle));
        }
    }

    #[test]
    fn test_stratified_seed_covers_classes() {
        let store = store_with_classes(20, 5);
        let budget = BudgetSchedule {
            initial_ratio: 0.25,
            ..Default::default()
        };
        let pool = seeded_pool(&store, budget);

        let mut class_seen = vec![false; 5];
        for &id in pool.labeled_ids() {
            class_seen[store.label_of(id)] = true;
        }
        assert!(class_seen.iter().all(|&seen| seen));
    }

    #[test]
    fn test_remove_classes_returns_to_unlabeled() {
        let store = store_with_classes(20, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let budget = BudgetSchedule {
            initial_ratio: 0.25,
            ..Default::default()
        };
        let pool = LabelPool::seed(&store, &budget, 5, &[0, 1], true, &mut rng).unwrap();

        for &id in pool.labeled_ids() {
            assert!(store.label_of(id) > 1);
        }
        assert_eq!(pool.labeled_count() + pool.unlabeled_count(), 100);
    }

    #[test]
    fn test_absorb_oracle() {
        let store = store_with_classes(20, 5);
        let mut pool = seeded_pool(&store, BudgetSchedule::default());

        let picks: Vec<u64> = pool.unlabeled_ids()[..3].to_vec();
        let before = pool.labeled_count();
        let report = pool
            .absorb(&Selection::oracle(picks.clone()), &store)
            .unwrap();

        assert_eq!(report.added, 3);
        assert_eq!(report.pseudo_added, 0);
        assert_eq!(pool.labeled_count(), before + 3);
        for id in picks {
            assert_eq!(pool.target_of(id), Some(store.label_of(id)));
        }
    }

    #[test]
    fn test_absorb_pseudo_tracks_correctness() {
        let store = store_with_classes(20, 5);
        let mut pool = seeded_pool(&store, BudgetSchedule::default());

        let ids: Vec<u64> = pool.unlabeled_ids()[..2].to_vec();
        let truth0 = store.label_of(ids[0]);
        let wrong1 = (store.label_of(ids[1]) + 1) % 5;

        let selection = Selection::predicted(
            ids.clone(),
            vec![(truth0, 0.95), (wrong1, 0.91)],
        );
        let report = pool.absorb(&selection, &store).unwrap();

        assert_eq!(report.pseudo_added, 2);
        assert_eq!(report.pseudo_correct, 1);
        assert_eq!(report.pseudo_accuracy(), Some(0.5));
        assert_eq!(pool.target_of(ids[1]), Some(wrong1));
        assert_eq!(
            pool.provenance_of(ids[1]),
            Some(Provenance::Pseudo { confidence: 0.91 })
        );
    }

    #[test]
    fn test_absorb_rejects_unknown_id() {
        let store = store_with_classes(20, 5);
        let mut pool = seeded_pool(&store, BudgetSchedule::default());

        let labeled_id = pool.labeled_ids()[0];
        let result = pool.absorb(&Selection::oracle(vec![labeled_id]), &store);
        assert!(result.is_err());
    }

    #[test]
    fn test_budget_arithmetic() {
        let budget = BudgetSchedule {
            initial_ratio: 0.05,
            increment_ratio: 0.1,
            stop_ratio: 0.35,
        };

        assert_eq!(budget.initial_count(1000), 50);
        assert_eq!(budget.per_round(1000), 100);
        assert!(!budget.is_exhausted(340, 1000));
        assert!(budget.is_exhausted(350, 1000));
    }

    #[test]
    fn test_budget_validation() {
        let bad = BudgetSchedule {
            initial_ratio: 0.5,
            increment_ratio: 0.1,
            stop_ratio: 0.2,
        };
        assert!(bad.validate().is_err());

        let zero_step = BudgetSchedule {
            increment_ratio: 0.0,
            ..Default::default()
        };
        assert!(zero_step.validate().is_err());
    }

    #[test]
    fn test_labeled_items_carry_pool_targets() {
        let store = store_with_classes(20, 5);
        let mut pool = seeded_pool(&store, BudgetSchedule::default());

        let id = pool.unlabeled_ids()[0];
        let wrong = (store.label_of(id) + 2) % 5;
        pool.absorb(&Selection::predicted(vec![id], vec![(wrong, 0.9)]), &store)
            .unwrap();

        let items = pool.labeled_items(&store);
        let item = items.iter().find(|i| i.id == id).unwrap();
        assert_eq!(item.label, wrong);

        let weights = pool.labeled_weights();
        assert_eq!(weights.len(), items.len());
        assert!(weights.iter().any(|&w| (w - 0.9).abs() < 1e-6));
    }
}
