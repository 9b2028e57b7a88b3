//! Uniform random sampling baseline
//!
//! Selects samples from the unlabeled pool without looking at the model.
//! This is the control arm every other strategy is compared against.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::strategy::Selection;

/// Random baseline sampler
#[derive(Debug, Default)]
pub struct RandomSampler;

impl RandomSampler {
    pub fn new() -> Self {
        Self
    }

    /// Pick up to `budget` ids uniformly without replacement
    pub fn select(
        &self,
        candidate_ids: &[u64],
        budget: usize,
        rng: &mut ChaCha8Rng,
    ) -> Selection {
        let picks: Vec<u64> = candidate_ids
            .choose_multiple(rng, budget.min(candidate_ids.len()))
            .copied()
            .collect();

        Selection::oracle(picks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SelectionLabels;
    use rand::SeedableRng;

    #[test]
    fn test_selects_budget_without_replacement() {
        let ids: Vec<u64> = (0..100).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let selection = RandomSampler::new().select(&ids, 10, &mut rng);

        assert_eq!(selection.len(), 10);
        assert_eq!(selection.labels, SelectionLabels::Oracle);

        let mut sorted = selection.ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 10);
    }

    #[test]
    fn test_budget_larger_than_pool() {
        let ids: Vec<u64> = (0..5).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let selection = RandomSampler::new().select(&ids, 50, &mut rng);
        assert_eq!(selection.len(), 5);
    }

    #[test]
    fn test_seed_determinism() {
        let ids: Vec<u64> = (0..50).collect();

        let mut rng1 = ChaCha8Rng::seed_from_u64(123);
        let mut rng2 = ChaCha8Rng::seed_from_u64(123);

        let a = RandomSampler::new().select(&ids, 8, &mut rng1);
        let b = RandomSampler::new().select(&ids, 8, &mut rng2);
        assert_eq!(a, b);
    }
}
