//! Dataset module for the label-budget harness
//!
//! This module provides:
//! - In-memory image stores for CIFAR-10 and ISIC-style datasets
//! - Burn batchers for classification, pseudo-labeled, and two-view batches
//! - The label pool bookkeeping that drives the budget loop
//! - Deterministic augmentation, including the two-view contrastive transform
//!
//! Images are kept as flat CHW `f32` buffers in `[0, 1]`; per-dataset channel
//! normalization is applied at batch time.

pub mod augment;
pub mod cifar10;
pub mod isic;
pub mod pool;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub use pool::{AbsorbReport, BudgetSchedule, LabelPool, Provenance};

/// A single training image ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainItem {
    /// Image data as flattened CHW float array [3 * H * W], values in [0, 1]
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
    /// Stable sample id within its store
    pub id: u64,
}

impl TrainItem {
    pub fn new(image: Vec<f32>, label: usize, id: u64) -> Self {
        Self { image, label, id }
    }
}

/// Static description of a loaded dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Short dataset name used in run identifiers (e.g. "cifar10")
    pub name: String,
    /// Number of classes
    pub num_classes: usize,
    /// Square image side in pixels
    pub image_size: usize,
    /// Per-channel normalization mean
    pub channel_mean: [f32; 3],
    /// Per-channel normalization std
    pub channel_std: [f32; 3],
    /// Class names, indexed by label
    pub class_names: Vec<String>,
}

/// In-memory collection of training items; ids are indices into the store
#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    items: Vec<TrainItem>,
}

impl ImageStore {
    pub fn new(items: Vec<TrainItem>) -> Self {
        Self { items }
    }

    /// Build a store from (image, label) pairs, assigning sequential ids
    pub fn from_pairs(pairs: Vec<(Vec<f32>, usize)>) -> Self {
        let items = pairs
            .into_iter()
            .enumerate()
            .map(|(id, (image, label))| TrainItem::new(image, label, id as u64))
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: u64) -> Option<&TrainItem> {
        self.items.get(id as usize)
    }

    /// Ground-truth label of a sample; panics on an id outside the store
    pub fn label_of(&self, id: u64) -> usize {
        self.items[id as usize].label
    }

    pub fn items(&self) -> &[TrainItem] {
        &self.items
    }

    /// Per-class sample counts
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for item in &self.items {
            if item.label < num_classes {
                counts[item.label] += 1;
            }
        }
        counts
    }

    /// Keep a seeded random subset of at most `max` items, re-assigning ids
    pub fn truncate_random(&mut self, max: usize, rng: &mut ChaCha8Rng) {
        if self.items.len() <= max {
            return;
        }
        self.items.shuffle(rng);
        self.items.truncate(max);
        for (id, item) in self.items.iter_mut().enumerate() {
            item.id = id as u64;
        }
    }
}

impl Dataset<TrainItem> for ImageStore {
    fn get(&self, index: usize) -> Option<TrainItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Class weights for weighted cross-entropy over a hidden-label pool:
/// `w_c = ln(N) - ln(n_c)` with a floor of one sample per class.
pub fn class_weights(store: &ImageStore, ids: &[u64], num_classes: usize) -> Vec<f32> {
    let mut counts = vec![0usize; num_classes];
    for &id in ids {
        let label = store.label_of(id);
        if label < num_classes {
            counts[label] += 1;
        }
    }

    let total = ids.len().max(1) as f32;
    counts
        .iter()
        .map(|&n| total.ln() - (n.max(1) as f32).ln())
        .collect()
}

/// A batch of images for classifier training or evaluation
#[derive(Clone, Debug)]
pub struct ClassifyBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher for classification batches with per-dataset normalization
#[derive(Clone, Debug)]
pub struct ClassifyBatcher {
    image_size: usize,
    mean: [f32; 3],
    std: [f32; 3],
}

impl ClassifyBatcher {
    pub fn new(spec: &DatasetSpec) -> Self {
        Self {
            image_size: spec.image_size,
            mean: spec.channel_mean,
            std: spec.channel_std,
        }
    }
}

impl<B: Backend> Batcher<B, TrainItem, ClassifyBatch<B>> for ClassifyBatcher {
    fn batch(&self, items: Vec<TrainItem>, device: &B::Device) -> ClassifyBatch<B> {
        let batch_size = items.len();
        let side = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, side, side]),
            device,
        );
        let images = normalize(images, self.mean, self.std, device);

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        ClassifyBatch { images, targets }
    }
}

/// A batch of pseudo-labeled images with confidence weights
#[derive(Clone, Debug)]
pub struct PseudoBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
    /// Per-sample confidence weights with shape [batch_size]
    pub weights: Tensor<B, 1>,
}

/// An item carrying a pseudo-label confidence, batched by [`PseudoBatcher`]
#[derive(Clone, Debug)]
pub struct WeightedItem {
    pub item: TrainItem,
    pub confidence: f32,
}

/// Batcher for confidence-weighted pseudo-labeled batches
#[derive(Clone, Debug)]
pub struct PseudoBatcher {
    inner: ClassifyBatcher,
}

impl PseudoBatcher {
    pub fn new(spec: &DatasetSpec) -> Self {
        Self {
            inner: ClassifyBatcher::new(spec),
        }
    }
}

impl<B: Backend> Batcher<B, WeightedItem, PseudoBatch<B>> for PseudoBatcher {
    fn batch(&self, items: Vec<WeightedItem>, device: &B::Device) -> PseudoBatch<B> {
        let batch_size = items.len();
        let weights_data: Vec<f32> = items.iter().map(|w| w.confidence).collect();
        let plain: Vec<TrainItem> = items.into_iter().map(|w| w.item).collect();

        let ClassifyBatch { images, targets } = self.inner.batch(plain, device);
        let weights =
            Tensor::<B, 1>::from_floats(TensorData::new(weights_data, [batch_size]), device);

        PseudoBatch {
            images,
            targets,
            weights,
        }
    }
}

/// A batch of two independently augmented views for contrastive pretraining
#[derive(Clone, Debug)]
pub struct TwoViewBatch<B: Backend> {
    /// First views with shape [batch_size, 3, height, width]
    pub view_a: Tensor<B, 4>,
    /// Second views with shape [batch_size, 3, height, width]
    pub view_b: Tensor<B, 4>,
}

/// Batcher for paired views; inputs stay in [0, 1] as the contrastive
/// transform already randomizes the color statistics.
#[derive(Clone, Debug)]
pub struct TwoViewBatcher {
    image_size: usize,
}

impl TwoViewBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, (Vec<f32>, Vec<f32>), TwoViewBatch<B>> for TwoViewBatcher {
    fn batch(&self, items: Vec<(Vec<f32>, Vec<f32>)>, device: &B::Device) -> TwoViewBatch<B> {
        let batch_size = items.len();
        let side = self.image_size;

        let mut data_a = Vec::with_capacity(batch_size * 3 * side * side);
        let mut data_b = Vec::with_capacity(batch_size * 3 * side * side);
        for (a, b) in items {
            data_a.extend(a);
            data_b.extend(b);
        }

        let view_a = Tensor::<B, 4>::from_floats(
            TensorData::new(data_a, [batch_size, 3, side, side]),
            device,
        );
        let view_b = Tensor::<B, 4>::from_floats(
            TensorData::new(data_b, [batch_size, 3, side, side]),
            device,
        );

        TwoViewBatch { view_a, view_b }
    }
}

fn normalize<B: Backend>(
    images: Tensor<B, 4>,
    mean: [f32; 3],
    std: [f32; 3],
    device: &B::Device,
) -> Tensor<B, 4> {
    let mean = Tensor::<B, 4>::from_floats(TensorData::new(mean.to_vec(), [1, 3, 1, 1]), device);
    let std = Tensor::<B, 4>::from_floats(TensorData::new(std.to_vec(), [1, 3, 1, 1]), device);
    (images - mean) / std
}

/// Seeded mini-batch index iterator over a fixed-size collection
#[derive(Debug, Clone)]
pub struct IndexLoader {
    indices: Vec<usize>,
    batch_size: usize,
    current: usize,
    drop_last: bool,
}

impl IndexLoader {
    /// Create a loader over `num_samples` shuffled indices
    pub fn shuffled(num_samples: usize, batch_size: usize, rng: &mut ChaCha8Rng) -> Self {
        let mut indices: Vec<usize> = (0..num_samples).collect();
        indices.shuffle(rng);
        Self {
            indices,
            batch_size,
            current: 0,
            drop_last: false,
        }
    }

    /// Create a loader preserving order (for evaluation)
    pub fn sequential(num_samples: usize, batch_size: usize) -> Self {
        Self {
            indices: (0..num_samples).collect(),
            batch_size,
            current: 0,
            drop_last: false,
        }
    }

    /// Drop the trailing partial batch (required by NT-Xent's fixed 2N logits)
    pub fn with_drop_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn num_batches(&self) -> usize {
        if self.drop_last {
            self.indices.len() / self.batch_size
        } else {
            (self.indices.len() + self.batch_size - 1) / self.batch_size
        }
    }
}

impl Iterator for IndexLoader {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.current >= self.indices.len() {
            return None;
        }
        let end = (self.current + self.batch_size).min(self.indices.len());
        if self.drop_last && end - self.current < self.batch_size {
            return None;
        }
        let batch = self.indices[self.current..end].to_vec();
        self.current = end;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn tiny_store() -> ImageStore {
        ImageStore::from_pairs(vec![
            (vec![0.0; 12], 0),
            (vec![0.1; 12], 0),
            (vec![0.2; 12], 1),
            (vec![0.3; 12], 2),
        ])
    }

    #[test]
    fn test_store_ids_are_indices() {
        let store = tiny_store();
        assert_eq!(store.len(), 4);
        assert_eq!(store.item(2).unwrap().label, 1);
        assert_eq!(store.label_of(3), 2);
    }

    #[test]
    fn test_class_counts() {
        let store = tiny_store();
        assert_eq!(store.class_counts(3), vec![2, 1, 1]);
    }

    #[test]
    fn test_class_weights_prefer_rare_classes() {
        let store = tiny_store();
        let ids: Vec<u64> = (0..4).collect();
        let weights = class_weights(&store, &ids, 3);

        // Class 0 has twice the samples of classes 1 and 2, so its weight is lower.
        assert!(weights[0] < weights[1]);
        assert!((weights[1] - weights[2]).abs() < 1e-6);
    }

    #[test]
    fn test_index_loader_covers_all() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let loader = IndexLoader::shuffled(10, 3, &mut rng);
        assert_eq!(loader.num_batches(), 4);

        let mut seen: Vec<usize> = loader.flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_index_loader_drop_last() {
        let loader = IndexLoader::sequential(10, 3).with_drop_last();
        assert_eq!(loader.num_batches(), 3);

        let batches: Vec<Vec<usize>> = loader.collect();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 3));
    }

    #[test]
    fn test_truncate_random_reassigns_ids() {
        let mut store = tiny_store();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        store.truncate_random(2, &mut rng);

        assert_eq!(store.len(), 2);
        let ids: Vec<u64> = store.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
