//! Contrastive self-supervised pretraining (SimCLR / NT-Xent)
//!
//! NT-Xent treats the two augmented views of each image as a positive pair
//! and every other view in the batch as a negative. For 2N projections the
//! per-row loss is
//!
//! ```text
//! l_i = -sim(i, pos(i))/τ + ln Σ_{j≠i} exp(sim(i, j)/τ)
//! ```
//!
//! averaged over all 2N rows, with cosine similarity on L2-normalized
//! projections.

use burn::{
    data::dataloader::batcher::Batcher,
    module::Module,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::augment::{TwoViewConfig, TwoViewTransform};
use crate::dataset::{DatasetSpec, ImageStore, IndexLoader, TwoViewBatch, TwoViewBatcher};
use crate::model::cnn::{Encoder, EncoderConfig};
use crate::model::simclr::{ProjectionConfig, SimClrModel};
use crate::utils::error::{Result, WeaksupError};
use crate::utils::metrics::RunningAverage;

/// Configuration for SimCLR pretraining
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PretrainConfig {
    /// Pretraining epochs
    pub epochs: usize,

    /// Batch size; NT-Xent sees 2x this many projections
    pub batch_size: usize,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Softmax temperature τ
    pub temperature: f64,

    /// Projection head output dimensionality
    pub projection_dim: usize,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 256,
            learning_rate: 0.001,
            temperature: 0.5,
            projection_dim: 64,
        }
    }
}

/// Normalized temperature-scaled cross-entropy loss
#[derive(Debug, Clone)]
pub struct NtXentLoss {
    temperature: f64,
}

impl NtXentLoss {
    pub fn new(temperature: f64) -> Self {
        Self { temperature }
    }

    /// Loss over paired projections `z_a[i] <-> z_b[i]`, each [N, D]
    pub fn forward<B: Backend>(&self, z_a: Tensor<B, 2>, z_b: Tensor<B, 2>) -> Tensor<B, 1> {
        let n = z_a.dims()[0];
        let device = z_a.device();
        let rows = 2 * n;

        let z = Tensor::cat(vec![z_a, z_b], 0);

        // L2-normalize rows so the similarity matrix is cosine similarity.
        let norm = z.clone().powf_scalar(2.0).sum_dim(1).sqrt() + 1e-12;
        let z = z / norm;

        let sim = z.clone().matmul(z.transpose()) / self.temperature;

        // Positive pairs sit at diagonal offsets ±N.
        let mut pos_mask = vec![0.0f32; rows * rows];
        let mut self_mask = vec![0.0f32; rows * rows];
        for i in 0..n {
            pos_mask[i * rows + (n + i)] = 1.0;
            pos_mask[(n + i) * rows + i] = 1.0;
        }
        for i in 0..rows {
            self_mask[i * rows + i] = 1.0;
        }
        let pos_mask =
            Tensor::<B, 2>::from_floats(TensorData::new(pos_mask, [rows, rows]), &device);
        let self_mask =
            Tensor::<B, 2>::from_floats(TensorData::new(self_mask, [rows, rows]), &device);

        let positives = (sim.clone() * pos_mask).sum_dim(1);

        // Mask self-similarity out of the denominator, then a stable
        // log-sum-exp over each row.
        let sim_masked = sim + self_mask * (-1e9);
        let row_max = sim_masked.clone().max_dim(1).detach();
        let lse = (sim_masked - row_max.clone()).exp().sum_dim(1).log() + row_max;

        (lse - positives).mean()
    }
}

/// Pretrain an encoder with SimCLR on the full (unlabeled) training store.
///
/// Returns the pretrained encoder (projection head discarded) and the
/// average loss per epoch.
pub fn pretrain<B: AutodiffBackend>(
    store: &ImageStore,
    spec: &DatasetSpec,
    encoder_config: &EncoderConfig,
    config: &PretrainConfig,
    device: &B::Device,
    rng: &mut ChaCha8Rng,
) -> Result<(Encoder<B>, Vec<f64>)> {
    if config.batch_size < 2 {
        return Err(WeaksupError::Config(
            "contrastive batch_size must be at least 2".to_string(),
        ));
    }
    if store.len() < config.batch_size {
        return Err(WeaksupError::Training(format!(
            "store has {} samples but the contrastive batch size is {}",
            store.len(),
            config.batch_size
        )));
    }

    let projection_config = ProjectionConfig::new().with_projection_dim(config.projection_dim);
    let mut model = SimClrModel::<B>::new(encoder_config, &projection_config, device);
    let mut optimizer = AdamConfig::new().init();

    let loss_fn = NtXentLoss::new(config.temperature);
    let transform = TwoViewTransform::new(TwoViewConfig::default(), spec.image_size);
    let batcher = TwoViewBatcher::new(spec.image_size);

    info!(
        "SimCLR pretraining: {} epochs, batch {} ({} images), τ = {}",
        config.epochs,
        config.batch_size,
        store.len(),
        config.temperature
    );

    let mut epoch_losses = Vec::with_capacity(config.epochs);
    for epoch in 0..config.epochs {
        let loader =
            IndexLoader::shuffled(store.len(), config.batch_size, rng).with_drop_last();
        let mut loss_meter = RunningAverage::new();

        for batch_indices in loader {
            let pairs: Vec<(Vec<f32>, Vec<f32>)> = batch_indices
                .iter()
                .map(|&i| transform.apply(&store.items()[i].image, rng))
                .collect();
            let batch: TwoViewBatch<B> = batcher.batch(pairs, device);

            let z_a = model.forward(batch.view_a);
            let z_b = model.forward(batch.view_b);
            let loss = loss_fn.forward(z_a, z_b);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_meter.add(loss_value, 1);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let avg = loss_meter.average();
        epoch_losses.push(avg);
        info!(
            "Pretrain epoch {}/{}: NT-Xent loss = {:.4}",
            epoch + 1,
            config.epochs,
            avg
        );
    }

    Ok((model.into_encoder(), epoch_losses))
}
