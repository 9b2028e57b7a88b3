//! Supervised training loop
//!
//! A custom epoch loop over Burn's autodiff primitives: forward pass,
//! cross-entropy loss (optionally class-weighted, optionally
//! confidence-weighted for pseudo-labeled samples), backward pass, and an
//! Adam step. The budget loop constructs a fresh `Trainer` every round.

use std::path::Path;

use burn::{
    data::dataloader::batcher::Batcher,
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Int, Tensor},
};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::augment::Augmenter;
use crate::dataset::{
    ClassifyBatch, ClassifyBatcher, DatasetSpec, IndexLoader, PseudoBatch, PseudoBatcher,
    TrainItem, WeightedItem,
};
use crate::model::Classifier;
use crate::training::scheduler::LrSchedule;
use crate::utils::error::{Result, WeaksupError};
use crate::utils::metrics::{Metrics, RunningAverage};

/// Training hyperparameters for one budget round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Number of epochs per round
    pub epochs: usize,

    /// Mini-batch size
    pub batch_size: usize,

    /// Base learning rate for Adam
    pub learning_rate: f64,

    /// Learning rate schedule
    pub scheduler: LrSchedule,

    /// Weight the loss by inverse log class frequency
    pub weighted_loss: bool,

    /// Apply train-time augmentation
    pub augment: bool,

    /// Stop the round early after this many epochs without improvement
    pub early_stop_patience: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            batch_size: 64,
            learning_rate: 0.001,
            scheduler: LrSchedule::default(),
            weighted_loss: false,
            augment: false,
            early_stop_patience: Some(10),
        }
    }
}

/// Summary of one fit call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    /// Epochs actually run (early stopping may cut the round short)
    pub epochs_run: usize,
    /// Epoch with the best validation accuracy
    pub best_epoch: usize,
    /// Best validation accuracy seen
    pub best_val_accuracy: f64,
    /// Average training loss per epoch
    pub train_losses: Vec<f64>,
    /// Validation accuracy per epoch
    pub val_accuracies: Vec<f64>,
}

/// Trainer for a [`Classifier`] on an autodiff backend
pub struct Trainer<B: AutodiffBackend> {
    model: Classifier<B>,
    config: TrainConfig,
    device: B::Device,
    class_weights: Option<Vec<f32>>,
    sample_weights: Option<Vec<f32>>,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(model: Classifier<B>, config: TrainConfig, device: B::Device) -> Self {
        Self {
            model,
            config,
            device,
            class_weights: None,
            sample_weights: None,
        }
    }

    /// Weight the cross-entropy by per-class weights
    pub fn with_class_weights(mut self, weights: Vec<f32>) -> Self {
        self.class_weights = Some(weights);
        self
    }

    /// Weight individual samples (pseudo-label confidences), aligned with
    /// the training items passed to `fit`
    pub fn with_sample_weights(mut self, weights: Vec<f32>) -> Self {
        self.sample_weights = Some(weights);
        self
    }

    pub fn model(&self) -> &Classifier<B> {
        &self.model
    }

    /// Train on `train_items`, validating each epoch on `val_items`.
    ///
    /// Keeps the weights of the best validation epoch.
    pub fn fit(
        &mut self,
        train_items: &[TrainItem],
        val_items: &[TrainItem],
        spec: &DatasetSpec,
        rng: &mut ChaCha8Rng,
    ) -> Result<FitReport> {
        if train_items.is_empty() {
            return Err(WeaksupError::Training(
                "no labeled samples to train on".to_string(),
            ));
        }
        if let Some(weights) = &self.sample_weights {
            if weights.len() != train_items.len() {
                return Err(WeaksupError::Training(format!(
                    "{} sample weights for {} training items",
                    weights.len(),
                    train_items.len()
                )));
            }
        }

        let augmenter = self
            .config
            .augment
            .then(|| Augmenter::with_defaults(spec.image_size));

        let mut optimizer = AdamConfig::new().init();

        let mut report = FitReport {
            epochs_run: 0,
            best_epoch: 0,
            best_val_accuracy: 0.0,
            train_losses: Vec::new(),
            val_accuracies: Vec::new(),
        };
        let mut best_model = self.model.clone();
        let mut epochs_without_improvement = 0usize;

        for epoch in 0..self.config.epochs {
            let lr = self
                .config
                .scheduler
                .lr_at(epoch, self.config.epochs, self.config.learning_rate);

            let (train_loss, train_acc) =
                self.train_epoch(&mut optimizer, train_items, spec, lr, augmenter.as_ref(), rng);
            let val_acc = self.evaluate_accuracy(val_items, spec);

            report.epochs_run = epoch + 1;
            report.train_losses.push(train_loss);
            report.val_accuracies.push(val_acc);

            debug!(
                "epoch {}/{} | loss {:.4} | train acc {:.2}% | val acc {:.2}% | lr {:.6}",
                epoch + 1,
                self.config.epochs,
                train_loss,
                train_acc * 100.0,
                val_acc * 100.0,
                lr
            );

            if val_acc > report.best_val_accuracy {
                report.best_val_accuracy = val_acc;
                report.best_epoch = epoch;
                best_model = self.model.clone();
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
                if let Some(patience) = self.config.early_stop_patience {
                    if epochs_without_improvement >= patience {
                        info!(
                            "Early stop at epoch {} (no improvement for {} epochs)",
                            epoch + 1,
                            patience
                        );
                        break;
                    }
                }
            }
        }

        self.model = best_model;
        Ok(report)
    }

    fn train_epoch<O: Optimizer<Classifier<B>, B>>(
        &mut self,
        optimizer: &mut O,
        train_items: &[TrainItem],
        spec: &DatasetSpec,
        lr: f64,
        augmenter: Option<&Augmenter>,
        rng: &mut ChaCha8Rng,
    ) -> (f64, f64) {
        let loader = IndexLoader::shuffled(train_items.len(), self.config.batch_size, rng);
        let mut loss_meter = RunningAverage::new();
        let mut correct = 0usize;
        let mut total = 0usize;

        for batch_indices in loader {
            let mut items: Vec<TrainItem> = batch_indices
                .iter()
                .map(|&i| train_items[i].clone())
                .collect();

            if let Some(augmenter) = augmenter {
                for item in items.iter_mut() {
                    augmenter.apply(&mut item.image, rng);
                }
            }

            let batch_len = items.len();
            let (loss, output, targets) = match &self.sample_weights {
                Some(weights) => {
                    let weighted: Vec<WeightedItem> = items
                        .into_iter()
                        .zip(batch_indices.iter().map(|&i| weights[i]))
                        .map(|(item, confidence)| WeightedItem { item, confidence })
                        .collect();
                    let batch: PseudoBatch<B> = PseudoBatcher::new(spec).batch(weighted, &self.device);

                    let output = self.model.forward(batch.images);
                    let loss = self.weighted_cross_entropy(
                        output.clone(),
                        batch.targets.clone(),
                        batch.weights,
                    );
                    (loss, output, batch.targets)
                }
                None => {
                    let batch: ClassifyBatch<B> =
                        ClassifyBatcher::new(spec).batch(items, &self.device);

                    let output = self.model.forward(batch.images);
                    let mut loss_config = CrossEntropyLossConfig::new();
                    if let Some(weights) = &self.class_weights {
                        loss_config = loss_config.with_weights(Some(weights.clone()));
                    }
                    let loss = loss_config
                        .init(&output.device())
                        .forward(output.clone(), batch.targets.clone());
                    (loss, output, batch.targets)
                }
            };

            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_meter.add(loss_value, 1);

            let predictions = output.argmax(1).squeeze::<1>(1);
            let batch_correct: i64 = predictions
                .equal(targets)
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            total += batch_len;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = optimizer.step(lr, self.model.clone(), grads);
        }

        let accuracy = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };
        (loss_meter.average(), accuracy)
    }

    /// Confidence-weighted cross-entropy over pseudo-labeled batches
    fn weighted_cross_entropy(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
        weights: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        let device = logits.device();
        let [batch_size, _num_classes] = logits.dims();

        let log_probs = burn::tensor::activation::log_softmax(logits, 1);
        let targets_2d = targets.reshape([batch_size, 1]);
        let nll = log_probs.gather(1, targets_2d).squeeze::<1>(1).neg();

        let weighted = nll * weights.clone();
        let eps = Tensor::<B, 1>::from_floats([1e-8], &device);
        weighted.sum() / (weights.sum() + eps)
    }

    /// Accuracy-only evaluation on the inner backend
    pub fn evaluate_accuracy(&self, items: &[TrainItem], spec: &DatasetSpec) -> f64 {
        if items.is_empty() {
            return 0.0;
        }

        let device = <B::InnerBackend as Backend>::Device::default();
        let batcher = ClassifyBatcher::new(spec);
        let model = self.model.valid();

        let mut correct = 0usize;
        let mut total = 0usize;

        for batch_indices in IndexLoader::sequential(items.len(), self.config.batch_size) {
            let chunk: Vec<TrainItem> = batch_indices.iter().map(|&i| items[i].clone()).collect();
            let batch_len = chunk.len();
            let batch: ClassifyBatch<B::InnerBackend> = batcher.batch(chunk, &device);

            let output = model.forward(batch.images);
            let predictions = output.argmax(1).squeeze::<1>(1);
            let batch_correct: i64 = predictions
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem();

            correct += batch_correct as usize;
            total += batch_len;
        }

        if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Full metrics evaluation (confusion matrix, top-5, macro scores)
    pub fn evaluate(&self, items: &[TrainItem], spec: &DatasetSpec) -> Metrics {
        let device = <B::InnerBackend as Backend>::Device::default();
        let batcher = ClassifyBatcher::new(spec);
        let model = self.model.valid();

        let mut all_predictions = Vec::new();
        let mut all_probs = Vec::new();
        let mut all_targets = Vec::new();
        let mut loss_meter = RunningAverage::new();

        for batch_indices in IndexLoader::sequential(items.len(), self.config.batch_size) {
            let chunk: Vec<TrainItem> = batch_indices.iter().map(|&i| items[i].clone()).collect();
            let batch: ClassifyBatch<B::InnerBackend> = batcher.batch(chunk, &device);

            let output = model.forward(batch.images);
            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), batch.targets.clone());
            let loss_value: f64 = loss.into_scalar().elem();
            loss_meter.add(loss_value, 1);

            let probs = burn::tensor::activation::softmax(output, 1);
            let [rows, cols] = probs.dims();
            let probs_data: Vec<f32> = probs.into_data().to_vec().unwrap();
            for row in 0..rows {
                all_probs.push(probs_data[row * cols..(row + 1) * cols].to_vec());
            }

            let targets_data: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
            all_targets.extend(targets_data.iter().map(|&t| t as usize));
        }

        for probs in &all_probs {
            let (label, _) = probs
                .iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, &p)| {
                    if p > best.1 {
                        (i, p)
                    } else {
                        best
                    }
                });
            all_predictions.push(label);
        }

        let mut metrics = Metrics::from_predictions_with_probs(
            &all_predictions,
            &all_probs,
            &all_targets,
            spec.num_classes,
        );
        metrics.loss = Some(loss_meter.average());
        metrics
    }

    /// Class posteriors for every item, in input order
    pub fn predict_probs(&self, items: &[TrainItem], spec: &DatasetSpec) -> Vec<Vec<f32>> {
        let device = <B::InnerBackend as Backend>::Device::default();
        let batcher = ClassifyBatcher::new(spec);
        let model = self.model.valid();

        let mut rows = Vec::with_capacity(items.len());
        for batch_indices in IndexLoader::sequential(items.len(), self.config.batch_size) {
            let chunk: Vec<TrainItem> = batch_indices.iter().map(|&i| items[i].clone()).collect();
            let batch: ClassifyBatch<B::InnerBackend> = batcher.batch(chunk, &device);

            let probs = model.forward_softmax(batch.images);
            let [batch_rows, cols] = probs.dims();
            let data: Vec<f32> = probs.into_data().to_vec().unwrap();
            for row in 0..batch_rows {
                rows.push(data[row * cols..(row + 1) * cols].to_vec());
            }
        }

        rows
    }

    /// Save model weights with Burn's compact recorder
    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.model
            .clone()
            .save_file(path.to_path_buf(), &CompactRecorder::new())
            .map_err(|e| WeaksupError::Model(format!("failed to save checkpoint: {:?}", e)))?;
        info!("Checkpoint saved to {:?}", path);
        Ok(())
    }

    /// Load model weights saved by [`Trainer::save_checkpoint`]
    pub fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        self.model = self
            .model
            .clone()
            .load_file(path.to_path_buf(), &CompactRecorder::new(), &self.device)
            .map_err(|e| WeaksupError::Model(format!("failed to load checkpoint: {:?}", e)))?;
        info!("Checkpoint loaded from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TrainingBackend;
    use crate::model::{ClassifierConfig, EncoderConfig};
    use rand::SeedableRng;

    fn tiny_spec() -> DatasetSpec {
        DatasetSpec {
            name: "tiny".to_string(),
            num_classes: 2,
            image_size: 8,
            channel_mean: [0.5, 0.5, 0.5],
            channel_std: [0.25, 0.25, 0.25],
            class_names: vec!["a".to_string(), "b".to_string()],
        }
    }

    fn tiny_items(n: usize) -> Vec<TrainItem> {
        (0..n)
            .map(|i| {
                let label = i % 2;
                // Class 0 is dark, class 1 is bright; separable by intensity.
                let value = if label == 0 { 0.1 } else { 0.9 };
                TrainItem::new(vec![value; 3 * 8 * 8], label, i as u64)
            })
            .collect()
    }

    fn tiny_trainer(config: TrainConfig) -> Trainer<TrainingBackend> {
        let device = Default::default();
        let model_config = ClassifierConfig::new(2, EncoderConfig::new().with_base_filters(4));
        let model = Classifier::<TrainingBackend>::new(&model_config, &device);
        Trainer::new(model, config, device)
    }

    #[test]
    fn test_fit_runs_and_reports() {
        let config = TrainConfig {
            epochs: 2,
            batch_size: 4,
            ..Default::default()
        };
        let mut trainer = tiny_trainer(config);
        let items = tiny_items(8);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let report = trainer.fit(&items, &items, &tiny_spec(), &mut rng).unwrap();

        assert_eq!(report.epochs_run, 2);
        assert_eq!(report.train_losses.len(), 2);
        assert_eq!(report.val_accuracies.len(), 2);
        assert!(report.train_losses.iter().all(|&l| l.is_finite()));
    }

    #[test]
    fn test_fit_rejects_empty_training_set() {
        let mut trainer = tiny_trainer(TrainConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = trainer.fit(&[], &tiny_items(4), &tiny_spec(), &mut rng);
        assert!(result.is_err());
    }

    #[test]
    fn test_fit_rejects_misaligned_sample_weights() {
        let config = TrainConfig {
            epochs: 1,
            batch_size: 4,
            ..Default::default()
        };
        let mut trainer = tiny_trainer(config).with_sample_weights(vec![1.0; 3]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = trainer.fit(&tiny_items(8), &tiny_items(4), &tiny_spec(), &mut rng);
        assert!(result.is_err());
    }

    #[test]
    fn test_predict_probs_shapes() {
        let trainer = tiny_trainer(TrainConfig {
            epochs: 1,
            batch_size: 4,
            ..Default::default()
        });
        let items = tiny_items(6);

        let probs = trainer.predict_probs(&items, &tiny_spec());
        assert_eq!(probs.len(), 6);
        for row in &probs {
            assert_eq!(row.len(), 2);
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_evaluate_produces_metrics() {
        let trainer = tiny_trainer(TrainConfig {
            epochs: 1,
            batch_size: 4,
            ..Default::default()
        });
        let items = tiny_items(6);

        let metrics = trainer.evaluate(&items, &tiny_spec());
        assert_eq!(metrics.total_samples, 6);
        assert!(metrics.loss.is_some());
        assert_eq!(metrics.confusion_matrix.total(), 6);
    }
}
