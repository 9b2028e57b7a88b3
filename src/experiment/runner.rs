//! The label-budget experiment loop
//!
//! Each round trains a fresh classifier on the current labeled pool
//! ("model reset"), evaluates it on the held-out test set, then asks the
//! configured strategy which unlabeled samples to absorb next. The loop
//! ends when the labeled fraction reaches the budget's stop ratio or the
//! unlabeled pool runs dry.
//!
//! When contrastive pretraining is configured, the encoder is pretrained
//! once with SimCLR on the full training store and every round's classifier
//! starts from that encoder.

use burn::tensor::backend::AutodiffBackend;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::dataset::{cifar10, class_weights, isic, DatasetSpec, ImageStore, LabelPool, TrainItem};
use crate::experiment::config::{DatasetConfig, DatasetKind, ExperimentConfig};
use crate::experiment::log::{ExperimentLog, PseudoRoundStats, RoundRecord};
use crate::model::cnn::{Classifier, ClassifierConfig, Encoder, EncoderConfig};
use crate::strategy::Sampler;
use crate::training::contrastive;
use crate::training::trainer::Trainer;
use crate::utils::error::{Result, WeaksupError};
use crate::utils::logging::RoundLogger;

/// A loaded dataset ready for the budget loop
pub struct ExperimentData {
    pub train: ImageStore,
    pub test: ImageStore,
    pub spec: DatasetSpec,
}

/// Load the dataset named by the config, applying the `max_samples` cap
pub fn load_dataset(config: &DatasetConfig, rng: &mut ChaCha8Rng) -> Result<ExperimentData> {
    let mut data = match config.kind {
        DatasetKind::Cifar10 => {
            let data_dir = cifar10::resolve_data_dir(&config.data_dir);
            ExperimentData {
                train: cifar10::load_train(&data_dir)?,
                test: cifar10::load_test(&data_dir)?,
                spec: cifar10::spec(),
            }
        }
        DatasetKind::Isic => {
            let image_size = config.image_size.unwrap_or(isic::DEFAULT_IMAGE_SIZE);
            let index = isic::IsicIndex::scan(&config.data_dir)?;
            let store = index.load(image_size)?;
            // Hold out a deterministic tail as the test split.
            split_train_test(store, index.spec(image_size), rng)?
        }
    };

    if let Some(max) = config.max_samples {
        data.train.truncate_random(max, rng);
        info!("Capped training set at {} samples", data.train.len());
    }

    Ok(data)
}

/// 90/10 seeded split for datasets that ship without a test partition
fn split_train_test(
    store: ImageStore,
    spec: DatasetSpec,
    rng: &mut ChaCha8Rng,
) -> Result<ExperimentData> {
    use rand::seq::SliceRandom;

    let total = store.len();
    if total < 10 {
        return Err(WeaksupError::Dataset(format!(
            "dataset too small to split: {} samples",
            total
        )));
    }

    let mut indices: Vec<usize> = (0..total).collect();
    indices.shuffle(rng);
    let test_size = total / 10;

    let items = store.items();
    let test_pairs: Vec<(Vec<f32>, usize)> = indices[..test_size]
        .iter()
        .map(|&i| (items[i].image.clone(), items[i].label))
        .collect();
    let train_pairs: Vec<(Vec<f32>, usize)> = indices[test_size..]
        .iter()
        .map(|&i| (items[i].image.clone(), items[i].label))
        .collect();

    Ok(ExperimentData {
        train: ImageStore::from_pairs(train_pairs),
        test: ImageStore::from_pairs(test_pairs),
        spec,
    })
}

/// Run the full experiment and return its log record
pub fn run_experiment<B: AutodiffBackend>(
    config: &ExperimentConfig,
    data: &ExperimentData,
    device: &B::Device,
) -> Result<ExperimentLog> {
    config.validate()?;
    if let Some(&bad) = config
        .remove_classes
        .iter()
        .find(|&&c| c >= data.spec.num_classes)
    {
        return Err(WeaksupError::Config(format!(
            "remove_classes entry {} exceeds {} classes",
            bad, data.spec.num_classes
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut log = ExperimentLog::new(config);
    let mut round_logger = RoundLogger::new();

    info!(
        "Experiment '{}': {} train / {} test samples, stop at {:.0}% labeled",
        log.name,
        data.train.len(),
        data.test.len(),
        config.budget.stop_ratio * 100.0
    );

    // Optional self-supervised stage: pretrain the encoder once, reuse it
    // as the starting point of every round.
    let pretrained: Option<Encoder<B>> = match &config.pretrain {
        Some(pretrain_config) => {
            let encoder_config = EncoderConfig::new().with_base_filters(config.base_filters);
            let (encoder, losses) = contrastive::pretrain::<B>(
                &data.train,
                &data.spec,
                &encoder_config,
                pretrain_config,
                device,
                &mut rng,
            )?;
            log.pretrain_losses = Some(losses);
            Some(encoder)
        }
        None => None,
    };

    let mut pool = LabelPool::seed(
        &data.train,
        &config.budget,
        data.spec.num_classes,
        &config.remove_classes,
        config.stratified_seed,
        &mut rng,
    )?;
    let mut sampler = Sampler::from_config(&config.strategy);
    let per_round = config.budget.per_round(data.train.len());
    let test_items = data.test.items().to_vec();
    let is_pseudo = sampler.pseudo_stats().is_some();

    let mut round = 0usize;
    loop {
        round_logger.start_round(round, pool.labeled_count(), pool.labeled_ratio());

        // Model reset: fresh classifier every round, pretrained encoder reused.
        let classifier_config = ClassifierConfig::new(
            data.spec.num_classes,
            EncoderConfig::new().with_base_filters(config.base_filters),
        );
        let model = match &pretrained {
            Some(encoder) => {
                Classifier::<B>::from_encoder(encoder.clone(), &classifier_config, device)
            }
            None => Classifier::<B>::new(&classifier_config, device),
        };

        let mut trainer = Trainer::new(model, config.train.clone(), device.clone());
        if config.train.weighted_loss {
            trainer = trainer.with_class_weights(class_weights(
                &data.train,
                pool.unlabeled_ids(),
                data.spec.num_classes,
            ));
        }
        if is_pseudo {
            trainer = trainer.with_sample_weights(pool.labeled_weights());
        }

        let labeled_items = pool.labeled_items(&data.train);
        let mut fit_rng = ChaCha8Rng::seed_from_u64(rng.gen());
        let report = trainer.fit(&labeled_items, &test_items, &data.spec, &mut fit_rng)?;
        let metrics = trainer.evaluate(&test_items, &data.spec);

        round_logger.end_round(round, metrics.accuracy, metrics.top5_accuracy);
        log.rounds.push(RoundRecord {
            round,
            labeled_count: pool.labeled_count(),
            labeled_ratio: pool.labeled_ratio(),
            metrics: (&metrics).into(),
            epochs_run: report.epochs_run,
            best_val_accuracy: report.best_val_accuracy,
            pseudo: None,
        });

        if config.budget.is_exhausted(pool.labeled_count(), data.train.len()) {
            break;
        }
        if pool.unlabeled_count() == 0 {
            warn!("Unlabeled pool exhausted before the stop ratio");
            break;
        }

        // Selection: score the unlabeled pool, then absorb the picks.
        let candidate_ids = pool.unlabeled_ids().to_vec();
        let posteriors = if sampler.needs_model() {
            let candidates: Vec<TrainItem> = candidate_ids
                .iter()
                .filter_map(|&id| data.train.item(id).cloned())
                .collect();
            trainer.predict_probs(&candidates, &data.spec)
        } else {
            Vec::new()
        };

        let selection = sampler.select(&candidate_ids, &posteriors, per_round, &mut rng)?;
        if selection.is_empty() {
            warn!(
                "Strategy selected no samples in round {}; stopping early",
                round
            );
            break;
        }

        let absorb = pool.absorb(&selection, &data.train)?;
        if absorb.pseudo_added > 0 {
            if let Some(record) = log.rounds.last_mut() {
                record.pseudo = Some(PseudoRoundStats {
                    added: absorb.pseudo_added,
                    correct: absorb.pseudo_correct,
                    accuracy: absorb.pseudo_accuracy(),
                });
            }
        }
        info!(
            "Round {}: absorbed {} samples -> {:.1}% labeled",
            round,
            absorb.added,
            pool.labeled_ratio() * 100.0
        );

        sampler.next_round();
        round += 1;
    }

    let path = log.write(&config.output_dir)?;
    info!("Run log written to {:?}", path);

    Ok(log)
}
