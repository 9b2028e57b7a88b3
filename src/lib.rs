//! # weaksup-lab
//!
//! An experiment harness for comparing data-efficient learning strategies
//! on image classification, built on the Burn framework:
//!
//! - **Active learning**: uncertainty-based sample selection
//!   (least-confidence, margin, entropy) with oracle labels
//! - **Semi-supervised learning**: confidence-thresholded pseudo-labeling
//! - **Self-supervised pretraining**: SimCLR with the NT-Xent loss
//!
//! The core of the crate is the iterative *label-budget loop*: each round a
//! strategy picks samples from the unlabeled pool, the picks are merged
//! into the labeled pool (with oracle or pseudo labels), the model is
//! retrained from scratch, and test metrics are recorded per labeled-data
//! ratio.
//!
//! ## Modules
//!
//! - `dataset`: CIFAR-10/ISIC loaders, batchers, the label pool, augmentation
//! - `model`: compact CNN encoder, classifier, SimCLR projection head
//! - `strategy`: pluggable selection strategies
//! - `training`: supervised loop, LR schedules, contrastive pretraining
//! - `experiment`: configuration, the budget loop, JSON run logs
//! - `utils`: errors, logging, metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use weaksup_lab::backend::TrainingBackend;
//! use weaksup_lab::experiment::{load_dataset, run_experiment, ExperimentConfig};
//!
//! let config = ExperimentConfig::load("configs/cifar10_entropy.json".as_ref())?;
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(config.seed);
//! let data = load_dataset(&config.dataset, &mut rng)?;
//! let log = run_experiment::<TrainingBackend>(&config, &data, &Default::default())?;
//! println!("final top-1: {:?}", log.final_top1());
//! ```

pub mod backend;
pub mod dataset;
pub mod experiment;
pub mod model;
pub mod strategy;
pub mod training;
pub mod utils;

pub use dataset::{BudgetSchedule, DatasetSpec, ImageStore, LabelPool, TrainItem};
pub use experiment::{run_experiment, ExperimentConfig, ExperimentLog};
pub use model::{Classifier, ClassifierConfig, Encoder, EncoderConfig, SimClrModel};
pub use strategy::{
    PseudoLabelConfig, PseudoLabeler, Sampler, Selection, StrategyConfig, UncertaintyMethod,
};
pub use training::{NtXentLoss, PretrainConfig, TrainConfig, Trainer};
pub use utils::error::{Result, WeaksupError};
pub use utils::metrics::{ConfusionMatrix, Metrics};

/// Default confidence threshold for pseudo-labeling
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.9;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
