//! Experiment configuration
//!
//! One config fully describes a run: which dataset, which selection
//! strategy, the budget schedule, training hyperparameters, and the
//! optional contrastive pretraining stage. Configs round-trip through
//! JSON so runs are repeatable from their log records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::BudgetSchedule;
use crate::strategy::StrategyConfig;
use crate::training::contrastive::PretrainConfig;
use crate::training::trainer::TrainConfig;
use crate::utils::error::{Result, WeaksupError};

/// Which dataset to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// CIFAR-10 binary batches
    Cifar10,
    /// ISIC-style directory-per-class image tree
    Isic,
}

impl DatasetKind {
    pub fn id(&self) -> &'static str {
        match self {
            DatasetKind::Cifar10 => "cifar10",
            DatasetKind::Isic => "isic",
        }
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = WeaksupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cifar10" | "cifar-10" => Ok(DatasetKind::Cifar10),
            "isic" => Ok(DatasetKind::Isic),
            other => Err(WeaksupError::Config(format!("unknown dataset '{}'", other))),
        }
    }
}

/// Dataset loading options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset family
    pub kind: DatasetKind,

    /// Local data directory
    pub data_dir: PathBuf,

    /// Override the default input size (ISIC only; CIFAR-10 is fixed at 32)
    pub image_size: Option<usize>,

    /// Cap the training set at a seeded random subset (quick experiments)
    pub max_samples: Option<usize>,
}

/// Full description of one experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Human-readable experiment name; defaults to `{dataset}@{strategy}`
    pub name: Option<String>,

    /// Dataset to run on
    pub dataset: DatasetConfig,

    /// Selection strategy for the budget loop
    pub strategy: StrategyConfig,

    /// Label-budget schedule
    pub budget: BudgetSchedule,

    /// Per-round training hyperparameters
    pub train: TrainConfig,

    /// Optional SimCLR pretraining stage before the budget loop
    pub pretrain: Option<PretrainConfig>,

    /// Classes excluded from the initial labeled pool (novel-class scenario)
    pub remove_classes: Vec<usize>,

    /// Draw the initial labeled pool proportionally from every class
    pub stratified_seed: bool,

    /// Encoder width (base filters; doubles per block)
    pub base_filters: usize,

    /// Directory for run logs
    pub output_dir: PathBuf,

    /// Master random seed
    pub seed: u64,
}

impl ExperimentConfig {
    /// A reasonable starting point for the given dataset and strategy
    pub fn new(dataset: DatasetConfig, strategy: StrategyConfig) -> Self {
        Self {
            name: None,
            dataset,
            strategy,
            budget: BudgetSchedule::default(),
            train: TrainConfig::default(),
            pretrain: None,
            remove_classes: Vec::new(),
            stratified_seed: true,
            base_filters: 32,
            output_dir: PathBuf::from("output/runs"),
            seed: 42,
        }
    }

    /// Run identifier used in logs and filenames: `{dataset}@{strategy}`
    pub fn run_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}@{}", self.dataset.kind.id(), self.strategy.id()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.budget.validate()?;

        if self.train.epochs == 0 {
            return Err(WeaksupError::Config("train.epochs must be positive".to_string()));
        }
        if self.train.batch_size == 0 {
            return Err(WeaksupError::Config(
                "train.batch_size must be positive".to_string(),
            ));
        }
        if self.base_filters == 0 {
            return Err(WeaksupError::Config("base_filters must be positive".to_string()));
        }
        if let Some(pretrain) = &self.pretrain {
            if pretrain.batch_size < 2 {
                return Err(WeaksupError::Config(
                    "pretrain.batch_size must be at least 2".to_string(),
                ));
            }
        }
        if let Some(size) = self.dataset.image_size {
            if size == 0 || size % 8 != 0 {
                return Err(WeaksupError::Config(
                    "dataset.image_size must be a positive multiple of 8".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Load a config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
