//! Run log records
//!
//! Each experiment writes a single JSON record tracking the metrics at
//! every labeled-data ratio, so different strategies can be compared
//! round-for-round. Aggregation across runs happens outside this crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::experiment::config::ExperimentConfig;
use crate::utils::error::Result;
use crate::utils::metrics::Metrics;

/// Headline metrics kept per round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundMetrics {
    pub top1: f64,
    pub top5: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub loss: Option<f64>,
}

impl From<&Metrics> for RoundMetrics {
    fn from(metrics: &Metrics) -> Self {
        Self {
            top1: metrics.accuracy,
            top5: metrics.top5_accuracy,
            macro_precision: metrics.macro_precision,
            macro_recall: metrics.macro_recall,
            macro_f1: metrics.macro_f1,
            loss: metrics.loss,
        }
    }
}

/// Pseudo-labeling outcome of one absorb step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudoRoundStats {
    /// Pseudo-labels absorbed this round
    pub added: usize,
    /// Of those, how many matched the hidden ground truth
    pub correct: usize,
    /// correct / added
    pub accuracy: Option<f64>,
}

/// One round of the budget loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Round index, starting at 0
    pub round: usize,

    /// Labeled samples when this round's model was trained
    pub labeled_count: usize,

    /// Labeled fraction of the training set
    pub labeled_ratio: f64,

    /// Test-set metrics of this round's model
    pub metrics: RoundMetrics,

    /// Epochs the round actually trained (early stopping may trim)
    pub epochs_run: usize,

    /// Best validation accuracy during the round
    pub best_val_accuracy: f64,

    /// Pseudo-label accounting for the absorb step that followed, if any
    pub pseudo: Option<PseudoRoundStats>,
}

/// Complete record of one experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentLog {
    /// Run name (`{dataset}@{strategy}` unless overridden)
    pub name: String,

    /// Dataset identifier
    pub dataset: String,

    /// Strategy identifier
    pub strategy: String,

    /// Master seed
    pub seed: u64,

    /// Wall-clock start, RFC 3339
    pub started_at: String,

    /// Average NT-Xent loss per pretraining epoch, when pretraining ran
    pub pretrain_losses: Option<Vec<f64>>,

    /// Per-round records in order
    pub rounds: Vec<RoundRecord>,

    /// The full config, for reproducibility
    pub config: ExperimentConfig,
}

impl ExperimentLog {
    pub fn new(config: &ExperimentConfig) -> Self {
        Self {
            name: config.run_name(),
            dataset: config.dataset.kind.id().to_string(),
            strategy: config.strategy.id(),
            seed: config.seed,
            started_at: chrono::Local::now().to_rfc3339(),
            pretrain_losses: None,
            rounds: Vec::new(),
            config: config.clone(),
        }
    }

    /// Log filename: `{date}-{name}-seed{seed}.json`
    pub fn filename(&self) -> String {
        let date = chrono::Local::now().format("%d.%m.%Y");
        format!("{}-{}-seed{}.json", date, self.name, self.seed)
    }

    /// Write the record as pretty JSON into `output_dir`, returning the path
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(self.filename());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Final top-1 accuracy, if any round completed
    pub fn final_top1(&self) -> Option<f64> {
        self.rounds.last().map(|r| r.metrics.top1)
    }
}
