//! Experiment orchestration: configuration, the budget loop, run logs.

pub mod config;
pub mod log;
pub mod runner;

pub use config::{DatasetConfig, DatasetKind, ExperimentConfig};
pub use log::{ExperimentLog, RoundMetrics, RoundRecord};
pub use runner::{load_dataset, run_experiment, ExperimentData};
