//! Shared utilities: error types, logging, metrics.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Result, WeaksupError};
pub use logging::{init_logging, LogConfig, RoundLogger};
pub use metrics::{top_k_accuracy, ClassMetrics, ConfusionMatrix, Metrics, RunningAverage};
