//! Training module: supervised loop, schedules, contrastive pretraining.

pub mod contrastive;
pub mod scheduler;
pub mod trainer;

pub use contrastive::{pretrain, NtXentLoss, PretrainConfig};
pub use scheduler::LrSchedule;
pub use trainer::{FitReport, TrainConfig, Trainer};

/// Default number of training epochs per round
pub const DEFAULT_EPOCHS: usize = 30;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
