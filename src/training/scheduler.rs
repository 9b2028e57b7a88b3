//! Learning rate schedules
//!
//! Epoch-level schedules applied on top of a base learning rate. The
//! default mirrors the harness's classic step decay (factor 0.2 every 50
//! epochs).

use serde::{Deserialize, Serialize};

/// Learning rate schedule variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LrSchedule {
    /// No scheduling
    Constant,

    /// Multiply by `gamma` every `step_epochs` epochs
    StepDecay { step_epochs: usize, gamma: f64 },

    /// lr = base_lr * decay_rate^epoch
    Exponential { decay_rate: f64 },

    /// Smooth decay from base_lr to `min_lr` over the full run
    CosineAnnealing { min_lr: f64 },

    /// Linear warmup for `warmup_epochs`, then cosine decay to `min_lr`
    WarmupCosine { warmup_epochs: usize, min_lr: f64 },
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self::StepDecay {
            step_epochs: 50,
            gamma: 0.2,
        }
    }
}

impl LrSchedule {
    /// Learning rate for `epoch` out of `total_epochs` at the given base rate
    pub fn lr_at(&self, epoch: usize, total_epochs: usize, base_lr: f64) -> f64 {
        match *self {
            LrSchedule::Constant => base_lr,

            LrSchedule::StepDecay { step_epochs, gamma } => {
                let num_decays = if step_epochs > 0 {
                    epoch / step_epochs
                } else {
                    0
                };
                base_lr * gamma.powi(num_decays as i32)
            }

            LrSchedule::Exponential { decay_rate } => base_lr * decay_rate.powi(epoch as i32),

            LrSchedule::CosineAnnealing { min_lr } => {
                cosine(epoch, total_epochs, base_lr, min_lr)
            }

            LrSchedule::WarmupCosine {
                warmup_epochs,
                min_lr,
            } => {
                if epoch < warmup_epochs {
                    base_lr * (epoch as f64 + 1.0) / warmup_epochs as f64
                } else {
                    cosine(
                        epoch - warmup_epochs,
                        total_epochs.saturating_sub(warmup_epochs),
                        base_lr,
                        min_lr,
                    )
                }
            }
        }
    }
}

fn cosine(epoch: usize, total_epochs: usize, base_lr: f64, min_lr: f64) -> f64 {
    if total_epochs == 0 {
        return min_lr;
    }
    let progress = epoch as f64 / total_epochs as f64;
    let factor = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
    min_lr + (base_lr - min_lr) * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let schedule = LrSchedule::Constant;
        assert_eq!(schedule.lr_at(0, 100, 0.001), 0.001);
        assert_eq!(schedule.lr_at(99, 100, 0.001), 0.001);
    }

    #[test]
    fn test_step_decay_default() {
        let schedule = LrSchedule::default();

        assert!((schedule.lr_at(0, 200, 0.001) - 0.001).abs() < 1e-12);
        assert!((schedule.lr_at(49, 200, 0.001) - 0.001).abs() < 1e-12);
        assert!((schedule.lr_at(50, 200, 0.001) - 0.0002).abs() < 1e-12);
        assert!((schedule.lr_at(100, 200, 0.001) - 0.00004).abs() < 1e-12);
    }

    #[test]
    fn test_exponential() {
        let schedule = LrSchedule::Exponential { decay_rate: 0.5 };
        assert!((schedule.lr_at(0, 10, 0.1) - 0.1).abs() < 1e-12);
        assert!((schedule.lr_at(2, 10, 0.1) - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_endpoints() {
        let schedule = LrSchedule::CosineAnnealing { min_lr: 0.0001 };

        let start = schedule.lr_at(0, 100, 0.01);
        let mid = schedule.lr_at(50, 100, 0.01);
        let end = schedule.lr_at(100, 100, 0.01);

        assert!((start - 0.01).abs() < 1e-9);
        assert!((mid - (0.01 + 0.0001) / 2.0).abs() < 1e-6);
        assert!((end - 0.0001).abs() < 1e-9);
    }

    #[test]
    fn test_warmup_ramps_then_decays() {
        let schedule = LrSchedule::WarmupCosine {
            warmup_epochs: 5,
            min_lr: 1e-5,
        };

        let lr0 = schedule.lr_at(0, 50, 0.01);
        let lr4 = schedule.lr_at(4, 50, 0.01);
        let lr5 = schedule.lr_at(5, 50, 0.01);
        let lr49 = schedule.lr_at(49, 50, 0.01);

        assert!((lr0 - 0.002).abs() < 1e-9);
        assert!((lr4 - 0.01).abs() < 1e-9);
        assert!(lr5 <= 0.01);
        assert!(lr49 < lr5);
    }

    #[test]
    fn test_serde_round_trip() {
        let schedule = LrSchedule::WarmupCosine {
            warmup_epochs: 3,
            min_lr: 1e-6,
        };
        let json = serde_json::to_string(&schedule).unwrap();
        let back: LrSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schedule);
    }
}
