//! Logging Module
//!
//! Structured logging utilities built on the `tracing` crate.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Create a verbose logging config for debugging
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            ansi_colors: true,
        }
    }

    /// Create a quiet logging config (errors only)
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            include_target: false,
            ansi_colors: true,
        }
    }
}

/// Initialize logging with the given configuration
///
/// Returns an error message if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Per-round progress logger for the label-budget loop
pub struct RoundLogger {
    started: std::time::Instant,
    round_started: std::time::Instant,
}

impl RoundLogger {
    pub fn new() -> Self {
        let now = std::time::Instant::now();
        Self {
            started: now,
            round_started: now,
        }
    }

    /// Log the start of a budget round
    pub fn start_round(&mut self, round: usize, labeled: usize, ratio: f64) {
        self.round_started = std::time::Instant::now();
        tracing::info!(
            "Round {} started | labeled: {} ({:.1}%)",
            round,
            labeled,
            ratio * 100.0
        );
    }

    /// Log the end of a budget round with its headline metrics
    pub fn end_round(&self, round: usize, top1: f64, top5: f64) {
        tracing::info!(
            "Round {} done in {:.1}s | top-1: {:.2}% | top-5: {:.2}% | elapsed: {:.0}s",
            round,
            self.round_started.elapsed().as_secs_f64(),
            top1 * 100.0,
            top5 * 100.0,
            self.started.elapsed().as_secs_f64()
        );
    }

    /// Log an epoch summary within the current round
    pub fn epoch(&self, epoch: usize, total: usize, loss: f64, val_acc: f64, lr: f64) {
        tracing::debug!(
            "  epoch {}/{} | loss: {:.4} | val acc: {:.2}% | lr: {:.6}",
            epoch + 1,
            total,
            loss,
            val_acc * 100.0,
            lr
        );
    }
}

impl Default for RoundLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.include_target);
    }

    #[test]
    fn test_verbose_config() {
        let config = LogConfig::verbose();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_target);
    }
}
