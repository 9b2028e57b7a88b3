//! weaksup-lab CLI
//!
//! Thin entry point over the library: run a label-budget experiment,
//! pretrain an encoder with SimCLR, or print dataset statistics.

use std::path::PathBuf;

use anyhow::Result;
use burn::module::Module;
use burn::record::CompactRecorder;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use weaksup_lab::backend::{backend_name, default_device, TrainingBackend};
use weaksup_lab::dataset::BudgetSchedule;
use weaksup_lab::experiment::{
    load_dataset, run_experiment, DatasetConfig, DatasetKind, ExperimentConfig,
};
use weaksup_lab::strategy::{PseudoLabelConfig, StrategyConfig, UncertaintyMethod};
use weaksup_lab::training::contrastive::{pretrain, PretrainConfig};
use weaksup_lab::model::EncoderConfig;
use weaksup_lab::utils::logging::{init_logging, LogConfig};

/// Label-budget experiments: active learning, pseudo-labeling, SimCLR
#[derive(Parser, Debug)]
#[command(name = "weaksup_lab")]
#[command(version)]
#[command(about = "Compare data-efficient learning strategies under a label budget", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a label-budget experiment
    Run {
        /// JSON experiment config; flags below are ignored when set
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dataset: cifar10 or isic
        #[arg(short, long, default_value = "cifar10")]
        dataset: String,

        /// Local dataset directory
        #[arg(long, default_value = "data/cifar10")]
        data_dir: PathBuf,

        /// Strategy: random, least_confidence, margin, entropy, pseudo_label
        #[arg(short, long, default_value = "entropy")]
        strategy: String,

        /// Initial labeled fraction
        #[arg(long, default_value = "0.05")]
        initial_ratio: f64,

        /// Labeled fraction added per round
        #[arg(long, default_value = "0.05")]
        increment_ratio: f64,

        /// Labeled fraction at which the loop stops
        #[arg(long, default_value = "0.35")]
        stop_ratio: f64,

        /// Training epochs per round
        #[arg(short, long, default_value = "30")]
        epochs: usize,

        /// Batch size
        #[arg(short, long, default_value = "64")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Weight the loss by inverse log class frequency
        #[arg(long, default_value = "false")]
        weighted: bool,

        /// Enable train-time augmentation
        #[arg(long, default_value = "false")]
        augment: bool,

        /// Run SimCLR pretraining before the budget loop
        #[arg(long, default_value = "false")]
        pretrain: bool,

        /// Cap the training set (quick experiments)
        #[arg(long)]
        max_samples: Option<usize>,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Directory for run logs
        #[arg(short, long, default_value = "output/runs")]
        output_dir: PathBuf,
    },

    /// SimCLR-pretrain an encoder and save its weights
    Pretrain {
        /// Dataset: cifar10 or isic
        #[arg(short, long, default_value = "cifar10")]
        dataset: String,

        /// Local dataset directory
        #[arg(long, default_value = "data/cifar10")]
        data_dir: PathBuf,

        /// Pretraining epochs
        #[arg(short, long, default_value = "20")]
        epochs: usize,

        /// Contrastive batch size
        #[arg(short, long, default_value = "256")]
        batch_size: usize,

        /// Softmax temperature
        #[arg(short, long, default_value = "0.5")]
        temperature: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output path for the encoder weights
        #[arg(short, long, default_value = "output/encoder")]
        output: PathBuf,
    },

    /// Print dataset statistics
    Stats {
        /// Dataset: cifar10 or isic
        #[arg(short, long, default_value = "cifar10")]
        dataset: String,

        /// Local dataset directory
        #[arg(long, default_value = "data/cifar10")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    println!(
        "{} {}",
        "weaksup-lab".green().bold(),
        format!("(backend: {})", backend_name()).cyan()
    );

    match cli.command {
        Commands::Run {
            config,
            dataset,
            data_dir,
            strategy,
            initial_ratio,
            increment_ratio,
            stop_ratio,
            epochs,
            batch_size,
            learning_rate,
            weighted,
            augment,
            pretrain,
            max_samples,
            seed,
            output_dir,
        } => {
            let config = match config {
                Some(path) => ExperimentConfig::load(&path)?,
                None => {
                    let mut config = ExperimentConfig::new(
                        DatasetConfig {
                            kind: dataset.parse::<DatasetKind>()?,
                            data_dir,
                            image_size: None,
                            max_samples,
                        },
                        parse_strategy(&strategy)?,
                    );
                    config.budget = BudgetSchedule {
                        initial_ratio,
                        increment_ratio,
                        stop_ratio,
                    };
                    config.train.epochs = epochs;
                    config.train.batch_size = batch_size;
                    config.train.learning_rate = learning_rate;
                    config.train.weighted_loss = weighted;
                    config.train.augment = augment;
                    config.pretrain = pretrain.then(PretrainConfig::default);
                    config.seed = seed;
                    config.output_dir = output_dir;
                    config
                }
            };

            cmd_run(config)?;
        }

        Commands::Pretrain {
            dataset,
            data_dir,
            epochs,
            batch_size,
            temperature,
            seed,
            output,
        } => {
            cmd_pretrain(&dataset, data_dir, epochs, batch_size, temperature, seed, output)?;
        }

        Commands::Stats { dataset, data_dir } => {
            cmd_stats(&dataset, data_dir)?;
        }
    }

    Ok(())
}

fn parse_strategy(name: &str) -> Result<StrategyConfig> {
    let strategy = match name.to_lowercase().as_str() {
        "random" => StrategyConfig::Random,
        "least_confidence" => StrategyConfig::Uncertainty {
            method: UncertaintyMethod::LeastConfidence,
        },
        "margin" => StrategyConfig::Uncertainty {
            method: UncertaintyMethod::Margin,
        },
        "entropy" => StrategyConfig::Uncertainty {
            method: UncertaintyMethod::Entropy,
        },
        "pseudo_label" => StrategyConfig::PseudoLabel(PseudoLabelConfig::default()),
        other => anyhow::bail!("unknown strategy '{}'", other),
    };
    Ok(strategy)
}

fn cmd_run(config: ExperimentConfig) -> Result<()> {
    println!("{}", "Experiment Configuration:".cyan().bold());
    println!("  Run:        {}", config.run_name());
    println!(
        "  Budget:     {:.0}% + {:.0}%/round, stop at {:.0}%",
        config.budget.initial_ratio * 100.0,
        config.budget.increment_ratio * 100.0,
        config.budget.stop_ratio * 100.0
    );
    println!("  Pretrain:   {}", config.pretrain.is_some());
    println!("  Seed:       {}", config.seed);
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let data = load_dataset(&config.dataset, &mut rng)?;
    let device = default_device();

    let log = run_experiment::<TrainingBackend>(&config, &data, &device)?;

    println!();
    println!("{}", "Results per labeled ratio:".green().bold());
    for record in &log.rounds {
        println!(
            "  {:>5.1}%: top-1 {:.2}%  top-5 {:.2}%  F1 {:.2}%{}",
            record.labeled_ratio * 100.0,
            record.metrics.top1 * 100.0,
            record.metrics.top5 * 100.0,
            record.metrics.macro_f1 * 100.0,
            match &record.pseudo {
                Some(p) => format!(
                    "  (pseudo: {} added, {:.0}% correct)",
                    p.added,
                    p.accuracy.unwrap_or(0.0) * 100.0
                ),
                None => String::new(),
            }
        );
    }

    Ok(())
}

fn cmd_pretrain(
    dataset: &str,
    data_dir: PathBuf,
    epochs: usize,
    batch_size: usize,
    temperature: f64,
    seed: u64,
    output: PathBuf,
) -> Result<()> {
    let dataset_config = DatasetConfig {
        kind: dataset.parse::<DatasetKind>()?,
        data_dir,
        image_size: None,
        max_samples: None,
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data = load_dataset(&dataset_config, &mut rng)?;
    let device = default_device();

    let config = PretrainConfig {
        epochs,
        batch_size,
        temperature,
        ..Default::default()
    };

    info!("Pretraining on {} images", data.train.len());
    let (encoder, losses) = pretrain::<TrainingBackend>(
        &data.train,
        &data.spec,
        &EncoderConfig::new(),
        &config,
        &device,
        &mut rng,
    )?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    encoder
        .save_file(output.clone(), &CompactRecorder::new())
        .map_err(|e| anyhow::anyhow!("failed to save encoder: {:?}", e))?;

    println!();
    println!("{}", "Pretraining complete".green().bold());
    println!("  Final NT-Xent loss: {:.4}", losses.last().unwrap_or(&0.0));
    println!("  Encoder saved to:   {:?}", output);

    Ok(())
}

fn cmd_stats(dataset: &str, data_dir: PathBuf) -> Result<()> {
    let dataset_config = DatasetConfig {
        kind: dataset.parse::<DatasetKind>()?,
        data_dir,
        image_size: None,
        max_samples: None,
    };

    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let data = load_dataset(&dataset_config, &mut rng)?;

    println!("{}", "Dataset Statistics:".cyan().bold());
    println!("  Name:          {}", data.spec.name);
    println!("  Train samples: {}", data.train.len());
    println!("  Test samples:  {}", data.test.len());
    println!("  Classes:       {}", data.spec.num_classes);
    println!("  Image size:    {}px", data.spec.image_size);
    println!();

    let counts = data.train.class_counts(data.spec.num_classes);
    let total = data.train.len().max(1);
    println!("{}", "Class distribution (train):".cyan().bold());
    for (idx, count) in counts.iter().enumerate() {
        let name = data
            .spec
            .class_names
            .get(idx)
            .map(|s| s.as_str())
            .unwrap_or("?");
        println!(
            "  {:3}. {:30} {:>6} ({:>5.1}%)",
            idx,
            name,
            count,
            100.0 * *count as f64 / total as f64
        );
    }

    Ok(())
}
