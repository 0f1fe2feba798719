//! CLI command handlers for the incierto binary.

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::data::{BatchLoader, DataLoaders, ImageBatch, InMemoryLoader};
use crate::error::{Error, Result};
use crate::operator::Operator;
use clap::{Parser, Subcommand};
use ndarray::Array4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "incierto",
    version,
    about = "Uncertainty-aware image regression training"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Train from a YAML config, resuming when asked to
    Train {
        /// Path to the YAML configuration
        config: PathBuf,

        /// Override the configured epoch count
        #[arg(long)]
        epochs: Option<usize>,

        /// Resume from the checkpoint directory
        #[arg(long)]
        resume: bool,

        /// Use synthetic noisy images instead of configured batch files
        #[arg(long)]
        synth: bool,
    },
    /// Evaluate the last checkpoint on the test split
    Test {
        /// Path to the YAML configuration
        config: PathBuf,

        /// Use synthetic noisy images instead of configured batch files
        #[arg(long)]
        synth: bool,
    },
}

pub fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Train {
            config,
            epochs,
            resume,
            synth,
        } => {
            let mut config = Config::from_yaml(&config)?;
            if let Some(epochs) = epochs {
                config.epochs = epochs;
            }
            if resume {
                config.is_resume = true;
            }
            config.is_train = true;

            let loaders = build_loaders(&config, synth)?;
            let ckpt = Checkpoint::new(&config.ckpt_dir)?;
            let device = config.device;
            let mut operator = Operator::new(config, ckpt, device)?;
            operator.train(&loaders)
        }
        Command::Test { config, synth } => {
            let mut config = Config::from_yaml(&config)?;
            config.is_train = false;

            let loaders = build_loaders(&config, synth)?;
            let ckpt = Checkpoint::new(&config.ckpt_dir)?;
            let device = config.device;
            let mut operator = Operator::new(config, ckpt, device)?;
            let average = operator.test(&loaders)?;
            println!("Average PSNR: {average:.5} dB");
            Ok(())
        }
    }
}

fn build_loaders(config: &Config, synth: bool) -> Result<DataLoaders> {
    if synth {
        return synthetic_loaders(config);
    }
    let train = json_loader(config.data.train.as_deref(), "data.train")?;
    let test = json_loader(config.data.test.as_deref(), "data.test")?;
    Ok(DataLoaders::new(train, test))
}

fn json_loader(path: Option<&Path>, field: &str) -> Result<Box<dyn BatchLoader>> {
    let path = path.ok_or_else(|| Error::Config {
        field: field.into(),
        message: "no batch file configured; set it or pass --synth".into(),
    })?;
    Ok(Box::new(InMemoryLoader::from_json(path)?))
}

/// Deterministic noisy-ramp batches for smoke runs without a dataset.
fn synthetic_loaders(config: &Config) -> Result<DataLoaders> {
    let mut rng = StdRng::seed_from_u64(17);
    let train = synthetic_batches(&mut rng, config.channels, 8)?;
    let test = synthetic_batches(&mut rng, config.channels, 2)?;
    Ok(DataLoaders::new(
        Box::new(InMemoryLoader::new(train)),
        Box::new(InMemoryLoader::new(test)),
    ))
}

fn synthetic_batches(
    rng: &mut StdRng,
    channels: usize,
    count: usize,
) -> Result<Vec<ImageBatch>> {
    (0..count)
        .map(|_| {
            let clean = Array4::from_shape_fn((4, channels, 8, 8), |(_, _, h, w)| {
                (h + w) as f32 / 14.0
            });
            let input = clean.mapv(|v| (v + rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0));
            ImageBatch::new(input, clean)
        })
        .collect()
}
