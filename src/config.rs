//! Declarative run configuration.
//!
//! A run is described by a YAML file deserialized into [`Config`]. Every
//! field has a default so a minimal file (or none at all, for tests) is
//! enough to get going; [`Config::validate`] rejects values the training
//! loop cannot work with.

use crate::error::{Error, Result};
use crate::uncertainty::Uncertainty;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Compute device identifier.
///
/// Parsed from strings like `cpu`, `cuda` or `cuda:1`. The identifier is
/// recorded with the run; tensor math itself executes on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(u32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(index) => write!(f, "cuda:{index}"),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "cpu" {
            return Ok(Self::Cpu);
        }
        if s == "cuda" {
            return Ok(Self::Cuda(0));
        }
        if let Some(index) = s.strip_prefix("cuda:") {
            let index = index.parse::<u32>().map_err(|_| Error::Config {
                field: "device".into(),
                message: format!("invalid device ordinal in '{s}'"),
            })?;
            return Ok(Self::Cuda(index));
        }
        Err(Error::Config {
            field: "device".into(),
            message: format!("unknown device '{s}' (expected cpu, cuda, or cuda:<n>)"),
        })
    }
}

impl TryFrom<String> for Device {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

/// Optimizer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimKind {
    #[default]
    Sgd,
    Adam,
}

/// Optimizer hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimSpec {
    #[serde(default)]
    pub kind: OptimKind,

    /// Learning rate.
    #[serde(default = "default_lr")]
    pub lr: f32,

    /// SGD momentum factor (0 disables momentum).
    #[serde(default = "default_momentum")]
    pub momentum: f32,

    /// Adam first-moment decay.
    #[serde(default = "default_beta1")]
    pub beta1: f32,

    /// Adam second-moment decay.
    #[serde(default = "default_beta2")]
    pub beta2: f32,

    /// Adam numerical stability term.
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
}

impl Default for OptimSpec {
    fn default() -> Self {
        Self {
            kind: OptimKind::default(),
            lr: default_lr(),
            momentum: default_momentum(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
        }
    }
}

/// Where batch files live. Both splits are optional; the CLI falls back to
/// synthetic data when asked to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<PathBuf>,
}

/// Immutable settings bundle for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How the model represents predictive uncertainty.
    #[serde(default)]
    pub uncertainty: Uncertainty,

    /// Whether to record summary events (scalars and image batches).
    #[serde(default)]
    pub tensorboard: bool,

    /// Train up to this many completed epochs.
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Resume from the checkpoint directory instead of starting fresh.
    #[serde(default)]
    pub is_resume: bool,

    /// Training run (true) or evaluation-only run (false).
    #[serde(default = "default_true")]
    pub is_train: bool,

    /// Compute device identifier.
    #[serde(default)]
    pub device: Device,

    /// Image channel count the model is built for.
    #[serde(default = "default_channels")]
    pub channels: usize,

    #[serde(default)]
    pub optimizer: OptimSpec,

    #[serde(default)]
    pub data: DataSpec,

    /// Checkpoint directory for this run.
    #[serde(default = "default_ckpt_dir")]
    pub ckpt_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uncertainty: Uncertainty::default(),
            tensorboard: false,
            epochs: default_epochs(),
            is_resume: false,
            is_train: true,
            device: Device::default(),
            channels: default_channels(),
            optimizer: OptimSpec::default(),
            data: DataSpec::default(),
            ckpt_dir: default_ckpt_dir(),
        }
    }
}

impl Config {
    /// Load and validate a configuration from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config {}", path.display()), e))?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|source| Error::ConfigParsing {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the training loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::Config {
                field: "epochs".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.channels == 0 {
            return Err(Error::Config {
                field: "channels".into(),
                message: "must be at least 1".into(),
            });
        }
        if !self.optimizer.lr.is_finite() || self.optimizer.lr <= 0.0 {
            return Err(Error::Config {
                field: "optimizer.lr".into(),
                message: format!("must be positive, got {}", self.optimizer.lr),
            });
        }
        if !(0.0..1.0).contains(&self.optimizer.momentum) {
            return Err(Error::Config {
                field: "optimizer.momentum".into(),
                message: format!("must be in [0, 1), got {}", self.optimizer.momentum),
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_epochs() -> usize {
    100
}

fn default_channels() -> usize {
    3
}

fn default_lr() -> f32 {
    1e-3
}

fn default_momentum() -> f32 {
    0.9
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

fn default_ckpt_dir() -> PathBuf {
    PathBuf::from("runs/default")
}
