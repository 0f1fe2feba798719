//! Training and evaluation loop for uncertainty-aware image regression.
//!
//! An [`Operator`] drives the whole run: epochs over training batches
//! (forward, reconstruction loss against the input, backward, optimizer
//! step), per-epoch checkpointing, a PSNR evaluation pass, and optional
//! summary logging — around pluggable model / criterion / optimizer
//! collaborators selected by a YAML [`Config`].
//!
//! # Example
//!
//! ```no_run
//! use incierto::{Checkpoint, Config, DataLoaders, Device, InMemoryLoader, Operator};
//!
//! # fn main() -> incierto::Result<()> {
//! let config = Config::default();
//! let ckpt = Checkpoint::new("runs/demo")?;
//! let loaders = DataLoaders::new(
//!     Box::new(InMemoryLoader::new(vec![])),
//!     Box::new(InMemoryLoader::new(vec![])),
//! );
//!
//! let mut operator = Operator::new(config, ckpt, Device::Cpu)?;
//! operator.train(&loaders)?;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod operator;
pub mod optim;
pub mod progress;
pub mod summary;
pub mod uncertainty;

pub use checkpoint::Checkpoint;
pub use config::{Config, DataSpec, Device, OptimKind, OptimSpec};
pub use data::{BatchLoader, DataLoaders, ImageBatch, InMemoryLoader};
pub use error::{Error, Result};
pub use loss::{Criterion, GaussianNllLoss, LossOutput, MseLoss};
pub use metrics::{calc_psnr, sigmoid, RunningMean};
pub use model::{AffineModel, Mode, Model, Param, Prediction, PredictionGrad};
pub use operator::Operator;
pub use optim::{Adam, Optimizer, Sgd};
pub use progress::TrainProgress;
pub use summary::{InMemorySink, JsonlSummaryWriter, SummaryEvent, SummarySink};
pub use uncertainty::Uncertainty;
