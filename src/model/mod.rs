//! Model collaborator contract and the built-in baseline.
//!
//! A model maps an input batch to a [`Prediction`] (a predicted mean and,
//! for variance-capable uncertainty modes, a log-variance head). Gradients
//! flow back through [`Model::backward`], which accumulates into the
//! model's [`Param`] cells; the optimizer then borrows those cells through
//! [`Model::params_mut`].

mod affine;

pub use affine::AffineModel;

use crate::checkpoint::Checkpoint;
use crate::config::{Config, Device};
use crate::error::{Error, Result};
use ndarray::{Array1, Array4};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Train/eval switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

/// A flat model parameter with its gradient slot.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub data: Array1<f32>,
    pub grad: Option<Array1<f32>>,
}

impl Param {
    pub fn new(name: impl Into<String>, data: Array1<f32>) -> Self {
        Self {
            name: name.into(),
            data,
            grad: None,
        }
    }

    /// Drop any accumulated gradient.
    pub fn zero_grad(&mut self) {
        self.grad = None;
    }

    /// Add `grad` into the gradient slot, initializing it if empty.
    pub fn accumulate_grad(&mut self, grad: &Array1<f32>) {
        match &mut self.grad {
            Some(existing) => *existing += grad,
            None => self.grad = Some(grad.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Named model outputs for one batch.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Predicted mean image, same shape as the input.
    pub mean: Array4<f32>,
    /// Predicted log-variance, present iff the uncertainty mode has a
    /// variance head.
    pub var: Option<Array4<f32>>,
}

/// Gradients of the loss with respect to the model outputs.
#[derive(Debug, Clone)]
pub struct PredictionGrad {
    pub mean: Array4<f32>,
    pub var: Option<Array4<f32>>,
}

/// Model collaborator contract.
pub trait Model {
    /// Forward pass. Caches whatever the backward pass needs.
    fn forward(&mut self, input: &Array4<f32>) -> Result<Prediction>;

    /// Accumulate parameter gradients from output gradients.
    ///
    /// Consumes the activation cached by the preceding [`Model::forward`];
    /// calling it twice without a forward in between is an error.
    fn backward(&mut self, grad: &PredictionGrad) -> Result<()>;

    fn params(&self) -> Vec<&Param>;

    fn params_mut(&mut self) -> Vec<&mut Param>;

    fn set_mode(&mut self, mode: Mode);

    fn mode(&self) -> Mode;

    /// Restore parameters from the checkpoint's model state.
    fn load(&mut self, ckpt: &Checkpoint) -> Result<()>;

    /// Persist parameters: the latest state plus a per-epoch copy.
    fn save(&self, ckpt: &Checkpoint, epoch: usize) -> Result<()>;

    fn name(&self) -> &'static str {
        "model"
    }
}

/// Serializable snapshot of one parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamState {
    pub name: String,
    pub data: Vec<f32>,
}

/// Snapshot every parameter for persistence.
pub(crate) fn params_to_state(params: &[&Param]) -> Vec<ParamState> {
    params
        .iter()
        .map(|p| ParamState {
            name: p.name.clone(),
            data: p.data.to_vec(),
        })
        .collect()
}

/// Restore parameters by name from a persisted snapshot.
///
/// A missing name means the state belongs to a differently-shaped model; a
/// length mismatch is a shape error. Gradients are cleared on restore.
pub(crate) fn restore_params(
    params: Vec<&mut Param>,
    state: &[ParamState],
    path: &Path,
) -> Result<()> {
    for param in params {
        let found = state
            .iter()
            .find(|s| s.name == param.name)
            .ok_or_else(|| Error::IncompatibleState {
                collaborator: "model",
                path: path.to_path_buf(),
                message: format!("missing parameter '{}'", param.name),
            })?;
        if found.data.len() != param.data.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![param.data.len()],
                actual: vec![found.data.len()],
            });
        }
        param.data = Array1::from_vec(found.data.clone());
        param.grad = None;
    }
    Ok(())
}

/// Construct the model selected by the configuration.
pub fn from_config(config: &Config, device: Device) -> Result<Box<dyn Model>> {
    Ok(Box::new(AffineModel::new(
        config.channels,
        config.uncertainty,
        device,
    )?))
}
