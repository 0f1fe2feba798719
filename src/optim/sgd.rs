//! Stochastic gradient descent with optional momentum.

use super::Optimizer;
use crate::checkpoint::{self, Checkpoint};
use crate::error::{Error, Result};
use crate::model::Param;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

pub struct Sgd {
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

impl Sgd {
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocities: Vec::new(),
        }
    }

    fn ensure_velocities(&mut self, count: usize) {
        if self.velocities.len() != count {
            self.velocities = (0..count).map(|_| None).collect();
        }
    }
}

/// Serialized optimizer state; velocity buffers travel with the run.
#[derive(Debug, Serialize, Deserialize)]
struct SgdState {
    optimizer: String,
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<Vec<f32>>>,
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [&mut Param]) {
        self.ensure_velocities(params.len());

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad.as_ref() else {
                continue;
            };
            if self.momentum > 0.0 {
                // v = momentum * v - lr * grad
                let velocity = match self.velocities[i].take() {
                    Some(v) => v * self.momentum - grad * self.lr,
                    None => grad * (-self.lr),
                };
                param.data = &param.data + &velocity;
                self.velocities[i] = Some(velocity);
            } else {
                param.data = &param.data - &(grad * self.lr);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn load(&mut self, ckpt: &Checkpoint) -> Result<()> {
        let path = ckpt.optimizer_path();
        if !path.exists() {
            return Err(Error::CheckpointNotFound { path });
        }
        let state: SgdState = checkpoint::read_json(&path)?;
        if state.optimizer != self.name() {
            return Err(Error::IncompatibleState {
                collaborator: "optimizer",
                path,
                message: format!(
                    "state written by '{}', this run uses '{}'",
                    state.optimizer,
                    self.name()
                ),
            });
        }
        self.lr = state.lr;
        self.momentum = state.momentum;
        self.velocities = state
            .velocities
            .into_iter()
            .map(|v| v.map(Array1::from_vec))
            .collect();
        Ok(())
    }

    fn save(&self, ckpt: &Checkpoint) -> Result<()> {
        let state = SgdState {
            optimizer: self.name().to_string(),
            lr: self.lr,
            momentum: self.momentum,
            velocities: self
                .velocities
                .iter()
                .map(|v| v.as_ref().map(|a| a.to_vec()))
                .collect(),
        };
        checkpoint::write_json(&ckpt.optimizer_path(), &state)
    }

    fn name(&self) -> &'static str {
        "sgd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use tempfile::tempdir;

    fn param_with_grad(data: &[f32], grad: &[f32]) -> Param {
        let mut p = Param::new("p", arr1(data));
        p.grad = Some(arr1(grad));
        p
    }

    #[test]
    fn test_plain_update() {
        let mut opt = Sgd::new(0.1, 0.0);
        let mut p = param_with_grad(&[1.0, 2.0], &[0.5, 1.0]);
        opt.step(&mut [&mut p]);
        assert_relative_eq!(p.data[0], 0.95);
        assert_relative_eq!(p.data[1], 1.9);
    }

    #[test]
    fn test_momentum_accumulates() {
        let mut opt = Sgd::new(0.1, 0.9);
        let mut p = param_with_grad(&[1.0], &[1.0]);

        opt.step(&mut [&mut p]);
        assert_relative_eq!(p.data[0], 0.9); // v = -0.1

        p.grad = Some(arr1(&[1.0]));
        opt.step(&mut [&mut p]);
        // v = 0.9 * -0.1 - 0.1 = -0.19
        assert_relative_eq!(p.data[0], 0.71);
    }

    #[test]
    fn test_skips_params_without_gradient() {
        let mut opt = Sgd::new(0.1, 0.0);
        let mut p = Param::new("p", arr1(&[1.0]));
        opt.step(&mut [&mut p]);
        assert_relative_eq!(p.data[0], 1.0);
    }

    #[test]
    fn test_zero_grad_default() {
        let mut opt = Sgd::new(0.1, 0.0);
        let mut p = param_with_grad(&[1.0], &[1.0]);
        opt.zero_grad(&mut [&mut p]);
        assert!(p.grad.is_none());
    }

    #[test]
    fn test_state_round_trip_reproduces_updates() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpoint::new(dir.path()).unwrap();

        let mut opt = Sgd::new(0.1, 0.9);
        let mut p = param_with_grad(&[1.0], &[1.0]);
        opt.step(&mut [&mut p]);
        opt.save(&ckpt).unwrap();

        let mut restored = Sgd::new(0.5, 0.0); // wrong hyperparams, overwritten by load
        restored.load(&ckpt).unwrap();
        assert_relative_eq!(restored.lr(), 0.1);

        // Same next step from both.
        let mut p1 = p.clone();
        p1.grad = Some(arr1(&[1.0]));
        let mut p2 = p.clone();
        p2.grad = Some(arr1(&[1.0]));
        opt.step(&mut [&mut p1]);
        restored.step(&mut [&mut p2]);
        assert_eq!(p1.data, p2.data);
    }

    #[test]
    fn test_load_rejects_foreign_state() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpoint::new(dir.path()).unwrap();

        let adam = super::super::Adam::new(0.1, 0.9, 0.999, 1e-8);
        adam.save(&ckpt).unwrap();

        let mut sgd = Sgd::new(0.1, 0.0);
        assert!(matches!(
            sgd.load(&ckpt),
            Err(Error::IncompatibleState { .. })
        ));
    }

    #[test]
    fn test_load_missing_state() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpoint::new(dir.path()).unwrap();
        let mut opt = Sgd::new(0.1, 0.0);
        assert!(matches!(
            opt.load(&ckpt),
            Err(Error::CheckpointNotFound { .. })
        ));
    }
}
