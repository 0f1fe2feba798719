//! Adam optimizer.

use super::Optimizer;
use crate::checkpoint::{self, Checkpoint};
use crate::error::{Error, Result};
use crate::model::Param;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Adam with bias-corrected first and second moments.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>,
    v: Vec<Option<Array1<f32>>>,
}

impl Adam {
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Adam with the usual defaults for everything but the learning rate.
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    fn ensure_moments(&mut self, count: usize) {
        if self.m.len() != count {
            self.m = (0..count).map(|_| None).collect();
            self.v = (0..count).map(|_| None).collect();
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AdamState {
    optimizer: String,
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Vec<f32>>>,
    v: Vec<Option<Vec<f32>>>,
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Param]) {
        self.ensure_moments(params.len());
        self.t += 1;

        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad.as_ref() else {
                continue;
            };

            let m = match self.m[i].take() {
                Some(m) => m * self.beta1 + grad * (1.0 - self.beta1),
                None => grad * (1.0 - self.beta1),
            };
            let grad_sq = grad.mapv(|g| g * g);
            let v = match self.v[i].take() {
                Some(v) => v * self.beta2 + grad_sq * (1.0 - self.beta2),
                None => grad_sq * (1.0 - self.beta2),
            };

            let update = m
                .iter()
                .zip(v.iter())
                .map(|(&m, &v)| {
                    let m_hat = m / bias1;
                    let v_hat = v / bias2;
                    self.lr * m_hat / (v_hat.sqrt() + self.epsilon)
                })
                .collect::<Array1<f32>>();
            param.data = &param.data - &update;

            self.m[i] = Some(m);
            self.v[i] = Some(v);
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
        let state: AdamState = checkpoint::read_json(&path)?;
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
        self.beta1 = state.beta1;
        self.beta2 = state.beta2;
        self.epsilon = state.epsilon;
        self.t = state.t;
        self.m = state
            .m
            .into_iter()
            .map(|m| m.map(Array1::from_vec))
            .collect();
        self.v = state
            .v
            .into_iter()
            .map(|v| v.map(Array1::from_vec))
            .collect();
        Ok(())
    }

    fn save(&self, ckpt: &Checkpoint) -> Result<()> {
        let state = AdamState {
            optimizer: self.name().to_string(),
            lr: self.lr,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            t: self.t,
            m: self
                .m
                .iter()
                .map(|m| m.as_ref().map(|a| a.to_vec()))
                .collect(),
            v: self
                .v
                .iter()
                .map(|v| v.as_ref().map(|a| a.to_vec()))
                .collect(),
        };
        checkpoint::write_json(&ckpt.optimizer_path(), &state)
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use tempfile::tempdir;

    #[test]
    fn test_first_step_moves_by_roughly_lr() {
        let mut opt = Adam::default_params(0.1);
        let mut p = Param::new("p", arr1(&[1.0]));
        p.grad = Some(arr1(&[1.0]));

        opt.step(&mut [&mut p]);
        // bias correction makes m_hat = g and v_hat = g^2 on step one,
        // so the update is lr * g / (|g| + eps) ~= lr
        assert_relative_eq!(p.data[0], 0.9, max_relative = 1e-5);
    }

    #[test]
    fn test_update_is_scale_invariant_in_gradient() {
        let mut small = Adam::default_params(0.1);
        let mut large = Adam::default_params(0.1);
        let mut p1 = Param::new("p", arr1(&[1.0]));
        let mut p2 = Param::new("p", arr1(&[1.0]));
        p1.grad = Some(arr1(&[0.001]));
        p2.grad = Some(arr1(&[100.0]));

        small.step(&mut [&mut p1]);
        large.step(&mut [&mut p2]);
        assert_relative_eq!(p1.data[0], p2.data[0], max_relative = 1e-3);
    }

    #[test]
    fn test_state_round_trip_reproduces_updates() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpoint::new(dir.path()).unwrap();

        let mut opt = Adam::default_params(0.05);
        let mut p = Param::new("p", arr1(&[1.0, -1.0]));
        p.grad = Some(arr1(&[0.3, -0.7]));
        opt.step(&mut [&mut p]);
        opt.save(&ckpt).unwrap();

        let mut restored = Adam::default_params(0.9);
        restored.load(&ckpt).unwrap();
        assert_relative_eq!(restored.lr(), 0.05);
        assert_eq!(restored.t, 1);

        let mut p1 = p.clone();
        p1.grad = Some(arr1(&[0.3, -0.7]));
        let mut p2 = p.clone();
        p2.grad = Some(arr1(&[0.3, -0.7]));
        opt.step(&mut [&mut p1]);
        restored.step(&mut [&mut p2]);
        assert_eq!(p1.data, p2.data);
    }
}
