//! Per-channel affine baseline model.
//!
//! Predicts `mean[n,c,h,w] = weight[c] * x + bias[c]` and, when the
//! uncertainty mode carries a variance head, a log-variance
//! `var[n,c,h,w] = var_weight[c] * x + var_bias[c]`. Small enough to
//! hand-check gradients against, with real state to checkpoint.

use super::{params_to_state, restore_params, Mode, Model, Param, ParamState, Prediction, PredictionGrad};
use crate::checkpoint::{self, Checkpoint};
use crate::config::Device;
use crate::error::{Error, Result};
use crate::uncertainty::Uncertainty;
use ndarray::{Array1, Array4, Axis};

// Identity init is a fixed point of the reconstruction objective; start
// slightly off so a fresh run has a gradient to follow.
const WEIGHT_INIT: f32 = 0.8;
const BIAS_INIT: f32 = 0.1;

pub struct AffineModel {
    uncertainty: Uncertainty,
    device: Device,
    mode: Mode,
    weight: Param,
    bias: Param,
    var_weight: Option<Param>,
    var_bias: Option<Param>,
    last_input: Option<Array4<f32>>,
}

impl AffineModel {
    pub fn new(channels: usize, uncertainty: Uncertainty, device: Device) -> Result<Self> {
        if channels == 0 {
            return Err(Error::Config {
                field: "channels".into(),
                message: "must be at least 1".into(),
            });
        }
        let (var_weight, var_bias) = if uncertainty.supports_variance() {
            (
                Some(Param::new("var_weight", Array1::zeros(channels))),
                Some(Param::new("var_bias", Array1::zeros(channels))),
            )
        } else {
            (None, None)
        };
        Ok(Self {
            uncertainty,
            device,
            mode: Mode::Train,
            weight: Param::new("weight", Array1::from_elem(channels, WEIGHT_INIT)),
            bias: Param::new("bias", Array1::from_elem(channels, BIAS_INIT)),
            var_weight,
            var_bias,
            last_input: None,
        })
    }

    pub fn channels(&self) -> usize {
        self.weight.len()
    }

    pub fn uncertainty(&self) -> Uncertainty {
        self.uncertainty
    }

    /// Device the model was constructed for.
    pub fn device(&self) -> Device {
        self.device
    }

    fn check_channels(&self, input: &Array4<f32>) -> Result<()> {
        let channels = input.shape()[1];
        if channels != self.channels() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.channels()],
                actual: vec![channels],
            });
        }
        Ok(())
    }

    /// Apply `scale[c] * x + shift[c]` over the channel axis.
    fn affine(input: &Array4<f32>, scale: &Array1<f32>, shift: &Array1<f32>) -> Array4<f32> {
        let mut out = input.clone();
        for (c, mut lane) in out.axis_iter_mut(Axis(1)).enumerate() {
            let w = scale[c];
            let b = shift[c];
            lane.mapv_inplace(|v| w * v + b);
        }
        out
    }

    /// Per-channel `(sum(g * x), sum(g))` — the affine head's gradients.
    fn head_grads(input: &Array4<f32>, grad: &Array4<f32>, channels: usize) -> (Array1<f32>, Array1<f32>) {
        let mut d_scale = Array1::zeros(channels);
        let mut d_shift = Array1::zeros(channels);
        for c in 0..channels {
            let g = grad.index_axis(Axis(1), c);
            let x = input.index_axis(Axis(1), c);
            d_scale[c] = g.iter().zip(x.iter()).map(|(g, x)| g * x).sum();
            d_shift[c] = g.sum();
        }
        (d_scale, d_shift)
    }
}

impl Model for AffineModel {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Prediction> {
        self.check_channels(input)?;

        let mean = Self::affine(input, &self.weight.data, &self.bias.data);
        let var = match (&self.var_weight, &self.var_bias) {
            (Some(vw), Some(vb)) => Some(Self::affine(input, &vw.data, &vb.data)),
            _ => None,
        };

        self.last_input = Some(input.clone());
        Ok(Prediction { mean, var })
    }

    fn backward(&mut self, grad: &PredictionGrad) -> Result<()> {
        let input = self.last_input.take().ok_or(Error::NoForwardPass)?;
        if grad.mean.shape() != input.shape() {
            return Err(Error::ShapeMismatch {
                expected: input.shape().to_vec(),
                actual: grad.mean.shape().to_vec(),
            });
        }

        let channels = self.channels();
        let (dw, db) = Self::head_grads(&input, &grad.mean, channels);
        self.weight.accumulate_grad(&dw);
        self.bias.accumulate_grad(&db);

        if let Some(grad_var) = &grad.var {
            if let (Some(vw), Some(vb)) = (&mut self.var_weight, &mut self.var_bias) {
                let (dvw, dvb) = Self::head_grads(&input, grad_var, channels);
                vw.accumulate_grad(&dvw);
                vb.accumulate_grad(&dvb);
            }
        }
        Ok(())
    }

    fn params(&self) -> Vec<&Param> {
        let mut params = vec![&self.weight, &self.bias];
        if let Some(p) = &self.var_weight {
            params.push(p);
        }
        if let Some(p) = &self.var_bias {
            params.push(p);
        }
        params
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = vec![&mut self.weight, &mut self.bias];
        if let Some(p) = self.var_weight.as_mut() {
            params.push(p);
        }
        if let Some(p) = self.var_bias.as_mut() {
            params.push(p);
        }
        params
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn load(&mut self, ckpt: &Checkpoint) -> Result<()> {
        let path = ckpt.model_path();
        if !path.exists() {
            return Err(Error::CheckpointNotFound { path });
        }
        let state: Vec<ParamState> = checkpoint::read_json(&path)?;
        restore_params(self.params_mut(), &state, &path)
    }

    fn save(&self, ckpt: &Checkpoint, epoch: usize) -> Result<()> {
        let state = params_to_state(&self.params());
        checkpoint::write_json(&ckpt.model_path(), &state)?;
        checkpoint::write_json(&ckpt.model_epoch_path(epoch), &state)
    }

    fn name(&self) -> &'static str {
        "affine"
    }
}
